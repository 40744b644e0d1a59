//! Declarative edit-form description. The engine only describes fields; the
//! host's form library renders them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Text,
    Hidden,
    Editor,
    AdvCheckbox,
    DateSelector,
    DateTimeSelector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub element: ElementType,
    pub name: String,
    pub label: String,
    pub size: Option<u32>,
    pub default: Option<String>,
    pub required: bool,
    pub help: Option<String>,
    pub frozen: bool,
    pub constant: Option<String>,
}

/// Ordered element list for one edit form. A default set for a name with no
/// element yet attaches when the element is added. Rules, help, freezing and
/// constants apply only to elements already added.
#[derive(Debug, Clone, Default)]
pub struct FormDescriptor {
    elements: Vec<FieldDescriptor>,
    pending_defaults: Vec<(String, String)>,
}

impl FormDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element(
        &mut self,
        element: ElementType,
        name: &str,
        label: &str,
        size: Option<u32>,
    ) -> &mut FieldDescriptor {
        let default = self
            .pending_defaults
            .iter()
            .rposition(|(n, _)| n == name)
            .map(|i| self.pending_defaults.remove(i).1);
        self.elements.push(FieldDescriptor {
            element,
            name: name.to_string(),
            label: label.to_string(),
            size,
            default,
            required: false,
            help: None,
            frozen: false,
            constant: None,
        });
        let last = self.elements.len() - 1;
        &mut self.elements[last]
    }

    pub fn set_default(&mut self, name: &str, value: &str) {
        match self.element_mut(name) {
            Some(element) => element.default = Some(value.to_string()),
            None => self
                .pending_defaults
                .push((name.to_string(), value.to_string())),
        }
    }

    pub fn add_required_rule(&mut self, name: &str) {
        if let Some(element) = self.element_mut(name) {
            element.required = true;
        }
    }

    pub fn add_help_button(&mut self, name: &str, topic: &str) {
        if let Some(element) = self.element_mut(name) {
            element.help = Some(topic.to_string());
        }
    }

    pub fn hard_freeze(&mut self, name: &str) {
        if let Some(element) = self.element_mut(name) {
            element.frozen = true;
        }
    }

    pub fn set_constant(&mut self, name: &str, value: &str) {
        if let Some(element) = self.element_mut(name) {
            element.constant = Some(value.to_string());
        }
    }

    pub fn element_exists(&self, name: &str) -> bool {
        self.element(name).is_some()
    }

    pub fn element(&self, name: &str) -> Option<&FieldDescriptor> {
        self.elements.iter().find(|e| e.name == name)
    }

    fn element_mut(&mut self, name: &str) -> Option<&mut FieldDescriptor> {
        self.elements.iter_mut().find(|e| e.name == name)
    }

    pub fn elements(&self) -> &[FieldDescriptor] {
        &self.elements
    }
}
