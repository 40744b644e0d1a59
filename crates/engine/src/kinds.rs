//! Per-kind behaviour, looked up by [`FieldKind`] instead of overridden.

use metafield_core::{
    FieldDefinition, FieldKind, SubFieldWidget, composite_layout, decode_composite,
};

use crate::form::{ElementType, FormDescriptor};

pub struct KindHandler {
    /// Adds the kind's elements. `stored` is the row's data, if any.
    pub add_elements: fn(&FieldDefinition, &str, Option<&str>, &mut FormDescriptor),
    /// Cleans a submitted value before it is stored.
    pub preprocess: fn(&str) -> String,
}

static TEXT: KindHandler = KindHandler {
    add_elements: add_text,
    preprocess: keep,
};

static TEXT_AREA: KindHandler = KindHandler {
    add_elements: add_editor,
    preprocess: keep,
};

static CHECKBOX: KindHandler = KindHandler {
    add_elements: add_checkbox,
    preprocess: clean_checkbox,
};

static DATE_TIME: KindHandler = KindHandler {
    add_elements: add_date_time,
    preprocess: clean_int,
};

static STATE: KindHandler = KindHandler {
    add_elements: add_state,
    preprocess: keep,
};

pub fn handler(kind: FieldKind) -> &'static KindHandler {
    match kind {
        FieldKind::Text => &TEXT,
        FieldKind::TextArea => &TEXT_AREA,
        FieldKind::Checkbox => &CHECKBOX,
        FieldKind::DateTime => &DATE_TIME,
        FieldKind::State => &STATE,
    }
}

fn keep(value: &str) -> String {
    value.to_string()
}

fn clean_checkbox(value: &str) -> String {
    match value.trim() {
        "" | "0" => "0".to_string(),
        _ => "1".to_string(),
    }
}

fn clean_int(value: &str) -> String {
    value.trim().parse::<i64>().unwrap_or(0).to_string()
}

fn add_text(def: &FieldDefinition, inputname: &str, _stored: Option<&str>, form: &mut FormDescriptor) {
    form.add_element(ElementType::Text, inputname, &def.name, Some(30));
}

fn add_editor(def: &FieldDefinition, inputname: &str, _stored: Option<&str>, form: &mut FormDescriptor) {
    form.add_element(ElementType::Editor, inputname, &def.name, None);
}

fn add_checkbox(def: &FieldDefinition, inputname: &str, _stored: Option<&str>, form: &mut FormDescriptor) {
    form.add_element(ElementType::AdvCheckbox, inputname, &def.name, None);
}

fn add_date_time(def: &FieldDefinition, inputname: &str, _stored: Option<&str>, form: &mut FormDescriptor) {
    form.add_element(ElementType::DateTimeSelector, inputname, &def.name, None);
}

/// One element per composite slot, defaulted from the stored value at the
/// slot's position.
fn add_state(def: &FieldDefinition, inputname: &str, stored: Option<&str>, form: &mut FormDescriptor) {
    let layout = composite_layout(def);
    let slots: Vec<&str> = layout.iter().map(|sub| sub.slot.as_str()).collect();
    let values = decode_composite(stored.unwrap_or_default(), &slots);

    for sub in &layout {
        let inputid = format!("{inputname}_{}", sub.slot);
        let value = values.get(&sub.slot).map(String::as_str).unwrap_or_default();
        match sub.widget {
            SubFieldWidget::Hidden => {
                form.add_element(ElementType::Hidden, &inputid, &sub.label, None);
            }
            SubFieldWidget::Text => {
                form.add_element(ElementType::Text, &inputid, &sub.label, Some(80));
                let topic = if sub.slot == "role#value" {
                    "help_lifecycle_contribute_role".to_string()
                } else {
                    format!("help_{}_{}", def.shortname, sub.slot)
                };
                form.add_help_button(&inputid, &topic);
            }
            SubFieldWidget::Date => {
                form.add_element(ElementType::DateSelector, &inputid, &sub.label, None);
                form.add_help_button(&inputid, "help_lifecycle_contribute_date");
            }
        }
        if !value.is_empty() {
            form.set_default(&inputid, value);
        }
    }
}
