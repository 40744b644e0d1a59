pub mod context;
pub mod error;
pub mod form;
pub mod kinds;
pub mod request;
pub mod settings;

pub use context::{CourseContextHandler, NavNode, NodeType, SettingsEntry, SettingsMenu};
pub use error::EngineError;
pub use form::{ElementType, FieldDescriptor, FormDescriptor};
pub use request::{AuthContext, Authorizer, Capability, RequestContext};
pub use settings::{MetadataSettings, SettingsError, load_settings};

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use metafield_core::{
    ContextLevel, CourseFacts, DataFormat, DerivedDefault, FieldDefinition, FieldId, InstanceId,
    LomElement, SubFieldWidget, ValueId, Visibility, composite::check_sub_value,
    composite_layout, composite_slots, decode_composite, encode_composite,
};
use metafield_storage::{SqliteStorage, Storage};

use crate::kinds::handler;

/// Prefix of every metadata input name; the field shortname follows it.
pub const INPUT_PREFIX: &str = "local_metadata_field_";

const EDITING_TEACHER_ROLE: &str = "editingteacher";

/// A field definition joined with its value for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldState {
    pub fieldid: FieldId,
    pub instanceid: InstanceId,
    /// `None` when the field id is unset or unknown.
    pub field: Option<FieldDefinition>,
    pub category: Option<String>,
    pub inputname: String,
    pub data: Option<String>,
    pub dataformat: DataFormat,
}

impl FieldState {
    fn empty(fieldid: FieldId, instanceid: InstanceId) -> Self {
        Self {
            fieldid,
            instanceid,
            field: None,
            category: None,
            inputname: String::new(),
            data: None,
            dataformat: DataFormat::Html,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.field.is_some()
    }

    /// Display name of the field's kind.
    pub fn name(&self) -> &'static str {
        match &self.field {
            Some(def) => def.datatype.display_name(),
            None => "-- unknown --",
        }
    }

    /// `"0"` counts as data.
    pub fn is_empty(&self) -> bool {
        match self.data.as_deref() {
            None | Some("") => true,
            Some(_) => false,
        }
    }
}

/// Flat map of submitted form keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    values: BTreeMap<String, String>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Submission {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut submission = Submission::new();
        for (k, v) in iter {
            submission.insert(k, v);
        }
        submission
    }
}

/// Result of the caller's write-permission check, taken before saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAccess {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(ValueId),
    /// Nothing in the submission addressed this field.
    NoMatch,
    NotPermitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("value already used")]
    ValueAlreadyUsed { field: String },
}

impl ValidationError {
    /// Input name the error belongs to.
    pub fn field(&self) -> &str {
        match self {
            Self::ValueAlreadyUsed { field } => field,
        }
    }
}

pub struct FieldEngine {
    storage: SqliteStorage,
}

impl FieldEngine {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut SqliteStorage {
        &mut self.storage
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Loads the definition and stored value. Unknown fields give an empty
    /// state; a missing value falls back to `defaultdata` verbatim.
    pub fn load(&self, fieldid: FieldId, instanceid: InstanceId) -> Result<FieldState, EngineError> {
        if !fieldid.is_set() {
            return Ok(FieldState::empty(fieldid, instanceid));
        }
        match self.storage.get_field_definition(fieldid)? {
            Some(def) => self.state_for(def, instanceid),
            None => Ok(FieldState::empty(fieldid, instanceid)),
        }
    }

    /// States for every field of a context level, in form order.
    pub fn load_for_context(
        &self,
        contextlevel: ContextLevel,
        instanceid: InstanceId,
    ) -> Result<Vec<FieldState>, EngineError> {
        self.storage
            .get_fields_for_context(contextlevel)?
            .into_iter()
            .map(|def| self.state_for(def, instanceid))
            .collect()
    }

    fn state_for(&self, def: FieldDefinition, instanceid: InstanceId) -> Result<FieldState, EngineError> {
        let category = self.storage.get_category(def.categoryid)?.map(|c| c.name);
        let (data, dataformat) = match self.storage.get_value(instanceid, def.id)? {
            Some(value) => (value.data, value.dataformat),
            None => (def.defaultdata.clone(), DataFormat::Html),
        };
        Ok(FieldState {
            fieldid: def.id,
            instanceid,
            inputname: format!("{INPUT_PREFIX}{}", def.shortname),
            category,
            field: Some(def),
            data: Some(data),
            dataformat,
        })
    }

    // ========================================================================
    // Defaults
    // ========================================================================

    /// Default for a `(category, shortname)` key. Keys outside the LOM
    /// table give an empty default.
    pub fn compute_default(
        &self,
        category: &str,
        shortname: &str,
        instanceid: InstanceId,
        req: &RequestContext,
    ) -> Result<DerivedDefault, EngineError> {
        match LomElement::from_key(category, shortname) {
            Some(element) => {
                let facts = self.course_facts(instanceid, req)?;
                Ok(element.rule().evaluate(&facts))
            }
            None => Ok(DerivedDefault::default()),
        }
    }

    fn course_facts(&self, instanceid: InstanceId, req: &RequestContext) -> Result<CourseFacts, EngineError> {
        let course = self.storage.get_course(instanceid)?;
        let (fullname, lang, summary, timecreated) = match course {
            Some(c) => (c.fullname, c.lang, c.summary, c.timecreated),
            None => (String::new(), String::new(), String::new(), 0),
        };
        Ok(CourseFacts {
            instanceid,
            fullname,
            lang,
            summary,
            keyword: self.storage.get_instance_tag(instanceid)?,
            timecreated,
            editing_teachers: self.storage.get_role_users(EDITING_TEACHER_ROLE, instanceid)?,
            host: req.host.clone(),
            request_language: req.language.clone(),
            platform_release: self.storage.get_config("backup_release")?.unwrap_or_default(),
            platform_build: self.storage.get_config("version")?.unwrap_or_default(),
        })
    }

    /// Stores `value` unless the pair already has a row. Returns the new row
    /// id when one was written.
    pub fn persist_default_if_absent(
        &mut self,
        fieldid: FieldId,
        instanceid: InstanceId,
        value: &str,
    ) -> Result<Option<ValueId>, EngineError> {
        let inserted =
            self.storage
                .insert_value_if_absent(instanceid, fieldid, value, DataFormat::Html)?;
        if let Some(value_id) = inserted {
            info!(%fieldid, %instanceid, %value_id, "default metadata value stored");
        }
        Ok(inserted)
    }

    /// Computes the LOM default for the field and stores it when the instance
    /// had no row yet. Returns the default only when it was written.
    pub fn apply_lom_default(
        &mut self,
        state: &FieldState,
        req: &RequestContext,
    ) -> Result<Option<DerivedDefault>, EngineError> {
        let (Some(def), Some(category)) = (&state.field, &state.category) else {
            return Ok(None);
        };
        if LomElement::from_key(category, &def.shortname).is_none() {
            return Ok(None);
        }
        let derived = self.compute_default(category, &def.shortname, state.instanceid, req)?;
        let written = self
            .persist_default_if_absent(def.id, state.instanceid, &derived.value)?
            .is_some();
        Ok(written.then_some(derived))
    }

    // ========================================================================
    // Form
    // ========================================================================

    /// Visible fields, and user-context fields for callers who may update
    /// users, can be edited.
    fn is_editable(def: &FieldDefinition, req: &RequestContext, auth: &dyn Authorizer) -> bool {
        def.visible != Visibility::None
            || (def.contextlevel == ContextLevel::User
                && auth.has_capability(req.user, Capability::UserUpdate, &AuthContext::system()))
    }

    pub fn is_visible_to(state: &FieldState, req: &RequestContext, auth: &dyn Authorizer) -> bool {
        let Some(def) = &state.field else {
            return false;
        };
        let others_allowed = || {
            def.contextlevel != ContextLevel::User
                || auth.has_capability(
                    req.user,
                    Capability::UserViewAllDetails,
                    &AuthContext {
                        level: ContextLevel::User,
                        instanceid: state.instanceid,
                    },
                )
        };
        match def.visible {
            Visibility::All => true,
            Visibility::Private => {
                req.user.map(|u| u.as_i64()) == Some(state.instanceid.as_i64()) || others_allowed()
            }
            Visibility::None => others_allowed(),
        }
    }

    /// Adds the field to the edit form. Returns false when the caller may not
    /// edit it or the state is empty.
    pub fn edit_field(
        &mut self,
        state: &FieldState,
        req: &RequestContext,
        auth: &dyn Authorizer,
        form: &mut FormDescriptor,
    ) -> Result<bool, EngineError> {
        let Some(def) = &state.field else {
            return Ok(false);
        };
        if !Self::is_editable(def, req, auth) {
            return Ok(false);
        }

        let derived = self.apply_lom_default(state, req)?;

        let stored = self
            .storage
            .get_value(state.instanceid, def.id)?
            .map(|v| v.data);
        (handler(def.datatype).add_elements)(def, &state.inputname, stored.as_deref(), form);

        if let Some(derived) = &derived {
            show_default(def, &state.inputname, derived, form);
        }
        if !def.datatype.is_composite() && !def.defaultdata.is_empty() {
            form.set_default(&state.inputname, &def.defaultdata);
        }

        let own_record = req.user.map(|u| u.as_i64()) == Some(state.instanceid.as_i64());
        if def.is_required()
            && (def.contextlevel != ContextLevel::User || own_record || req.is_guest)
        {
            for name in visible_inputs(def, &state.inputname) {
                form.add_required_rule(&name);
            }
        }
        Ok(true)
    }

    /// Freezes locked user-context fields for callers who may not update
    /// users.
    pub fn edit_after_data(
        &self,
        state: &FieldState,
        req: &RequestContext,
        auth: &dyn Authorizer,
        form: &mut FormDescriptor,
    ) -> bool {
        let Some(def) = &state.field else {
            return false;
        };
        if !Self::is_editable(def, req, auth) {
            return false;
        }
        if form.element_exists(&state.inputname)
            && def.is_locked()
            && def.contextlevel == ContextLevel::User
            && !auth.has_capability(req.user, Capability::UserUpdate, &AuthContext::system())
        {
            form.hard_freeze(&state.inputname);
            form.set_constant(&state.inputname, state.data.as_deref().unwrap_or_default());
        }
        true
    }

    pub fn edit_load_instance_data(state: &FieldState, instance: &mut BTreeMap<String, String>) {
        if let Some(data) = &state.data {
            instance.insert(state.inputname.clone(), data.clone());
        }
    }

    // ========================================================================
    // Save / validate
    // ========================================================================

    /// Stores the submitted value for the state's instance.
    ///
    /// A key equal to the input name targets the whole value. For composite
    /// fields, keys `{inputname}_{slot}` target single slots; those are merged
    /// over the stored value and re-encoded into the one row.
    pub fn save(
        &mut self,
        state: &FieldState,
        submission: &Submission,
        access: WriteAccess,
    ) -> Result<SaveOutcome, EngineError> {
        if access == WriteAccess::Denied {
            return Ok(SaveOutcome::NotPermitted);
        }
        let Some(def) = &state.field else {
            return Ok(SaveOutcome::NoMatch);
        };

        if def.datatype.is_composite() {
            let slots = composite_slots(def);
            let prefix = format!("{}_", state.inputname);
            let mut submitted = BTreeMap::new();
            for (key, value) in submission.iter() {
                let Some(slot) = key.strip_prefix(&prefix) else {
                    continue;
                };
                if slots.iter().any(|s| s == slot) {
                    check_sub_value(slot, value)?;
                    submitted.insert(slot.to_string(), value.to_string());
                }
            }
            if !submitted.is_empty() {
                let current = self
                    .storage
                    .get_value(state.instanceid, def.id)?
                    .map(|v| v.data)
                    .unwrap_or_default();
                let mut values = decode_composite(&current, &slots);
                values.extend(submitted);
                let encoded = encode_composite(&slots, &values);
                let value_id =
                    self.storage
                        .upsert_value(state.instanceid, def.id, &encoded, DataFormat::Html)?;
                info!(fieldid = %def.id, instanceid = %state.instanceid, %value_id, "composite metadata saved");
                return Ok(SaveOutcome::Saved(value_id));
            }
        }

        match submission.get(&state.inputname) {
            Some(raw) => {
                let data = (handler(def.datatype).preprocess)(raw);
                let value_id =
                    self.storage
                        .upsert_value(state.instanceid, def.id, &data, DataFormat::Html)?;
                info!(fieldid = %def.id, instanceid = %state.instanceid, %value_id, "metadata saved");
                Ok(SaveOutcome::Saved(value_id))
            }
            None => {
                debug!(inputname = %state.inputname, "submission has no value for field");
                Ok(SaveOutcome::NoMatch)
            }
        }
    }

    /// Checks a submitted value against the field's uniqueness constraint.
    /// Equality follows the storage column's collation.
    pub fn validate(&self, state: &FieldState, submitted: &str) -> Result<Vec<ValidationError>, EngineError> {
        let Some(def) = &state.field else {
            return Ok(Vec::new());
        };
        if !def.is_unique() || (submitted.is_empty() && !def.is_required()) {
            return Ok(Vec::new());
        }
        let rows = self.storage.get_values_with_data(def.id, submitted)?;
        if rows.is_empty() || rows.iter().any(|r| r.instanceid == state.instanceid) {
            return Ok(Vec::new());
        }
        debug!(inputname = %state.inputname, "unique metadata value already used");
        Ok(vec![ValidationError::ValueAlreadyUsed {
            field: state.inputname.clone(),
        }])
    }

    pub fn validate_submission(
        &self,
        state: &FieldState,
        submission: &Submission,
    ) -> Result<Vec<ValidationError>, EngineError> {
        self.validate(state, submission.get(&state.inputname).unwrap_or_default())
    }
}

/// Shows a freshly stored default in the form. Composite defaults are split
/// so each non-empty position lands on its slot element; a contribution's
/// date output fills the `date` slot.
fn show_default(def: &FieldDefinition, inputname: &str, derived: &DerivedDefault, form: &mut FormDescriptor) {
    if !def.datatype.is_composite() {
        form.set_default(inputname, derived.form_value());
        return;
    }
    let slots = composite_slots(def);
    for (slot, value) in decode_composite(derived.form_value(), &slots) {
        if !value.is_empty() {
            form.set_default(&format!("{inputname}_{slot}"), &value);
        }
    }
}

/// Names of the elements a user fills in for the field; hidden composite
/// slots are left out.
fn visible_inputs(def: &FieldDefinition, inputname: &str) -> Vec<String> {
    if !def.datatype.is_composite() {
        return vec![inputname.to_string()];
    }
    composite_layout(def)
        .into_iter()
        .filter(|sub| sub.widget != SubFieldWidget::Hidden)
        .map(|sub| format!("{inputname}_{}", sub.slot))
        .collect()
}
