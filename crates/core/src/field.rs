use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{CategoryId, FieldId, InstanceId, ValueId};

/// Category of entity a field applies to. Discriminants are the host's
/// context level numbers and are what gets stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextLevel {
    System,
    User,
    CourseCategory,
    Course,
    Module,
    Block,
}

impl ContextLevel {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::System => 10,
            Self::User => 30,
            Self::CourseCategory => 40,
            Self::Course => 50,
            Self::Module => 70,
            Self::Block => 80,
        }
    }

    pub fn parse(level: i64) -> Result<Self, CoreError> {
        match level {
            10 => Ok(Self::System),
            30 => Ok(Self::User),
            40 => Ok(Self::CourseCategory),
            50 => Ok(Self::Course),
            70 => Ok(Self::Module),
            80 => Ok(Self::Block),
            other => Err(CoreError::UnknownContextLevel(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    Moodle,
    Html,
    Plain,
    Markdown,
}

impl DataFormat {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Moodle => 0,
            Self::Html => 1,
            Self::Plain => 2,
            Self::Markdown => 4,
        }
    }

    pub fn parse(format: i64) -> Result<Self, CoreError> {
        match format {
            0 => Ok(Self::Moodle),
            1 => Ok(Self::Html),
            2 => Ok(Self::Plain),
            4 => Ok(Self::Markdown),
            other => Err(CoreError::UnknownDataFormat(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    None,
    Private,
    All,
}

impl Visibility {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::None => 0,
            Self::Private => 1,
            Self::All => 2,
        }
    }

    pub fn parse(visible: i64) -> Result<Self, CoreError> {
        match visible {
            0 => Ok(Self::None),
            1 => Ok(Self::Private),
            2 => Ok(Self::All),
            other => Err(CoreError::UnknownVisibility(other)),
        }
    }
}

/// How submitted values are cleaned before they reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Raw,
    Text,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    TextArea,
    Checkbox,
    DateTime,
    /// Composite: `defaultdata` lists the sub-field names, one per line.
    State,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::TextArea => "textarea",
            Self::Checkbox => "checkbox",
            Self::DateTime => "datetime",
            Self::State => "state",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "text" => Ok(Self::Text),
            "textarea" => Ok(Self::TextArea),
            "checkbox" => Ok(Self::Checkbox),
            "datetime" => Ok(Self::DateTime),
            "state" => Ok(Self::State),
            other => Err(CoreError::UnknownFieldKind(other.to_string())),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Text => "Text input",
            Self::TextArea => "Text area",
            Self::Checkbox => "Checkbox",
            Self::DateTime => "Date/Time",
            Self::State => "State",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::State)
    }

    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Text | Self::State => ParamType::Text,
            Self::TextArea => ParamType::Raw,
            Self::Checkbox | Self::DateTime => ParamType::Int,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCategory {
    pub id: CategoryId,
    pub name: String,
    pub sortorder: i64,
}

/// Admin-configured schema for one metadata attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: FieldId,
    pub categoryid: CategoryId,
    /// `{category}_{element}`, e.g. `lifecycle_contribute_1`.
    pub shortname: String,
    pub name: String,
    pub datatype: FieldKind,
    pub defaultdata: String,
    pub required: bool,
    pub locked: bool,
    pub forceunique: bool,
    pub signup: bool,
    pub visible: Visibility,
    pub contextlevel: ContextLevel,
    pub sortorder: i64,
}

impl FieldDefinition {
    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_unique(&self) -> bool {
        self.forceunique
    }

    pub fn is_signup_field(&self) -> bool {
        self.signup
    }

    /// All settings of the definition as a JSON object, for export through
    /// external APIs.
    pub fn config_for_external(&self) -> Result<serde_json::Value, CoreError> {
        serde_json::to_value(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Param type and nullability used to clean submitted data.
    pub fn field_properties(&self) -> (ParamType, bool) {
        (self.datatype.param_type(), false)
    }
}

/// One `(instanceid, fieldid)` row. Storage keeps at most one per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub id: ValueId,
    pub instanceid: InstanceId,
    pub fieldid: FieldId,
    pub data: String,
    pub dataformat: DataFormat,
}
