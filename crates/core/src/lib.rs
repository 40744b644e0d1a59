pub mod composite;
pub mod error;
pub mod field;
pub mod ids;
pub mod lom;

pub use composite::{
    COMPOSITE_DELIMITER, SubField, SubFieldWidget, composite_layout, composite_slots,
    decode_composite, encode_composite,
};
pub use error::CoreError;
pub use field::{
    ContextLevel, DataFormat, FieldCategory, FieldDefinition, FieldKind, ParamType, StoredValue,
    Visibility,
};
pub use ids::*;
pub use lom::{
    ContributionRole, Contributor, CourseFacts, DefaultRule, DerivedDefault, HostInfo,
    LomCategory, LomElement,
};
