use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown field datatype: {0}")]
    UnknownFieldKind(String),

    #[error("unknown data format: {0}")]
    UnknownDataFormat(i64),

    #[error("unknown context level: {0}")]
    UnknownContextLevel(i64),

    #[error("unknown visibility: {0}")]
    UnknownVisibility(i64),

    #[error("value for sub-field {slot} contains the composite delimiter")]
    DelimiterInValue { slot: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
