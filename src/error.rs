use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RequestError {
    #[error("no sub-requests of type: {0}")]
    UnknownType(String),

    #[error("sub-request index {index} is out of range for type {rtype}")]
    IndexOutOfRange { rtype: String, index: usize },

    #[error("no file with LFN {0} in this sub-request")]
    FileNotFound(String),

    #[error("no dataset with handle {0} in this sub-request")]
    DatasetNotFound(String),

    #[error("unknown request attribute: {0}")]
    UnknownAttribute(String),

    #[error("field not set on record: {0}")]
    FieldNotFound(String),

    #[error("malformed request document: {0}")]
    MalformedDocument(String),

    #[error("malformed encoded payload: {0}")]
    MalformedPayload(String),

    #[error("no sub-requests of type {0} to serialize")]
    EmptySelection(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
