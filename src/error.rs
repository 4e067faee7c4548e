use std::io;

use thiserror::Error;

use crate::models::VitalField;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("device did not report READY within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("patient info rejected: {0}")]
    Rejected(String),

    #[error("serial read failed: {0}")]
    StreamRead(#[source] io::Error),

    #[error("serial write failed: {0}")]
    StreamWrite(#[source] io::Error),
}

/// A vitals line whose value could not be parsed as the field's type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed {} value {raw:?}", field.as_str())]
pub struct LineParseError {
    pub field: VitalField,
    pub raw: String,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no ECG chart was produced for this session")]
    NoChart,

    #[error("ECG chart rendering failed: {0}")]
    Render(String),

    #[error("image upload failed: {0}")]
    Upload(String),

    #[error("record insert failed: {0}")]
    Insert(String),

    #[error("record insert returned an empty response")]
    EmptyInsertResponse,
}
