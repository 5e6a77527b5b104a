use thiserror::Error;

/// ROI request errors. The selection is left untouched when one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoiError {
    #[error("invalid ROI size: {0}")]
    InvalidSize(String),
}

pub type Result<T> = std::result::Result<T, RoiError>;
