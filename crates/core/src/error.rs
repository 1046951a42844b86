#[derive(Debug, thiserror::Error)]
pub enum HimsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to create patient directory: {0}")]
    PatientDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("invalid text: {0}")]
    Text(#[from] hims_types::TextError),
    #[error("malformed action call at byte {offset}: {message}")]
    ActionParse { offset: usize, message: String },
    #[error("failed to decode actions: {0}")]
    ActionDecode(serde_json::Error),
}

pub type HimsResult<T> = std::result::Result<T, HimsError>;
