use derive_more::Display;
use serde::Serialize;

/// Which half of an enable/disable transition failed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransitionHalf {
    #[display("config")]
    Config,
    #[display("filesystem")]
    Filesystem,
}

#[derive(Serialize, Debug, Display)]
pub enum SError {
    #[display("parse error: {_0}")]
    ParseError(String),
    #[display("io error: {_0}")]
    IOError(String),
    #[display("the game is running")]
    GameRunning,
    #[display("another transition or download is in progress")]
    OperationInProgress,
    #[display("addon {_0} not found")]
    AddonNotFound(String),
    #[display("invalid addon id '{_0}'")]
    InvalidId(String),
    #[display("file or directory not found: {_0}")]
    FileOrDirectoryNotFound(String),
    #[display("file collision: {}", _0.join(", "))]
    FileCollision(Vec<String>),
    #[display("section '{_0}' not found in game config")]
    ConfigSectionNotFound(String),
    #[display("{failed} half of transition for {id} failed: {cause}")]
    PartialTransition {
        id: String,
        failed: TransitionHalf,
        cause: Box<SError>,
    },
    #[display("catalog unavailable: {_0}")]
    CatalogUnavailable(String),
    #[display("async runtime error: {_0}")]
    AsyncRuntimeError(String),
    #[display("task context unavailable")]
    ContextUnprovided,
}

impl std::error::Error for SError {}

impl SError {
    pub fn partial(id: &str, failed: TransitionHalf, cause: SError) -> Self {
        SError::PartialTransition {
            id: id.to_string(),
            failed,
            cause: Box::new(cause),
        }
    }
}

impl From<std::io::Error> for SError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => SError::FileOrDirectoryNotFound(e.to_string()),
            _ => SError::IOError(e.to_string()),
        }
    }
}

impl From<walkdir::Error> for SError {
    fn from(e: walkdir::Error) -> Self {
        SError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for SError {
    fn from(e: serde_json::Error) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<ureq::Error> for SError {
    fn from(e: ureq::Error) -> Self {
        SError::CatalogUnavailable(e.to_string())
    }
}

impl From<confy::ConfyError> for SError {
    fn from(e: confy::ConfyError) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<tempfile::PersistError> for SError {
    fn from(e: tempfile::PersistError) -> Self {
        SError::IOError(e.to_string())
    }
}
