use thiserror::Error;

#[derive(Error, Debug)]
pub enum KymoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dataset: {0}")]
    InvalidStore(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Layout manifest error: {0}")]
    Manifest(#[from] toml::ser::Error),
}

/// Coarse failure class, used to decide whether a field is worth resubmitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required structure was not found in the image data.
    Detection,
    /// An assembled result violated the shape invariants.
    Layout,
    /// Storage or serialization failure.
    Resource,
    /// The configuration was rejected before any work started.
    Config,
}

impl KymoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Detection(_) => ErrorKind::Detection,
            Self::Layout(_) => ErrorKind::Layout,
            Self::InvalidConfig(_) | Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::InvalidStore(_) | Self::Manifest(_) => ErrorKind::Resource,
        }
    }
}

pub type Result<T> = std::result::Result<T, KymoError>;
