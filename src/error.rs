use thiserror::Error;

use crate::dataset::DatasetIdentity;
use crate::volume_loader::VolumeLoaderError;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Layout expects {expected} descriptors but {actual} were supplied")]
    ConfigurationMismatch { expected: usize, actual: usize },

    #[error("Labelmap geometry does not match its volume: {0}")]
    GeometryMismatch(String),

    #[error("A layout transition is already in flight")]
    Busy,

    #[error("Viewport creation for slot {slot} was abandoned by the backend")]
    ViewportCreationFailed { slot: usize },

    #[error("No viewport at slot {slot}")]
    NoViewport { slot: usize },

    #[error("Unknown dataset: {0}")]
    UnknownDataset(DatasetIdentity),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid parameters for {command}: {reason}")]
    InvalidParameters {
        command: &'static str,
        reason: String,
    },

    #[error("Volume loading failed: {0}")]
    VolumeLoader(#[from] VolumeLoaderError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
