use std::{error, fmt, io};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by grainpad.
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    AudioDecodingError(Box<dyn error::Error + Send + Sync>),
    OutputDeviceError(Box<dyn error::Error + Send + Sync>),
    AudioEngineError(String),
    InvalidBufferError(String),
    NodeNotFoundError(usize),
    ParameterError(String),
    SendError(String),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AudioDecodingError(err) | Self::OutputDeviceError(err) => err.fmt(f),
            Self::AudioEngineError(str) => write!(f, "Audio engine error: {str}"),
            Self::InvalidBufferError(str) => write!(f, "Invalid audio buffer: {str}"),
            Self::NodeNotFoundError(node_id) => {
                write!(f, "Audio node with id {node_id} not found")
            }
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::SendError(str) => write!(f, "Failed to send channel message: {str}"),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(err: crossbeam_channel::SendError<T>) -> Self {
        Error::SendError(err.to_string())
    }
}

impl<T> From<crossbeam_channel::TrySendError<T>> for Error {
    fn from(err: crossbeam_channel::TrySendError<T>) -> Self {
        Error::SendError(err.to_string())
    }
}
