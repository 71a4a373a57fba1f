use crate::sqlstate;
use crate::types::BatchStatus;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MuxError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("sql error: {message}")]
    Sql {
        message: String,
        sql_state: String,
        vendor_code: u32,
    },
    #[error("server error: {0}")]
    Server(String),
    #[error("batch failed: {message}")]
    BatchPartialFailure {
        statuses: Vec<BatchStatus>,
        message: String,
    },
    #[error("shard hint conflict: {0}")]
    ShardHintConflict(String),
    #[error("output parameter {0} was not registered")]
    UnregisteredOutParameter(usize),
    #[error("unsupported bind value kind: {0}")]
    UnsupportedBindKind(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("{0} is closed")]
    Closed(String),
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl MuxError {
    /// Builds a server-reported SQL error, resolving the vendor code and
    /// SQLSTATE embedded in the message text.
    pub fn sql(message: impl Into<String>) -> Self {
        let message = message.into();
        let (sql_state, vendor_code) = sqlstate::state_and_vendor_code(&message);
        MuxError::Sql {
            message,
            sql_state: sql_state.to_string(),
            vendor_code,
        }
    }

    /// Errors after which the single ordered stream to the proxy can no
    /// longer be trusted. The owning session must be hard-closed.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            MuxError::Io(_) | MuxError::Timeout(_) | MuxError::Protocol(_)
        )
    }

    pub fn batch_statuses(&self) -> Option<&[BatchStatus]> {
        match self {
            MuxError::BatchPartialFailure { statuses, .. } => Some(statuses),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MuxError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                MuxError::Timeout(err.to_string())
            }
            _ => MuxError::Io(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
