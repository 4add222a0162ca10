use thiserror::Error;

/// Failures reported by the board and task-store clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached at all (connect failure, timeout).
    #[error("{0} is unreachable")]
    Unreachable(String),

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service refused a request (business rule, validation, false result).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The reply could not be understood.
    #[error("malformed reply: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Self::Auth(status.to_string());
            }
            return Self::Rejected(format!("HTTP {status}"));
        }
        if err.is_connect() || err.is_timeout() {
            return Self::Unreachable(err.to_string());
        }
        if err.is_decode() {
            return Self::Protocol(err.to_string());
        }
        Self::Unreachable(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Failures of the reconciliation engine and its storage.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no swimlane mapping for {0}")]
    SwimlaneUnmapped(String),

    #[error("duplicate {dictionary} mapping: {detail}")]
    DuplicateMapping {
        dictionary: &'static str,
        detail: String,
    },

    #[error("invalid mutation: {0}")]
    InvalidMutation(String),

    #[error(
        "database requires schema version {required} but this build only supports version {code}"
    )]
    SchemaTooNew { code: u32, required: u32 },

    #[error("project {0} is not configured")]
    ProjectNotConfigured(String),

    #[error("giving up after {0} consecutive failed cycles")]
    TooManyFailures(u32),
}

impl SyncError {
    /// True when the root cause is a rejected credential.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Client(err) if err.is_auth())
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Client(err) if err.is_unreachable())
    }

    /// The board or task store refused us: bad credentials or a rejected
    /// request. These count against the daemon's failure budget.
    pub fn is_client_failure(&self) -> bool {
        matches!(
            self,
            Self::Client(ClientError::Auth(_)) | Self::Client(ClientError::Rejected(_))
        )
    }
}
