//! Error taxonomy shared by ingestion, query serving and imputation
//!
//! Every failure that crosses a component boundary is one of five kinds:
//!
//! | Kind          | Raised by                       | Retried?                               |
//! |---------------|---------------------------------|----------------------------------------|
//! | `Auth`        | token refresh / store           | never (fatal for the ingestion run)    |
//! | `VendorApi`   | vendor HTTP calls               | 5xx / network only, with backoff       |
//! | `Validation`  | request parameter checks        | never                                  |
//! | `Storage`     | SQLite reads / writes           | at ingestion time only                 |
//! | `Imputation`  | gap filling                     | never (prior imputed rows untouched)   |

use std::fmt;

/// Stable taxonomy code reported to HTTP callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Auth,
    VendorApi,
    Validation,
    Storage,
    Imputation,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Auth => "AUTH_ERROR",
            ErrorCode::VendorApi => "VENDOR_API_ERROR",
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Storage => "STORAGE_ERROR",
            ErrorCode::Imputation => "IMPUTATION_ERROR",
        }
    }
}

/// Credential lifecycle failures. All of them end the current ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// No credential persisted yet (run the `authorize` binary first)
    MissingCredential,
    /// Vendor rejected the refresh token
    RefreshRejected(String),
    /// Token endpoint unreachable or returned garbage
    Endpoint(String),
    /// Credential file unreadable / unwritable
    Store(String),
    /// Vendor issued a token that expires inside the safety margin
    ShortLived { expires_in: i64, margin: i64 },
    /// Second 401 after a forced refresh
    StillUnauthorized,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredential => write!(f, "no stored credential"),
            AuthError::RefreshRejected(msg) => write!(f, "refresh token rejected: {}", msg),
            AuthError::Endpoint(msg) => write!(f, "token endpoint error: {}", msg),
            AuthError::Store(msg) => write!(f, "credential store error: {}", msg),
            AuthError::ShortLived { expires_in, margin } => write!(
                f,
                "refreshed token expires in {}s, inside the {}s safety margin",
                expires_in, margin
            ),
            AuthError::StillUnauthorized => {
                write!(f, "request unauthorized after a forced refresh")
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Vendor API failures
#[derive(Debug, Clone, PartialEq)]
pub enum VendorApiError {
    /// 401: credential not accepted
    Unauthorized,
    /// Other 4xx (bad detail level, unknown resource). Terminal.
    Client { status: u16, body: String },
    /// 429: rate limited. Transient.
    RateLimited,
    /// 5xx. Transient.
    Server { status: u16 },
    /// Connect / read failure or timeout. Transient.
    Network(String),
    /// Body did not match the expected payload shape. Terminal.
    Payload(String),
}

impl VendorApiError {
    /// Whether a retry with backoff may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VendorApiError::RateLimited | VendorApiError::Server { .. } | VendorApiError::Network(_)
        )
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => VendorApiError::Unauthorized,
            429 => VendorApiError::RateLimited,
            500..=599 => VendorApiError::Server { status },
            _ => VendorApiError::Client { status, body },
        }
    }
}

impl fmt::Display for VendorApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorApiError::Unauthorized => write!(f, "vendor returned 401 unauthorized"),
            VendorApiError::Client { status, body } => {
                write!(f, "vendor rejected request ({}): {}", status, body)
            }
            VendorApiError::RateLimited => write!(f, "vendor rate limit hit (429)"),
            VendorApiError::Server { status } => write!(f, "vendor server error ({})", status),
            VendorApiError::Network(msg) => write!(f, "network error: {}", msg),
            VendorApiError::Payload(msg) => write!(f, "unexpected payload: {}", msg),
        }
    }
}

impl std::error::Error for VendorApiError {}

impl From<reqwest::Error> for VendorApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VendorApiError::Payload(err.to_string())
        } else {
            VendorApiError::Network(err.to_string())
        }
    }
}

/// SQLite failures
#[derive(Debug)]
pub enum StorageError {
    Database(rusqlite::Error),
    Io(std::io::Error),
    LockPoisoned,
    /// Blocking read task panicked or was cancelled
    Interrupted(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Database(e) => write!(f, "Database error: {}", e),
            StorageError::Io(e) => write!(f, "IO error: {}", e),
            StorageError::LockPoisoned => write!(f, "connection lock poisoned"),
            StorageError::Interrupted(msg) => write!(f, "storage task interrupted: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Gap filling failures. A failed run writes nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum ImputationError {
    InsufficientData { observed: usize, required: usize },
    NonConvergence(String),
    Timeout { after_ms: u64 },
    /// The fitting task panicked or was cancelled
    Aborted(String),
}

impl fmt::Display for ImputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImputationError::InsufficientData { observed, required } => write!(
                f,
                "insufficientData: {} observed points, at least {} required",
                observed, required
            ),
            ImputationError::NonConvergence(msg) => write!(f, "model did not converge: {}", msg),
            ImputationError::Timeout { after_ms } => {
                write!(f, "model fitting timed out after {}ms", after_ms)
            }
            ImputationError::Aborted(msg) => write!(f, "imputation task aborted: {}", msg),
        }
    }
}

impl std::error::Error for ImputationError {}

/// Structured error surfaced at the query / imputation boundary
#[derive(Debug)]
pub enum CoreError {
    Auth(AuthError),
    VendorApi(VendorApiError),
    Validation(String),
    Storage(StorageError),
    Imputation(ImputationError),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Auth(_) => ErrorCode::Auth,
            CoreError::VendorApi(_) => ErrorCode::VendorApi,
            CoreError::Validation(_) => ErrorCode::Validation,
            CoreError::Storage(_) => ErrorCode::Storage,
            CoreError::Imputation(_) => ErrorCode::Imputation,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Auth(e) => write!(f, "{}", e),
            CoreError::VendorApi(e) => write!(f, "{}", e),
            CoreError::Validation(msg) => write!(f, "{}", msg),
            CoreError::Storage(e) => write!(f, "{}", e),
            CoreError::Imputation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        CoreError::Auth(err)
    }
}

impl From<VendorApiError> for CoreError {
    fn from(err: VendorApiError) -> Self {
        CoreError::VendorApi(err)
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        CoreError::Storage(err)
    }
}

impl From<ImputationError> for CoreError {
    fn from(err: ImputationError) -> Self {
        CoreError::Imputation(err)
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(StorageError::Database(err))
    }
}
