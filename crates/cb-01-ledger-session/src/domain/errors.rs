//! # Domain Errors
//!
//! Error types for the ledger session, auth provider and signers.

use thiserror::Error;

/// Status classification of a ledger rejection.
///
/// Mirrors the RPC status codes the ledger reports; the JSON API carries
/// them as `grpcCodeValue` or implies them through the HTTP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Missing or expired credentials.
    Unauthenticated,
    /// Credentials valid but not allowed.
    PermissionDenied,
    /// Contract, party or resource unknown.
    NotFound,
    /// Duplicate creation or grant.
    AlreadyExists,
    /// Malformed request.
    InvalidArgument,
    /// Request conflicts with ledger state.
    FailedPrecondition,
    /// Concurrent modification, retry may succeed.
    Aborted,
    /// Deadline passed before completion.
    DeadlineExceeded,
    /// Ledger temporarily unreachable.
    Unavailable,
    /// Server-side failure.
    Internal,
    /// Anything else.
    Unknown,
}

impl StatusCode {
    /// Map a numeric RPC status code.
    pub fn from_grpc(code: i64) -> Self {
        match code {
            3 => StatusCode::InvalidArgument,
            4 => StatusCode::DeadlineExceeded,
            5 => StatusCode::NotFound,
            6 => StatusCode::AlreadyExists,
            7 => StatusCode::PermissionDenied,
            9 => StatusCode::FailedPrecondition,
            10 => StatusCode::Aborted,
            13 => StatusCode::Internal,
            14 => StatusCode::Unavailable,
            16 => StatusCode::Unauthenticated,
            _ => StatusCode::Unknown,
        }
    }

    /// Map an HTTP status code.
    pub fn from_http(status: u16) -> Self {
        match status {
            400 => StatusCode::InvalidArgument,
            401 => StatusCode::Unauthenticated,
            403 => StatusCode::PermissionDenied,
            404 => StatusCode::NotFound,
            409 => StatusCode::AlreadyExists,
            408 | 504 => StatusCode::DeadlineExceeded,
            429 | 502 | 503 => StatusCode::Unavailable,
            500 => StatusCode::Internal,
            _ => StatusCode::Unknown,
        }
    }
}

/// Errors from the client-credentials exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Credentials or token URL not configured.
    #[error("Auth configuration invalid: {0}")]
    ConfigInvalid(String),

    /// Token endpoint unreachable.
    #[error("Auth transport error: {0}")]
    Transport(String),

    /// Token endpoint answered with a non-200 status or an unusable body.
    #[error("Auth response error: {0}")]
    Response(String),
}

/// Errors from a caller-supplied signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// Key material unusable.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signing operation failed.
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Ledger session errors.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Transport failure reaching the ledger.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger answered with an error status.
    #[error("Ledger rejected request ({code:?}): {message}")]
    Rejected {
        /// Status classification
        code: StatusCode,
        /// Error text reported by the ledger
        message: String,
    },

    /// Active-contract query against an empty ledger (offset 0).
    #[error("Ledger is empty: active contracts require an offset > 0")]
    EmptyLedger,

    /// Active-contract query without any visible party.
    #[error("At least one party is required for an active contract query")]
    NoParties,

    /// Response could not be decoded.
    #[error("Malformed ledger response: {0}")]
    Malformed(String),

    /// No synchronizer is connected / configured.
    #[error("No synchronizer available")]
    NoSynchronizer,

    /// Bearer token could not be obtained.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Signing the prepared hash failed.
    #[error(transparent)]
    Signer(#[from] SignerError),

    /// Session misconfigured.
    #[error("Ledger configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Build a rejection.
    pub fn rejected(code: StatusCode, message: impl Into<String>) -> Self {
        LedgerError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Status code of a rejection, if any.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            LedgerError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Unauthenticated / PermissionDenied: the cached token should be dropped.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.code(),
            Some(StatusCode::Unauthenticated) | Some(StatusCode::PermissionDenied)
        )
    }

    /// Whether a stream interrupted by this error should be reopened.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Unavailable(_) => true,
            LedgerError::Auth(AuthError::Transport(_)) => true,
            LedgerError::Rejected { code, .. } => matches!(
                code,
                StatusCode::Unavailable
                    | StatusCode::DeadlineExceeded
                    | StatusCode::Aborted
                    | StatusCode::Internal
                    | StatusCode::Unknown
                    | StatusCode::Unauthenticated
                    | StatusCode::PermissionDenied
            ),
            _ => false,
        }
    }

    /// Idempotency race: the operation already happened.
    pub fn is_already_exists(&self) -> bool {
        match self {
            LedgerError::Rejected { code, message } => {
                *code == StatusCode::AlreadyExists
                    || message.to_ascii_lowercase().contains("already")
            }
            _ => false,
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
