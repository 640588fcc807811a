//! The error kinds surfaced by the core, and their translation to LSP
//! `ResponseError`s at the reply boundary.
//!
//! Every request handler returns `Result<T, CoreError>`. Handlers never
//! swallow an error silently; best-effort subsystems (additional rename
//! files, work-done progress creation) catch `CoreError` internally and
//! log rather than propagate, per the propagation policy.

use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::Range;

use crate::document::DocumentUri;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("workspace not open for {0}")]
    WorkspaceNotOpen(DocumentUri),

    #[error("invalid range: {0:?}")]
    InvalidRange(Range),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Unknown(String),

    #[error("cancelled")]
    Cancelled,

    #[error("backend does not support required capability: {0}")]
    VersionNotSupported(String),

    #[error("document not open: {0}")]
    NotOpen(DocumentUri),

    #[error("edit version {given} is not newer than current version {current}")]
    StaleVersion { given: i32, current: i32 },

    #[error("dispatch failure: {0}")]
    Dispatch(String),

    #[error("no toolchain supports language {0}")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    fn code(&self) -> jsonrpc::ErrorCode {
        match self {
            CoreError::MethodNotFound(_) => jsonrpc::ErrorCode::MethodNotFound,
            CoreError::InvalidRange(_) | CoreError::StaleVersion { .. } => {
                jsonrpc::ErrorCode::InvalidParams
            }
            // -32800 is the LSP-defined "RequestCancelled" code; jsonrpc's
            // own ErrorCode enum has no variant for it.
            CoreError::Cancelled => jsonrpc::ErrorCode::ServerError(-32800),
            _ => jsonrpc::ErrorCode::InternalError,
        }
    }
}

impl From<CoreError> for jsonrpc::Error {
    fn from(err: CoreError) -> Self {
        jsonrpc::Error {
            code: err.code(),
            message: err.to_string().into(),
            data: None,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
