//! Errors returned by the provider handle.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider daemon is not running")]
    DaemonStopped,

    #[error("Provider daemon dropped the request")]
    ReplyDropped,
}
