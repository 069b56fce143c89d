use thiserror::Error;

/// Outcome taxonomy for fetches and mutations.
///
/// Nothing here is fatal: callers turn every variant into view state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// A backward fetch found nothing newer. Not a failure, and never a
    /// signal that the collection is exhausted.
    #[error("no new data")]
    NoNewData,

    #[error("not signed in")]
    Unauthorized,

    #[error("access denied")]
    AccessDenied,

    #[error("not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server returned status {0}")]
    Status(u16),

    /// The view was torn down while the request was running; its result was dropped.
    #[error("feed detached")]
    Detached,

    /// Another change to the same item has not settled yet.
    #[error("a change to this item is already in flight")]
    Busy,

    #[error("invalid response: {0}")]
    Decode(String),
}

impl FeedError {
    /// Transient failures the user may retry. Authorization failures never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Transport(_) | FeedError::Status(_))
    }

    pub fn is_no_new_data(&self) -> bool {
        matches!(self, FeedError::NoNewData)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, FeedError::Unauthorized | FeedError::AccessDenied)
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(FeedError::Transport("reset".into()).is_retryable());
        assert!(FeedError::Status(502).is_retryable());
        assert!(!FeedError::Unauthorized.is_retryable());
        assert!(!FeedError::AccessDenied.is_retryable());
        assert!(!FeedError::NoNewData.is_retryable());
        assert!(FeedError::AccessDenied.is_auth());
    }
}
