//! Outcome of a side effect whose failure must not stop the caller
//!
//! Logout notifies the server and clears stored credentials, but neither
//! failure may keep the user signed in. Those steps return [`BestEffort`]
//! so the failure is still visible to callers and tests instead of being
//! silently dropped.

use std::fmt;

/// Result of a best-effort operation
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum BestEffort<E> {
    /// The side effect completed
    Done,
    /// The side effect failed and the caller carried on anyway
    Ignored(E),
}

impl<E> BestEffort<E> {
    /// Wrap a `Result`, keeping the error if there was one
    pub fn from_result<T>(result: Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Done,
            Err(err) => Self::Ignored(err),
        }
    }

    /// Whether the side effect completed
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The ignored error, if any
    #[must_use]
    pub fn ignored(&self) -> Option<&E> {
        match self {
            Self::Done => None,
            Self::Ignored(err) => Some(err),
        }
    }

    /// Convert the ignored error
    pub fn map_err<F, O>(self, op: O) -> BestEffort<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Self::Done => BestEffort::Done,
            Self::Ignored(err) => BestEffort::Ignored(op(err)),
        }
    }
}

impl<T, E> From<Result<T, E>> for BestEffort<E> {
    fn from(result: Result<T, E>) -> Self {
        Self::from_result(result)
    }
}

impl<E: fmt::Display> fmt::Display for BestEffort<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Ignored(err) => write!(f, "ignored: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_results() {
        let ok: BestEffort<String> = Ok::<(), String>(()).into();
        let failed: BestEffort<String> = Err::<(), _>("offline".to_string()).into();

        assert!(ok.is_done());
        assert_eq!(failed.ignored().map(String::as_str), Some("offline"));
        assert_eq!(failed.to_string(), "ignored: offline");
    }

    #[test]
    fn map_err_converts_the_error() {
        let failed = BestEffort::Ignored(404_u16).map_err(|code| format!("status {code}"));
        assert_eq!(failed, BestEffort::Ignored("status 404".to_string()));
    }
}
