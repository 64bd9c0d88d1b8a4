/// A boxed error suitable for crossing the collector boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`Collector::pull`](super::Collector::pull).
///
/// Pull failures are logged by the store and never deactivate a collector.
pub type PullError = BoxError;

/// Errors returned by [`Collector::start`](super::Collector::start).
///
/// The variant determines the collector's fate: `Retriable` keeps it as a
/// candidate for the next retry tick, any other error discards it
/// permanently.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("could not start, but will retry: {0}")]
    Retriable(#[source] BoxError),
    #[error("could not start: {0}")]
    Terminal(#[source] BoxError),
}

impl StartError {
    pub fn retriable(err: impl Into<BoxError>) -> Self {
        StartError::Retriable(err.into())
    }

    pub fn terminal(err: impl Into<BoxError>) -> Self {
        StartError::Terminal(err.into())
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, StartError::Retriable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_error_classification() {
        assert!(StartError::retriable("kubelet not reachable yet").is_retriable());
        assert!(!StartError::terminal("not running in Kubernetes").is_retriable());
    }
}
