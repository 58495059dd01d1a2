use thiserror::Error;

pub type PageResult<T> = std::result::Result<T, PageError>;

#[derive(Debug, Error)]
pub enum PageError {
    /// Missing or invalid credentials/endpoint, raised before a session starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One batch failed at the translation service. Logged, never returned
    /// from a session.
    #[error("translation service failed for batch {batch}: {source}")]
    Service {
        batch: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("no text found to translate")]
    EmptyInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("translation already in progress")]
    AlreadyInProgress,
    #[error("no translation to revert")]
    NothingToRevert,
}

impl PageError {
    pub fn configuration(message: impl Into<String>) -> Self {
        PageError::Configuration(message.into())
    }

    pub fn service(batch: usize, source: anyhow::Error) -> Self {
        PageError::Service { batch, source }
    }

    pub fn state(&self) -> Option<StateError> {
        match self {
            PageError::State(state) => Some(*state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_errors_render_host_messages() {
        let err = PageError::from(StateError::AlreadyInProgress);
        assert_eq!(err.to_string(), "translation already in progress");
        assert_eq!(err.state(), Some(StateError::AlreadyInProgress));

        let err = PageError::from(StateError::NothingToRevert);
        assert_eq!(err.to_string(), "no translation to revert");
    }

    #[test]
    fn service_error_keeps_batch_and_source() {
        let err = PageError::service(4, anyhow::anyhow!("quota exceeded"));
        assert_eq!(
            err.to_string(),
            "translation service failed for batch 4: quota exceeded"
        );
        assert!(err.state().is_none());
    }
}
