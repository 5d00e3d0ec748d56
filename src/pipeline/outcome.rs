use super::error::PipelineError;

/// How a pipeline run ended, from the message broker's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Artifact delivered
    Completed,
    /// Failed for good; redelivering the request cannot help
    Rejectable,
    /// Failed for now; the request should be redelivered
    Retryable,
}

impl From<&PipelineError> for PipelineOutcome {
    fn from(err: &PipelineError) -> Self {
        if err.is_permanent() {
            PipelineOutcome::Rejectable
        } else {
            PipelineOutcome::Retryable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::FetchError;

    #[test]
    fn test_outcome_from_error() {
        let not_found = PipelineError::Fetch(FetchError::NotFound("nope".into()));
        assert_eq!(PipelineOutcome::from(&not_found), PipelineOutcome::Rejectable);
        assert_eq!(
            PipelineOutcome::from(&PipelineError::MissingArchive),
            PipelineOutcome::Retryable
        );
    }
}
