use serde::Deserialize;
use thiserror::Error;

use super::{DependencyKind, Job, UnknownKind};

/// Validation failures for inbound request messages
///
/// All of them lead to the message being rejected without requeue.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),
    #[error("request reference is empty")]
    EmptyReference,
}

/// Inbound job descriptor
///
/// `id`, `kind` and `reference` are required. `state` and `timestamp` are
/// accepted for compatibility with producers that echo the status shape, but
/// a new job always starts in `CREATED`. The legacy field names `type`,
/// `dependency`, `status` and `date` are accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub id: i64,
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(alias = "dependency")]
    pub reference: String,
    #[serde(default, alias = "status")]
    pub state: Option<String>,
    #[serde(default, alias = "date")]
    pub timestamp: Option<String>,
}

impl JobRequest {
    pub fn into_job(self) -> Result<Job, DecodeError> {
        let kind: DependencyKind = self.kind.parse()?;
        let reference = self.reference.trim();
        if reference.is_empty() {
            return Err(DecodeError::EmptyReference);
        }
        Ok(Job::new(self.id, kind, reference))
    }
}

/// Decode a raw message body into a fresh job
pub fn decode_job(body: &[u8]) -> Result<Job, DecodeError> {
    let request: JobRequest = serde_json::from_slice(body)?;
    request.into_job()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;

    #[test]
    fn test_decode_full_message() {
        let body = br#"{"id":1,"kind":"FILE","reference":"https://host/a.bin","state":"CREATED","timestamp":"2024-05-01T10:00:00Z"}"#;
        let job = decode_job(body).unwrap();
        assert_eq!(job.id(), 1);
        assert_eq!(job.kind(), DependencyKind::File);
        assert_eq!(job.reference(), "https://host/a.bin");
        assert_eq!(job.state(), JobState::Created);
    }

    #[test]
    fn test_decode_ignores_inbound_state() {
        let body = br#"{"id":1,"kind":"NPM","reference":"left-pad","state":"DONE"}"#;
        let job = decode_job(body).unwrap();
        assert_eq!(job.state(), JobState::Created);
    }

    #[test]
    fn test_decode_legacy_field_names() {
        let body = br#"{"id":5,"type":"MAVEN","dependency":"org.slf4j:slf4j-api:2.0.9","status":"STARTED","date":"2024-05-01T10:00:00"}"#;
        let job = decode_job(body).unwrap();
        assert_eq!(job.kind(), DependencyKind::Maven);
        assert_eq!(job.reference(), "org.slf4j:slf4j-api:2.0.9");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let body = br#"{"id":1,"kind":"HELM","reference":"https://charts/index.yaml","priority":"high"}"#;
        assert!(decode_job(body).is_ok());
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let body = br#"{"id":1,"kind":"FILE"}"#;
        assert!(matches!(decode_job(body), Err(DecodeError::Malformed(_))));

        let body = br#"{"kind":"FILE","reference":"https://host/a.bin"}"#;
        assert!(matches!(decode_job(body), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_non_json_is_malformed() {
        assert!(matches!(
            decode_job(b"not json at all"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let body = br#"{"id":3,"kind":"SVN","reference":"svn://repo"}"#;
        let err = decode_job(body).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownKind(UnknownKind(ref k)) if k == "SVN"));
    }

    #[test]
    fn test_blank_reference_is_rejected() {
        let body = br#"{"id":3,"kind":"FILE","reference":"   "}"#;
        assert!(matches!(decode_job(body), Err(DecodeError::EmptyReference)));
    }
}
