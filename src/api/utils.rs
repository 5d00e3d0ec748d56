//! Stateless request checks shared by the handlers

use crate::api::error::ApiError;

/// Accepts `application/json` with or without parameters; anything else,
/// including `+json` suffixes and `text/json`, is an invalid payload
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Bodies of exactly `max_size` bytes are allowed
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_type_valid() {
        assert!(parse_content_type("application/json").is_ok());
        assert!(parse_content_type("application/json; charset=utf-8").is_ok());
        assert!(parse_content_type("application/json; charset=UTF-8").is_ok());
    }

    #[test]
    fn test_parse_content_type_invalid() {
        assert!(parse_content_type("application/jsonp").is_err());
        assert!(parse_content_type("application/json-patch+json").is_err());
        assert!(parse_content_type("text/json").is_err());
        assert!(parse_content_type("text/plain").is_err());
        assert!(parse_content_type("invalid").is_err());
        assert!(parse_content_type("").is_err());
    }

    #[test]
    fn test_body_at_limit_is_accepted() {
        let request = br#"{"id":1,"kind":"FILE","reference":"https://host/a.bin"}"#;
        assert!(validate_body_size(request, request.len()).is_ok());
        assert!(validate_body_size(&[], 0).is_ok());
    }

    #[test]
    fn test_body_over_limit_reports_size() {
        let request = vec![b' '; 65_537];
        match validate_body_size(&request, 65_536) {
            Err(ApiError::PayloadTooLarge(size)) => assert_eq!(size, 65_537),
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_content_type_errors_are_bad_requests() {
        let err = parse_content_type("text/plain").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_PAYLOAD");
    }
}
