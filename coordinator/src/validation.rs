use kubently_common::types::{
    DEFAULT_SESSION_TTL_SECONDS, MAX_COMMAND_TIMEOUT_SECONDS, MAX_SESSION_TTL_SECONDS,
    MIN_SESSION_TTL_SECONDS,
};

use crate::error::ApiError;

/// Lowercase DNS-label form, 1-100 chars: `[a-z0-9]([-a-z0-9]*[a-z0-9])?`.
pub fn cluster_id(value: &str) -> Result<(), ApiError> {
    if value.is_empty() || value.len() > 100 {
        return Err(ApiError::Validation(
            "cluster_id must be 1-100 characters".into(),
        ));
    }
    let bytes = value.as_bytes();
    let valid_char = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-';
    if !bytes.iter().all(|&b| valid_char(b))
        || bytes[0] == b'-'
        || bytes[bytes.len() - 1] == b'-'
    {
        return Err(ApiError::Validation(
            "cluster_id must be a lowercase DNS label".into(),
        ));
    }
    Ok(())
}

pub fn args(args: &[String]) -> Result<(), ApiError> {
    if args.is_empty() || args.len() > 20 {
        return Err(ApiError::Validation(
            "args must contain between 1 and 20 elements".into(),
        ));
    }
    Ok(())
}

pub fn session_ttl(ttl: Option<u32>) -> Result<u32, ApiError> {
    let ttl = ttl.unwrap_or(DEFAULT_SESSION_TTL_SECONDS);
    if !(MIN_SESSION_TTL_SECONDS..=MAX_SESSION_TTL_SECONDS).contains(&ttl) {
        return Err(ApiError::Validation(format!(
            "ttl_seconds must be between {MIN_SESSION_TTL_SECONDS} and {MAX_SESSION_TTL_SECONDS}"
        )));
    }
    Ok(ttl)
}

pub fn command_timeout(requested: Option<u32>, default_seconds: u32) -> Result<u32, ApiError> {
    let timeout = requested.unwrap_or(default_seconds);
    if timeout == 0 || timeout > MAX_COMMAND_TIMEOUT_SECONDS {
        return Err(ApiError::Validation(format!(
            "timeout_seconds must be between 1 and {MAX_COMMAND_TIMEOUT_SECONDS}"
        )));
    }
    Ok(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_cluster_id() {
        assert!(cluster_id("kind").is_ok());
        assert!(cluster_id("us-east-1-prod").is_ok());
    }

    #[test]
    fn rejects_invalid_cluster_id() {
        assert!(cluster_id("").is_err());
        assert!(cluster_id("-bad").is_err());
        assert!(cluster_id("Bad_ID").is_err());
    }

    #[test]
    fn rejects_args_out_of_range() {
        assert!(args(&[]).is_err());
        let too_many: Vec<String> = (0..21).map(|i| i.to_string()).collect();
        assert!(args(&too_many).is_err());
    }

    #[test]
    fn rejects_ttl_out_of_range() {
        assert!(session_ttl(Some(30)).is_err());
        assert!(session_ttl(Some(4000)).is_err());
        assert!(session_ttl(None).is_ok());
    }
}
