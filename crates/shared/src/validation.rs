//! Common validation utilities.

use url::Url;
use validator::ValidationError;

/// Maximum accepted length of an opaque user identifier.
const MAX_USER_ID_LEN: usize = 255;

/// Maximum accepted length of a target URL.
const MAX_URL_LEN: usize = 2048;

/// Parses a target URL for analysis.
///
/// The URL must carry an `http` or `https` scheme and a non-empty host.
pub fn parse_target_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_URL_LEN {
        let mut err = ValidationError::new("url_length");
        err.message = Some("URL must be between 1 and 2048 characters".into());
        return Err(err);
    }

    let url = Url::parse(trimmed).map_err(|_| {
        let mut err = ValidationError::new("url_format");
        err.message = Some("URL must include a scheme and host".into());
        err
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        let mut err = ValidationError::new("url_scheme");
        err.message = Some("URL scheme must be http or https".into());
        return Err(err);
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => {
            let mut err = ValidationError::new("url_host");
            err.message = Some("URL must include a host".into());
            Err(err)
        }
    }
}

/// Returns the host of a URL without a leading `www.`.
pub fn bare_domain(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Validates an opaque user identifier issued by the identity provider.
pub fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_USER_ID_LEN {
        let mut err = ValidationError::new("user_id_length");
        err.message = Some("User id must be between 1 and 255 characters".into());
        return Err(err);
    }
    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("user_id_format");
        err.message = Some("User id contains control characters".into());
        return Err(err);
    }
    Ok(())
}
