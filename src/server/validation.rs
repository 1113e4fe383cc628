use chrono::{DateTime, FixedOffset};

use crate::server::response::ApiError;

const MAX_SLUG_LEN: usize = 100;

/// `/builds/*` hosts the trigger webhooks, so that slug can never be a project.
const RESERVED_SLUGS: &[&str] = &["builds", "health"];

pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.is_empty() {
        return Err(ApiError::bad_request("slug cannot be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(ApiError::bad_request(format!(
            "slug cannot exceed {MAX_SLUG_LEN} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::bad_request(
            "slug can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }
    if RESERVED_SLUGS.contains(&slug) {
        return Err(ApiError::bad_request(format!("slug '{slug}' is reserved")));
    }
    Ok(())
}

/// Accepts RFC 2822 ("Mon, 26 Oct 2009 16:22:00 -0500"), RFC 3339, and bare
/// `%Y-%m-%dT%H:%M:%S` (taken as UTC). The submitted offset is preserved.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc().fixed_offset())
        })
}

/// Timestamps go out RFC 2822, matching what clients submit.
pub fn format_timestamp(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc2822()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_rfc2822() {
        let dt = parse_timestamp("Mon, 26 Oct 2009 16:22:00 -0500").unwrap();
        assert_eq!(format_timestamp(&dt), "Mon, 26 Oct 2009 16:22:00 -0500");
    }

    #[test]
    fn accepts_rfc3339() {
        let dt = parse_timestamp("2009-10-26T16:22:00-05:00").unwrap();
        assert_eq!(format_timestamp(&dt), "Mon, 26 Oct 2009 16:22:00 -0500");
    }

    #[test]
    fn accepts_bare_iso_as_utc() {
        let dt = parse_timestamp("2009-10-26T16:22:00").unwrap();
        assert_eq!(format_timestamp(&dt), "Mon, 26 Oct 2009 16:22:00 +0000");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("yesterday-ish").is_none());
    }

    #[test]
    fn slug_rules() {
        assert!(validate_slug("pony-build_2").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("has space").is_err());
        assert!(validate_slug("builds").is_err());
    }
}
