//! Validation helpers for DTOs.

use validator::ValidationError;

/// Length of a YouTube video identifier.
const VIDEO_ID_LEN: usize = 11;

/// Validates that a video ID looks like a YouTube identifier: 11 characters of
/// the URL-safe base64 alphabet.
///
/// # Examples
///
/// ```ignore
/// validate_video_id("dQw4w9WgXcQ") // Ok
/// validate_video_id("dQw4w9WgXc")  // Err - too short
/// validate_video_id("dQw4w9WgX?Q") // Err - invalid character
/// ```
pub fn validate_video_id(id: &str) -> Result<(), ValidationError> {
    if id.len() != VIDEO_ID_LEN {
        let mut err = ValidationError::new("video_id_length");
        err.message = Some(
            format!(
                "Video ID must be exactly {VIDEO_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("video_id_format");
        err.message = Some("Video ID may only contain letters, digits, `-` and `_`".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects strings that are empty once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_video_id_valid() {
        assert!(validate_video_id("dQw4w9WgXcQ").is_ok());
        assert!(validate_video_id("a-b_c-d_e-f").is_ok());
    }

    #[test]
    fn test_validate_video_id_invalid_length() {
        assert!(validate_video_id("dQw4w9WgXc").is_err());
        assert!(validate_video_id("dQw4w9WgXcQQ").is_err());
        assert!(validate_video_id("").is_err());
    }

    #[test]
    fn test_validate_video_id_invalid_format() {
        assert!(validate_video_id("dQw4w9WgX?Q").is_err());
        assert!(validate_video_id("dQw4w9 gXcQ").is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("queen").is_ok());
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("").is_err());
    }
}
