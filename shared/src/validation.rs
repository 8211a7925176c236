use validator::ValidationError;

use crate::constants::{ALLOWED_IMAGE_TYPES, MAX_IMAGE_SIZE};
use crate::generation::ArtStyle;
use crate::heroes::is_known_hero;

pub fn validate_image_type(content_type: &str) -> Result<(), ValidationError> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err(ValidationError::new("invalid_image_type"));
    }
    Ok(())
}

pub fn validate_image_size(size: u64) -> Result<(), ValidationError> {
    if size > MAX_IMAGE_SIZE {
        return Err(ValidationError::new("image_too_large"));
    }
    Ok(())
}

pub fn validate_image_url(url: &str, allow_insecure: bool) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::new("missing_image_url"));
    }
    let secure = url.starts_with("https://");
    let insecure_ok = allow_insecure && url.starts_with("http://");
    if !secure && !insecure_ok {
        return Err(ValidationError::new("insecure_image_url"));
    }
    Ok(())
}

pub fn validate_hero(hero: &str) -> Result<(), ValidationError> {
    if !is_known_hero(hero) {
        return Err(ValidationError::new("unknown_hero"));
    }
    Ok(())
}

pub fn parse_style(style: &str) -> Result<ArtStyle, ValidationError> {
    style
        .parse::<ArtStyle>()
        .map_err(|_| ValidationError::new("invalid_style"))
}

// File extension for a stored upload, png when unknown
pub fn mime_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "png",
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_type_allowlist() {
        assert!(validate_image_type("image/png").is_ok());
        assert!(validate_image_type("image/webp").is_ok());
        let err = validate_image_type("image/gif").unwrap_err();
        assert_eq!(err.code, "invalid_image_type");
    }

    #[test]
    fn test_image_size_limit_is_inclusive() {
        assert!(validate_image_size(MAX_IMAGE_SIZE).is_ok());
        assert!(validate_image_size(MAX_IMAGE_SIZE + 1).is_err());
    }

    #[test]
    fn test_image_url_scheme() {
        assert!(validate_image_url("https://i.imgur.com/x.png", false).is_ok());
        assert!(validate_image_url("http://localhost:3000/uploads/x.png", false).is_err());
        assert!(validate_image_url("http://localhost:3000/uploads/x.png", true).is_ok());
        assert!(validate_image_url("ftp://example.com/x.png", true).is_err());
        assert_eq!(validate_image_url("", true).unwrap_err().code, "missing_image_url");
    }

    #[test]
    fn test_parse_style() {
        assert_eq!(parse_style("comic").unwrap(), ArtStyle::Comic);
        assert!(parse_style("Comic").is_err());
    }

    #[test]
    fn test_mime_extension() {
        assert_eq!(mime_extension("image/jpeg"), "jpg");
        assert_eq!(mime_extension("application/pdf"), "png");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(MAX_IMAGE_SIZE), "5 MB");
    }
}
