//! Input validation helpers.

use crate::error::{PublishError, Result};
use std::path::Path;

/// Largest eyecatch image the platform accepts.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Image extensions the platform accepts, lowercase.
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Lowercased extension of `path`, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Checks if a file has a supported image extension.
pub fn is_image_file(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// MIME type sent with an uploaded image.
pub fn content_type_of(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Checks if a file is a markdown file.
pub fn is_markdown_file(path: &Path) -> bool {
    matches!(extension_of(path).as_deref(), Some("md" | "markdown"))
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(PublishError::invalid_input("title must not be empty"));
    }
    Ok(())
}

/// Checks that `path` is an existing image of a supported type and size.
///
/// Returns the file size in bytes.
pub async fn validate_image(path: &Path) -> Result<u64> {
    if !is_image_file(path) {
        return Err(PublishError::invalid_input(format!(
            "unsupported image type {} (expected one of: {})",
            path.display(),
            SUPPORTED_IMAGE_EXTENSIONS.join(", ")
        )));
    }

    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        PublishError::invalid_input(format!("image {} is not readable: {e}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(PublishError::invalid_input(format!(
            "image {} is not a regular file",
            path.display()
        )));
    }

    let size = metadata.len();
    if size > MAX_IMAGE_BYTES {
        return Err(PublishError::invalid_input(format!(
            "image {} is {:.1}MB, the limit is {}MB",
            path.display(),
            size as f64 / 1024.0 / 1024.0,
            MAX_IMAGE_BYTES / 1024 / 1024
        )));
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::Builder;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("cover.png")));
        assert!(is_image_file(Path::new("cover.JPG")));
        assert!(is_image_file(Path::new("dir/cover.jpeg")));
        assert!(is_image_file(Path::new("anim.gif")));
        assert!(!is_image_file(Path::new("cover.webp")));
        assert!(!is_image_file(Path::new("cover")));
        assert!(!is_image_file(Path::new("notes.md")));
    }

    #[test]
    fn test_is_markdown_file() {
        assert!(is_markdown_file(Path::new("post.md")));
        assert!(is_markdown_file(Path::new("post.Markdown")));
        assert!(!is_markdown_file(Path::new("post.txt")));
    }

    #[test]
    fn test_content_type_of() {
        assert_eq!(content_type_of(Path::new("a.png")), "image/png");
        assert_eq!(content_type_of(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(content_type_of(Path::new("a.gif")), "image/gif");
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Hello").is_ok());
        assert!(matches!(
            validate_title("   "),
            Err(PublishError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_validate_image_accepts_small_png() {
        let file = Builder::new().suffix(".png").tempfile().unwrap();
        std::fs::write(file.path(), [0x89, b'P', b'N', b'G']).unwrap();

        assert_eq!(validate_image(file.path()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_validate_image_rejects_oversized() {
        let file = Builder::new().suffix(".jpg").tempfile().unwrap();
        file.as_file().set_len(MAX_IMAGE_BYTES + 1).unwrap();

        let err = validate_image(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("limit is 10MB"));
    }

    #[tokio::test]
    async fn test_validate_image_rejects_missing_and_wrong_type() {
        let missing = PathBuf::from("/no/such/dir/cover.png");
        assert!(matches!(
            validate_image(&missing).await,
            Err(PublishError::InvalidInput { .. })
        ));

        let file = Builder::new().suffix(".bmp").tempfile().unwrap();
        assert!(matches!(
            validate_image(file.path()).await,
            Err(PublishError::InvalidInput { .. })
        ));
    }
}
