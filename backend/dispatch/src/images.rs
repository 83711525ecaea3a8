//! Image discovery and loading.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use nameplate_core::{ImageInput, NameplateError};

/// Extensions picked up from the input directory.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Detect MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    match extension(path).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

pub fn is_supported_image(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension(path).as_str())
}

/// Supported images directly inside `dir`, sorted by path.
///
/// A missing or unreadable directory yields an empty list.
pub async fn list_images(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot read input directory");
            return Vec::new();
        }
    };

    let mut images = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                if is_file && is_supported_image(&path) {
                    images.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Error while listing input directory");
                break;
            }
        }
    }
    images.sort();
    debug!(dir = %dir.display(), count = images.len(), "Listed images");
    images
}

/// File name used to label an image in records and logs.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read an image from disk.
pub async fn load_image(path: &Path) -> Result<ImageInput, NameplateError> {
    let name = display_name(path);
    let bytes = fs::read(path).await.map_err(|e| NameplateError::Image {
        image: name.clone(),
        message: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(NameplateError::Image {
            image: name,
            message: "file is empty".to_string(),
        });
    }
    Ok(ImageInput::new(name, detect_mime_type(path), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_by_extension() {
        assert_eq!(detect_mime_type(Path::new("a/PLATE.JPG")), "image/jpeg");
        assert_eq!(detect_mime_type(Path::new("b.webp")), "image/webp");
        assert_eq!(detect_mime_type(Path::new("c.gif")), "application/octet-stream");
        assert!(!is_supported_image(Path::new("notes.txt")));
    }

    #[tokio::test]
    async fn lists_sorted_supported_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.tiff"] {
            fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).await.unwrap();

        let names: Vec<String> = list_images(dir.path())
            .await
            .iter()
            .map(|p| display_name(p))
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.tiff"]);
    }

    #[tokio::test]
    async fn missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_images(&dir.path().join("absent")).await.is_empty());
    }

    #[tokio::test]
    async fn unreadable_image_is_a_per_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("gone.jpg")).await.unwrap_err();
        assert!(err.is_per_image());

        let empty = dir.path().join("empty.png");
        fs::write(&empty, b"").await.unwrap();
        assert!(load_image(&empty).await.is_err());
    }
}
