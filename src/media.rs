use std::path::{Component, Path, PathBuf};

use actix_web::{web, HttpResponse};
use image::ImageFormat;
use mime_guess::from_path;
use uuid::Uuid;

use crate::core::errors::{ApiError, ApiResult};
use crate::AppState;

/// Subdirectory of the media root that post images are written to.
pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Recognises an upload by its magic bytes, never by the client's filename.
pub fn detect_image(bytes: &[u8]) -> Option<&'static str> {
    let extension = match image::guess_format(bytes).ok()? {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        _ => return None,
    };
    Some(extension)
}

/// Writes the image under a fresh name and returns its path relative to the media root.
pub async fn save_image(media_root: &Path, upload: &ImageUpload) -> ApiResult<String> {
    let dir = media_root.join(POST_IMAGE_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let name = format!("{}.{}", Uuid::new_v4(), upload.extension);
    tokio::fs::write(dir.join(&name), &upload.bytes).await?;

    let relative = format!("{}/{}", POST_IMAGE_DIR, name);
    tracing::debug!(path = %relative, bytes = upload.bytes.len(), "image stored");
    Ok(relative)
}

/// Best effort; a missing file is not an error worth failing a request for.
pub async fn remove_image(media_root: &Path, relative: &str) {
    let Some(path) = resolve(media_root, relative) else {
        return;
    };
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove image");
    }
}

/// Passes `result` through, deleting the freshly stored `image` when the
/// database write it belonged to failed.
pub async fn discard_on_error<T>(
    media_root: &Path,
    image: Option<&str>,
    result: Result<T, sqlx::Error>,
) -> ApiResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Some(relative) = image {
                remove_image(media_root, relative).await;
            }
            Err(e.into())
        }
    }
}

/// Joins a request path onto the media root, refusing anything that could escape it.
fn resolve(media_root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative.trim_matches('/'));
    if relative.as_os_str().is_empty() {
        return None;
    }
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(media_root.join(relative))
}

pub async fn serve_media(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let requested = path.into_inner();
    let file_path = resolve(&state.config.media_root, &requested)
        .ok_or_else(|| ApiError::NotFound(requested.clone()))?;

    let bytes = match tokio::fs::read(&file_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(requested));
        }
        Err(e) => return Err(e.into()),
    };

    let mime = from_path(&file_path).first_or_octet_stream();
    Ok(HttpResponse::Ok().content_type(mime.as_ref()).body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_formats() {
        assert_eq!(detect_image(b"GIF89a\x01\x00\x01\x00"), Some("gif"));
        assert_eq!(detect_image(b"\x89PNG\r\n\x1a\n0000"), Some("png"));
        assert_eq!(detect_image(b"\xFF\xD8\xFF\xE0"), Some("jpg"));
        assert_eq!(detect_image(b"hello world"), None);
        assert_eq!(detect_image(b""), None);
    }

    #[test]
    fn resolve_rejects_traversal() {
        let root = Path::new("/srv/media");
        assert_eq!(
            resolve(root, "posts/a.gif"),
            Some(PathBuf::from("/srv/media/posts/a.gif"))
        );
        assert_eq!(
            resolve(root, "/posts/a.gif/"),
            Some(PathBuf::from("/srv/media/posts/a.gif"))
        );
        assert!(resolve(root, "../etc/passwd").is_none());
        assert!(resolve(root, "posts/../../etc/passwd").is_none());
        assert!(resolve(root, "").is_none());
    }

    #[actix_web::test]
    async fn saves_and_removes_images() {
        let dir = tempfile::tempdir().unwrap();
        let upload = ImageUpload {
            extension: "gif",
            bytes: b"GIF89a".to_vec(),
        };
        let relative = save_image(dir.path(), &upload).await.unwrap();
        assert!(relative.starts_with("posts/") && relative.ends_with(".gif"));

        let stored = dir.path().join(&relative);
        assert_eq!(std::fs::read(&stored).unwrap(), b"GIF89a");

        remove_image(dir.path(), &relative).await;
        assert!(!stored.exists());
    }

    #[actix_web::test]
    async fn failed_writes_drop_the_new_image() {
        let dir = tempfile::tempdir().unwrap();
        let upload = ImageUpload {
            extension: "gif",
            bytes: b"GIF89a".to_vec(),
        };

        let kept = save_image(dir.path(), &upload).await.unwrap();
        let value = discard_on_error(dir.path(), Some(&kept), Ok::<_, sqlx::Error>(7))
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert!(dir.path().join(&kept).exists());

        let orphan = save_image(dir.path(), &upload).await.unwrap();
        let failed: Result<(), sqlx::Error> = Err(sqlx::Error::RowNotFound);
        let err = discard_on_error(dir.path(), Some(&orphan), failed).await.unwrap_err();
        assert!(matches!(err, ApiError::Database(_)));
        assert!(!dir.path().join(&orphan).exists());
    }
}
