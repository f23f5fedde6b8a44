use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{rejection::PathRejection, Multipart, Path, State},
    Extension,
};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::database::models::Attachment;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

pub const FILE_FIELD: &str = "file";
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Accepted extensions and the MIME type each one is stored with
const ALLOWED_TYPES: [(&str, &str); 6] = [
    ("pdf", "application/pdf"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
];

pub fn mime_for(file_name: &str) -> Option<&'static str> {
    let ext = FsPath::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_TYPES.iter().find(|(e, _)| *e == ext).map(|(_, mime)| *mime)
}

/// `<unix-ts>-<token>-<base name with spaces replaced>`; directory parts are
/// dropped. The token keeps same-second uploads of one name apart.
pub fn stored_name(original: &str, timestamp: i64, token: Uuid) -> Option<String> {
    let base = FsPath::new(original).file_name()?.to_str()?.trim();
    if base.is_empty() {
        return None;
    }
    Some(format!("{}-{}-{}", timestamp, token.simple(), base.replace(' ', "_")))
}

/// Writes `bytes` to a file that must not exist yet.
async fn write_new(path: &FsPath, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;
    if let Err(e) = written {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(e);
    }
    Ok(())
}

struct Upload {
    original_name: String,
    bytes: Vec<u8>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("uploaded file has no name"))?;
        let bytes = field.bytes().await?;
        return Ok(Upload {
            original_name,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::bad_request(format!("multipart field '{}' is required", FILE_FIELD)))
}

/// POST /achievements/:id/attachments - Multipart upload under field `file`
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<String>, PathRejection>,
    mut multipart: Multipart,
) -> ApiResult<Attachment> {
    let Path(id) = id?;
    let upload = read_upload(&mut multipart).await?;

    let file_type = mime_for(&upload.original_name).ok_or_else(|| {
        ApiError::bad_request("file type not allowed; use pdf, jpg, jpeg, png, doc or docx")
    })?;
    if upload.bytes.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }
    if upload.bytes.len() > state.config.api.max_upload_bytes {
        return Err(ApiError::payload_too_large(format!(
            "file exceeds {} bytes",
            state.config.api.max_upload_bytes
        )));
    }

    let now = Utc::now();
    let name = stored_name(&upload.original_name, now.timestamp(), Uuid::new_v4())
        .ok_or_else(|| ApiError::bad_request("invalid file name"))?;

    // Nothing touches disk until the caller may attach to this draft
    let achievements = &state.services.achievements;
    achievements.check_attachable(auth.actor(), &id).await?;

    let dir = PathBuf::from(&state.config.api.upload_dir);
    let path = dir.join(&name);

    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        tracing::error!(dir = %dir.display(), error = %e, "cannot create upload directory");
        ApiError::internal_server_error("failed to store file")
    })?;
    write_new(&path, &upload.bytes).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "cannot write upload");
        ApiError::internal_server_error("failed to store file")
    })?;

    let attachment = Attachment {
        file_name: upload.original_name,
        file_url: format!("{}/{}", PUBLIC_PREFIX, name),
        file_type: file_type.to_string(),
        uploaded_at: now,
    };

    // The file at `path` was created by this request, so it is ours to remove
    match achievements.attach(auth.actor(), &id, attachment).await {
        Ok(attachment) => Ok(ApiResponse::success(attachment)),
        Err(err) => {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove rejected upload");
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for("sertifikat.PDF"), Some("application/pdf"));
        assert_eq!(mime_for("foto.jpeg"), Some("image/jpeg"));
        assert_eq!(mime_for("script.exe"), None);
        assert_eq!(mime_for("noextension"), None);
    }

    #[test]
    fn stored_name_strips_directories_and_spaces() {
        let token = Uuid::nil();
        assert_eq!(
            stored_name("../../etc/my cert.pdf", 1700000000, token).as_deref(),
            Some("1700000000-00000000000000000000000000000000-my_cert.pdf")
        );
        assert_eq!(stored_name("", 1, token), None);
    }

    #[test]
    fn same_second_same_name_uploads_get_distinct_names() {
        let first = stored_name("cert.pdf", 1700000000, Uuid::new_v4());
        let second = stored_name("cert.pdf", 1700000000, Uuid::new_v4());
        assert!(first.is_some());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn write_new_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("attach-write-{}", Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("cert.pdf");

        write_new(&path, b"first").await.unwrap();
        assert!(write_new(&path, b"second").await.is_err());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"first");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
