//! Receipt image intake.
//!
//! Any failure along resolve, download, or upload degrades to "no image";
//! the entry is committed either way.

use ledgerbot_core::AccountId;
use ledgerbot_integration::{BlobStore, Messenger};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use ulid::Ulid;

/// Moves a photo from the messaging platform into blob storage.
#[derive(Clone)]
pub struct MediaIntake {
    messenger: Arc<dyn Messenger>,
    blobs: Arc<dyn BlobStore>,
}

impl MediaIntake {
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { messenger, blobs }
    }

    /// Stores the photo behind `file_ref` and returns its public URL.
    ///
    /// Returns `None` on any failure.
    #[instrument(skip(self))]
    pub async fn capture(&self, account_id: AccountId, file_ref: &str) -> Option<String> {
        let url = match self.messenger.resolve_file(file_ref).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "could not resolve receipt image");
                return None;
            }
        };
        let file = match self.messenger.download(&url).await {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "could not download receipt image");
                return None;
            }
        };
        let path = object_path(account_id, &file.content_type);
        let size = file.bytes.len();
        match self
            .blobs
            .upload(&path, file.bytes, &file.content_type)
            .await
        {
            Ok(public_url) => {
                info!(%path, size, "receipt image stored");
                Some(public_url)
            }
            Err(e) => {
                warn!(error = %e, %path, "could not upload receipt image");
                None
            }
        }
    }
}

/// `{account}/{ulid}.{ext}`, so every account's receipts share a prefix.
fn object_path(account_id: AccountId, content_type: &str) -> String {
    format!("{account_id}/{}.{}", Ulid::new(), extension(content_type))
}

fn extension(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryBlobStore, RecordingMessenger};

    fn intake() -> (Arc<RecordingMessenger>, Arc<InMemoryBlobStore>, MediaIntake) {
        let messenger = Arc::new(RecordingMessenger::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let intake = MediaIntake::new(messenger.clone(), blobs.clone());
        (messenger, blobs, intake)
    }

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(extension("image/png"), "png");
        assert_eq!(extension("IMAGE/WEBP; charset=binary"), "webp");
        assert_eq!(extension("application/octet-stream"), "jpg");
    }

    #[test]
    fn object_path_is_scoped_to_account() {
        let account = AccountId::new();
        let path = object_path(account, "image/jpeg");
        assert!(path.starts_with(&format!("{account}/")));
        assert!(path.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn capture_uploads_under_account_prefix() {
        let (_, blobs, intake) = intake();
        let account = AccountId::new();
        let url = intake.capture(account, "file-1").await.expect("stored");
        let uploads = blobs.uploads();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].starts_with(&account.to_string()));
        assert!(url.ends_with(&uploads[0]));
    }

    #[tokio::test]
    async fn resolve_failure_degrades_to_none() {
        let (messenger, blobs, intake) = intake();
        messenger.fail_file_access(true);
        assert_eq!(intake.capture(AccountId::new(), "file-1").await, None);
        assert!(blobs.uploads().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_degrades_to_none() {
        let (_, blobs, intake) = intake();
        blobs.fail_uploads(true);
        assert_eq!(intake.capture(AccountId::new(), "file-1").await, None);
    }
}
