use crate::error::{CaptureError, CaptureResult};
use crate::models::capture::ContentRef;
use chrono::{DateTime, Duration, Local, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const MAX_NAME_ATTEMPTS: usize = 8;

/// App-private directory that camera photos are written to
pub struct PictureStore {
    dir: PathBuf,
}

impl PictureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create an empty, uniquely named `JPEG_<yyyyMMdd_HHmmss>_<random>.jpg`
    pub fn create_image_file(&self) -> CaptureResult<PathBuf> {
        self.create_image_file_at(Local::now())
    }

    pub fn create_image_file_at(&self, now: DateTime<Local>) -> CaptureResult<PathBuf> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| CaptureError::FileCreationFailed(e.to_string()))?;

        let timestamp = now.format("%Y%m%d_%H%M%S");
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let suffix: u64 = rng.gen();
            let path = self.dir.join(format!("JPEG_{}_{}.jpg", timestamp, suffix));

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "created image file");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(CaptureError::FileCreationFailed(e.to_string())),
            }
        }

        Err(CaptureError::FileCreationFailed(
            "could not find a free file name".to_string(),
        ))
    }

    /// Remove a photo this store created; paths outside the store are ignored
    pub fn discard(&self, path: &Path) {
        if !path.starts_with(&self.dir) {
            return;
        }

        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove superseded photo");
            }
        }
    }
}

/// Time-limited reference handed to the camera instead of a raw path
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ShareGrant {
    pub uri: ContentRef,
    pub expires_at: DateTime<Utc>,
}

struct GrantEntry {
    path: PathBuf,
    expires_at: DateTime<Utc>,
}

/// Issues and resolves share grants for files the app owns
pub struct FileProvider {
    authority: String,
    ttl: Duration,
    grants: Mutex<HashMap<String, GrantEntry>>,
}

impl FileProvider {
    pub fn new(authority: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            authority: authority.into(),
            ttl: Duration::seconds(ttl_secs as i64),
            grants: Mutex::new(HashMap::new()),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn grant(&self, path: &Path) -> ShareGrant {
        self.grant_at(path, Utc::now())
    }

    pub fn grant_at(&self, path: &Path, now: DateTime<Utc>) -> ShareGrant {
        let token = format!("{:032x}", rand::thread_rng().gen::<u128>());
        let expires_at = now + self.ttl;

        let mut grants = self.grants.lock();
        grants.retain(|_, entry| entry.expires_at > now);
        grants.insert(
            token.clone(),
            GrantEntry {
                path: path.to_path_buf(),
                expires_at,
            },
        );

        ShareGrant {
            uri: ContentRef::content(&self.authority, &token),
            expires_at,
        }
    }

    /// Path behind a live grant
    pub fn resolve(&self, uri: &ContentRef) -> CaptureResult<PathBuf> {
        self.resolve_at(uri, Utc::now())
    }

    pub fn resolve_at(&self, uri: &ContentRef, now: DateTime<Utc>) -> CaptureResult<PathBuf> {
        let expired = || CaptureError::ShareGrantExpired(uri.to_string());

        let (authority, token) = uri.content_parts().ok_or_else(expired)?;
        if authority != self.authority {
            return Err(expired());
        }

        let grants = self.grants.lock();
        match grants.get(token) {
            Some(entry) if entry.expires_at > now => Ok(entry.path.clone()),
            _ => Err(expired()),
        }
    }

    /// Write data into the file behind a grant (what the camera does)
    pub fn write(&self, uri: &ContentRef, data: &[u8]) -> CaptureResult<()> {
        let path = self.resolve(uri)?;
        let mut file = OpenOptions::new().write(true).truncate(true).open(&path)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    pub fn revoke(&self, uri: &ContentRef) {
        if let Some((_, token)) = uri.content_parts() {
            self.grants.lock().remove(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_image_file_name_format() {
        let temp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(temp.path().join("Pictures"));
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let path = store.create_image_file_at(now).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();

        assert!(path.exists());
        assert!(path.starts_with(store.dir()));
        assert!(name.starts_with("JPEG_20240309_140507_"), "unexpected name: {}", name);
        assert!(name.ends_with(".jpg"));

        let random = &name["JPEG_20240309_140507_".len()..name.len() - 4];
        assert!(!random.is_empty());
        assert!(random.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_image_files_are_unique() {
        let temp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(temp.path());
        let now = Local::now();

        let first = store.create_image_file_at(now).unwrap();
        let second = store.create_image_file_at(now).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_create_fails_when_dir_is_a_file() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("Pictures");
        fs::write(&blocker, b"not a directory").unwrap();

        let store = PictureStore::new(&blocker);
        let result = store.create_image_file();
        assert!(matches!(result, Err(CaptureError::FileCreationFailed(_))));
    }

    #[test]
    fn test_discard_only_touches_store_files() {
        let temp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(temp.path().join("Pictures"));
        let photo = store.create_image_file().unwrap();

        let outside = temp.path().join("keep.jpg");
        fs::write(&outside, b"x").unwrap();

        store.discard(&photo);
        store.discard(&outside);

        assert!(!photo.exists());
        assert!(outside.exists());
    }

    #[test]
    fn test_grant_resolves_until_expiry() {
        let provider = FileProvider::new("text-ocr.provider", 60);
        let now = Utc::now();
        let path = PathBuf::from("/tmp/JPEG_1.jpg");

        let grant = provider.grant_at(&path, now);
        assert_eq!(grant.expires_at, now + Duration::seconds(60));
        assert!(grant.uri.as_str().starts_with("content://text-ocr.provider/"));

        assert_eq!(provider.resolve_at(&grant.uri, now).unwrap(), path);
        assert_eq!(
            provider.resolve_at(&grant.uri, now + Duration::seconds(61)),
            Err(CaptureError::ShareGrantExpired(grant.uri.to_string()))
        );
    }

    #[test]
    fn test_grant_rejects_foreign_authority_and_revoked() {
        let provider = FileProvider::new("text-ocr.provider", 60);
        let grant = provider.grant(Path::new("/tmp/a.jpg"));

        let (_, token) = grant.uri.content_parts().unwrap();
        let foreign = ContentRef::content("other.provider", token);
        assert!(provider.resolve(&foreign).is_err());

        provider.revoke(&grant.uri);
        assert!(provider.resolve(&grant.uri).is_err());
    }

    #[test]
    fn test_write_through_grant() {
        let temp = tempfile::tempdir().unwrap();
        let store = PictureStore::new(temp.path());
        let provider = FileProvider::new("text-ocr.provider", 60);

        let path = store.create_image_file().unwrap();
        let grant = provider.grant(&path);
        provider.write(&grant.uri, b"jpeg bytes").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"jpeg bytes");
    }
}
