//! Bearer credential storage.
//!
//! The adapter reads the token through a `CredentialProvider` it was given at
//! construction instead of looking it up in ambient storage. Only the
//! authentication flow calls `set` and `clear`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::warn;

pub trait CredentialProvider: Send + Sync {
    /// The current bearer token, if one is held.
    fn token(&self) -> Option<String>;

    fn set(&self, token: &str);

    fn clear(&self);
}

impl<C: CredentialProvider + ?Sized> CredentialProvider for Arc<C> {
    fn token(&self) -> Option<String> {
        (**self).token()
    }

    fn set(&self, token: &str) {
        (**self).set(token)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

impl<C: CredentialProvider + ?Sized> CredentialProvider for Box<C> {
    fn token(&self) -> Option<String> {
        (**self).token()
    }

    fn set(&self, token: &str) {
        (**self).set(token)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-process token slot. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentials {
    slot: Arc<RwLock<Option<String>>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let creds = Self::new();
        creds.set(token);
        creds
    }
}

impl CredentialProvider for MemoryCredentials {
    fn token(&self) -> Option<String> {
        // A poisoned lock still holds a coherent Option.
        match self.slot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set(&self, token: &str) {
        let mut guard = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(token.to_string());
    }

    fn clear(&self) {
        let mut guard = self.slot.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}

/// Token persisted to a single file so it survives restarts.
///
/// A missing or unreadable file means no token. Write failures are logged;
/// the trait has no error channel because callers treat the token as
/// best-effort state.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, token: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // `mode` only applies when the file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(token.as_bytes())
    }
}

impl CredentialProvider for FileCredentials {
    fn token(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read credential file");
                None
            }
        }
    }

    fn set(&self, token: &str) {
        if let Err(e) = self.write(token) {
            warn!(path = %self.path.display(), error = %e, "failed to write credential file");
        }
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to remove credential file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_the_slot() {
        let creds = MemoryCredentials::new();
        let other = creds.clone();
        assert_eq!(creds.token(), None);

        other.set("abc");
        assert_eq!(creds.token().as_deref(), Some("abc"));

        creds.clear();
        assert_eq!(other.token(), None);
    }

    #[test]
    fn file_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token");
        let creds = FileCredentials::new(&path);
        assert_eq!(creds.token(), None);

        creds.set("secret-token");
        assert_eq!(creds.token().as_deref(), Some("secret-token"));
        assert_eq!(FileCredentials::new(&path).token().as_deref(), Some("secret-token"));

        creds.clear();
        assert_eq!(creds.token(), None);
        assert!(!path.exists());
        // clearing twice is fine
        creds.clear();
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        FileCredentials::new(&path).set("t");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn existing_file_is_tightened_and_overwritten() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "an-older-and-longer-token").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let creds = FileCredentials::new(&path);
        creds.set("new");
        assert_eq!(creds.token().as_deref(), Some("new"));
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn blank_file_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "  \n").unwrap();
        assert_eq!(FileCredentials::new(&path).token(), None);
    }
}
