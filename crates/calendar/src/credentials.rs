use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use onboard_core::domain::permission::PermissionLevel;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("calendar token store I/O failed for `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("`{0}` cannot be used in a token file name")]
    InvalidEmail(String),
}

/// Per-user calendar authorization files, one per `(email, permission level)` pair,
/// stored as `{email}_{level}_token.json`.
#[derive(Clone, Debug)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn token_path(
        &self,
        email: &str,
        level: PermissionLevel,
    ) -> Result<PathBuf, CredentialError> {
        let email = checked_email(email)?;
        Ok(self.dir.join(format!("{email}_{}_token.json", level.as_str())))
    }

    pub async fn is_authorized(
        &self,
        email: &str,
        level: PermissionLevel,
    ) -> Result<bool, CredentialError> {
        let path = self.token_path(email, level)?;
        tokio::fs::try_exists(&path).await.map_err(|source| CredentialError::Io { path, source })
    }

    /// Stores the provider's token payload for `(email, level)`. The OAuth exchange
    /// that produces `contents` happens outside this service.
    pub async fn save(
        &self,
        email: &str,
        level: PermissionLevel,
        contents: &str,
    ) -> Result<PathBuf, CredentialError> {
        let path = self.token_path(email, level)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CredentialError::Io { path: self.dir.clone(), source })?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| CredentialError::Io { path: path.clone(), source })?;
        Ok(path)
    }

    /// Removes every stored token of `email`, whatever the level. Returns how many were removed.
    pub async fn reset(&self, email: &str) -> Result<usize, CredentialError> {
        let email = checked_email(email)?;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(CredentialError::Io { path: self.dir.clone(), source }),
        };

        let prefixes: Vec<String> = PermissionLevel::ALL
            .iter()
            .map(|level| format!("{email}_{}_token.json", level.as_str()))
            .collect();
        let mut removed = 0;
        loop {
            let entry = entries
                .next_entry()
                .await
                .map_err(|source| CredentialError::Io { path: self.dir.clone(), source })?;
            let Some(entry) = entry else { break };

            let name = entry.file_name().to_string_lossy().to_string();
            if !prefixes.iter().any(|candidate| candidate == &name) {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(CredentialError::Io { path, source }),
            }
        }

        info!(
            event_name = "calendar.auth.reset",
            removed,
            "removed stored calendar authorization"
        );
        Ok(removed)
    }
}

fn checked_email(email: &str) -> Result<&str, CredentialError> {
    let email = email.trim();
    let unsafe_name = email.is_empty()
        || email.contains(['/', '\\'])
        || email.contains("..")
        || email.chars().any(char::is_whitespace);
    if unsafe_name {
        return Err(CredentialError::InvalidEmail(email.to_string()));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use onboard_core::domain::permission::PermissionLevel;

    use super::TokenStore;

    #[tokio::test]
    async fn authorization_is_tracked_per_level() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("tokens"));

        assert!(!store
            .is_authorized("ana@example.com", PermissionLevel::Readonly)
            .await
            .expect("check"));

        let path = store
            .save("ana@example.com", PermissionLevel::Readonly, "{\"token\":\"x\"}")
            .await
            .expect("save");
        assert!(path.ends_with("ana@example.com_readonly_token.json"));

        assert!(store
            .is_authorized("ana@example.com", PermissionLevel::Readonly)
            .await
            .expect("check"));
        assert!(!store
            .is_authorized("ana@example.com", PermissionLevel::FullAccess)
            .await
            .expect("check"));
    }

    #[tokio::test]
    async fn reset_removes_only_the_users_tokens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path());
        for level in [PermissionLevel::Readonly, PermissionLevel::FullAccess] {
            store.save("ana@example.com", level, "{}").await.expect("save ana");
        }
        store.save("bruno@example.com", PermissionLevel::FullAccess, "{}").await.expect("save");

        let removed = store.reset("ana@example.com").await.expect("reset");
        assert_eq!(removed, 2);
        assert!(!store
            .is_authorized("ana@example.com", PermissionLevel::FullAccess)
            .await
            .expect("check"));
        assert!(store
            .is_authorized("bruno@example.com", PermissionLevel::FullAccess)
            .await
            .expect("check"));
    }

    #[tokio::test]
    async fn reset_without_token_dir_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("missing"));

        assert_eq!(store.reset("ana@example.com").await.expect("reset"), 0);
    }

    #[test]
    fn path_traversal_is_rejected() {
        let store = TokenStore::new("auth/tokens");
        assert!(store.token_path("../etc/passwd", PermissionLevel::Readonly).is_err());
        assert!(store.token_path("a/b@example.com", PermissionLevel::Readonly).is_err());
        assert!(store.token_path("", PermissionLevel::Readonly).is_err());
    }
}
