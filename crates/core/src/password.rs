use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Salted SHA-256 digest of a user password, hex encoded for storage.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    salt: String,
    hash: String,
}

impl PasswordDigest {
    pub fn derive(password: &str) -> Self {
        let mut salt = [0_u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let hash = digest(&salt, password);
        Self { salt, hash }
    }

    pub fn from_parts(salt: impl Into<String>, hash: impl Into<String>) -> Self {
        Self { salt: salt.into(), hash: hash.into() }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn verify(&self, candidate: &str) -> bool {
        let computed = digest(&self.salt, candidate);
        constant_time_eq(computed.as_bytes(), self.hash.as_bytes())
    }
}

impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordDigest").field("hash", &"<redacted>").finish()
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0_u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use super::PasswordDigest;

    #[test]
    fn derive_uses_fresh_salt_each_time() {
        let first = PasswordDigest::derive("hunter2");
        let second = PasswordDigest::derive("hunter2");

        assert_ne!(first.salt(), second.salt());
        assert_ne!(first.hash(), second.hash());
        assert!(first.verify("hunter2"));
        assert!(second.verify("hunter2"));
    }

    #[test]
    fn stored_parts_verify_after_reload() {
        let original = PasswordDigest::derive("correct horse");
        let reloaded = PasswordDigest::from_parts(original.salt(), original.hash());

        assert!(reloaded.verify("correct horse"));
        assert!(!reloaded.verify("wrong horse"));
    }
}
