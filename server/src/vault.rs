//! TURN Credential Vault
//!
//! Rooms store their TURN username and credential sealed with AES-256-GCM;
//! only peers that pass admission ever see the plaintext. Sealed values are
//! hex strings: a random 96-bit nonce followed by the ciphertext and tag, so
//! they drop straight into the `TEXT` columns of the `rooms` table.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use thiserror::Error;

/// Nonce prefix length of a sealed value, in bytes.
const NONCE_LEN: usize = 12;

/// Vault errors.
///
/// Opening deliberately collapses every failure (bad hex, truncation, auth
/// failure, non-UTF-8 plaintext) into one variant: none of them are
/// recoverable by the caller, and all of them mean the same thing in
/// practice — the row and the configured key no longer belong together.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("Vault key must be 64 hex characters (32 bytes)")]
    BadKey,

    #[error("Could not seal TURN credential")]
    Seal,

    #[error("Could not open stored TURN credential (wrong vault key or corrupt row)")]
    Open,
}

/// Symmetric vault over the key configured via `VAULT_KEY`.
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    /// Build a vault from a 64-character hex key string.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, VaultError> {
        let bytes = hex::decode(hex_key).map_err(|_| VaultError::BadKey)?;
        if bytes.len() != 32 {
            return Err(VaultError::BadKey);
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Seal a credential for storage. Each call picks a fresh nonce, so
    /// sealing the same value twice yields different rows.
    pub fn seal(&self, credential: &str) -> Result<String, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, credential.as_bytes())
            .map_err(|_| VaultError::Seal)?;

        let mut row = Vec::with_capacity(NONCE_LEN + sealed.len());
        row.extend_from_slice(&nonce);
        row.extend_from_slice(&sealed);
        Ok(hex::encode(row))
    }

    /// Open a sealed credential from storage.
    pub fn open(&self, sealed: &str) -> Result<String, VaultError> {
        let raw = hex::decode(sealed).map_err(|_| VaultError::Open)?;
        if raw.len() <= NONCE_LEN {
            return Err(VaultError::Open);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Open)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> Vault {
        Vault::from_hex_key(&"ab".repeat(32)).unwrap()
    }

    #[test]
    fn seals_and_opens_a_turn_credential_pair() {
        let vault = vault();

        // Typical time-limited TURN credentials: "expiry:user" plus an
        // HMAC-derived password.
        let username = vault.seal("1719873000:tandem").unwrap();
        let credential = vault.seal("qz8G0v5s3K1FQkPA2lRmew==").unwrap();

        assert!(username.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!username.contains("tandem"));
        assert_eq!(vault.open(&username).unwrap(), "1719873000:tandem");
        assert_eq!(vault.open(&credential).unwrap(), "qz8G0v5s3K1FQkPA2lRmew==");

        // Fresh nonce per seal: identical plaintexts produce distinct rows.
        assert_ne!(vault.seal("same").unwrap(), vault.seal("same").unwrap());
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(Vault::from_hex_key(""), Err(VaultError::BadKey)));
        // Right length, not hex.
        assert!(matches!(
            Vault::from_hex_key(&"zx".repeat(32)),
            Err(VaultError::BadKey)
        ));
        // Valid hex, 16 bytes instead of 32.
        assert!(matches!(
            Vault::from_hex_key(&"ab".repeat(16)),
            Err(VaultError::BadKey)
        ));
    }

    #[test]
    fn rotated_key_cannot_open_old_rows() {
        let before = Vault::from_hex_key(&"ab".repeat(32)).unwrap();
        let after = Vault::from_hex_key(&"cd".repeat(32)).unwrap();

        let sealed = before.seal("turn-secret").unwrap();
        assert_eq!(after.open(&sealed).unwrap_err(), VaultError::Open);
        assert_eq!(before.open(&sealed).unwrap(), "turn-secret");
    }

    #[test]
    fn tampered_row_fails_to_open() {
        let vault = vault();
        let sealed = vault.seal("turn-secret").unwrap();

        // Flip one hex digit inside the auth tag.
        let mut chars: Vec<char> = sealed.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();

        assert_eq!(vault.open(&tampered).unwrap_err(), VaultError::Open);
    }

    #[test]
    fn garbage_rows_fail_closed() {
        let vault = vault();
        let nonce_only = "00".repeat(NONCE_LEN);
        for bad in ["", "not-hex", "00112233", nonce_only.as_str()] {
            assert_eq!(vault.open(bad).unwrap_err(), VaultError::Open);
        }
    }
}
