//! Persistence of the authenticated session between CLI invocations.
//!
//! The session snapshot is kept in the operating system keyring when one is reachable and
//! otherwise in a ChaCha20-Poly1305 encrypted file next to the configuration.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use keyring::Entry;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::SessionSnapshot;
use crate::config::config_directory;

const SERVICE_NAME: &str = "org.khidma.dashboard";
const SESSION_ACCOUNT: &str = "khidma-session";
const MASTER_KEY_FILE: &str = "secret.key";
const FALLBACK_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("local encryption failed: {0}")]
    Crypto(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct EncryptedPayload {
    nonce: String,
    ciphertext: String,
}

/// Stores one [`SessionSnapshot`] for the local user.
#[derive(Debug, Clone)]
pub struct SessionVault {
    directory: PathBuf,
    use_keyring: bool,
}

impl SessionVault {
    /// Vault rooted in the configuration directory, preferring the OS keyring.
    pub fn open_default() -> Self {
        Self {
            directory: config_directory(),
            use_keyring: true,
        }
    }

    /// Vault that only uses the encrypted file under `directory`.
    pub fn file_only(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            use_keyring: false,
        }
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SecretStoreError> {
        let encoded = serde_json::to_string(snapshot)?;

        if self.use_keyring {
            match Entry::new(SERVICE_NAME, SESSION_ACCOUNT)
                .and_then(|entry| entry.set_password(&encoded))
            {
                Ok(()) => debug!("session stored in keyring"),
                Err(err) => {
                    warn!(error = %err, "keyring unavailable; storing session in encrypted file");
                }
            }
        }

        // Keep the encrypted copy in step with the keyring entry.
        self.write_fallback(encoded.as_bytes())
    }

    pub fn load(&self) -> Result<Option<SessionSnapshot>, SecretStoreError> {
        if self.use_keyring {
            match Entry::new(SERVICE_NAME, SESSION_ACCOUNT).and_then(|entry| entry.get_password())
            {
                Ok(raw) if !raw.trim().is_empty() => {
                    return Ok(Some(serde_json::from_str(&raw)?));
                }
                Ok(_) | Err(keyring::Error::NoEntry) => {}
                Err(err) => {
                    warn!(error = %err, "keyring read failed; trying encrypted file");
                }
            }
        }

        match self.read_fallback()? {
            Some(plaintext) => Ok(Some(serde_json::from_slice(&plaintext)?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self) -> Result<(), SecretStoreError> {
        if self.use_keyring {
            match Entry::new(SERVICE_NAME, SESSION_ACCOUNT)
                .and_then(|entry| entry.delete_credential())
            {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(err) => warn!(error = %err, "failed to remove keyring session entry"),
            }
        }
        self.remove_fallback()
    }

    fn fallback_path(&self) -> PathBuf {
        self.directory.join(FALLBACK_FILE)
    }

    fn write_fallback(&self, plaintext: &[u8]) -> Result<(), SecretStoreError> {
        let (nonce, ciphertext) = encrypt(&self.directory, plaintext)?;
        let payload = EncryptedPayload {
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        };
        fs::create_dir_all(&self.directory)?;
        write_private_file(&self.fallback_path(), serde_json::to_string(&payload)?.as_bytes())
    }

    fn read_fallback(&self) -> Result<Option<Vec<u8>>, SecretStoreError> {
        let raw = match fs::read_to_string(self.fallback_path()) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let Some(key) = stored_master_key(&self.directory) else {
            warn!("session file has no usable master key; discarding it");
            self.remove_fallback()?;
            return Ok(None);
        };
        let payload: EncryptedPayload = serde_json::from_str(&raw)?;
        let nonce = STANDARD.decode(payload.nonce)?;
        let ciphertext = STANDARD.decode(payload.ciphertext)?;
        decrypt(&key, &nonce, &ciphertext).map(Some)
    }

    fn remove_fallback(&self) -> Result<(), SecretStoreError> {
        match fs::remove_file(self.fallback_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn encrypt(directory: &Path, plaintext: &[u8]) -> Result<([u8; 12], Vec<u8>), SecretStoreError> {
    let key = master_key(directory)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|err| SecretStoreError::Crypto(err.to_string()))?;

    let mut nonce_bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|err| SecretStoreError::Crypto(err.to_string()))?;
    Ok((nonce_bytes, ciphertext))
}

fn decrypt(key: &[u8; 32], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, SecretStoreError> {
    let nonce: [u8; 12] = nonce.try_into().map_err(|_| {
        SecretStoreError::Crypto("invalid nonce length for chacha20poly1305".to_string())
    })?;
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|err| SecretStoreError::Crypto(err.to_string()))?;
    cipher
        .decrypt(&Nonce::from(nonce), ciphertext)
        .map_err(|err| SecretStoreError::Crypto(err.to_string()))
}

/// The stored master key, if there is one of the right length.
fn stored_master_key(directory: &Path) -> Option<[u8; 32]> {
    let path = directory.join(MASTER_KEY_FILE);
    let bytes = fs::read(&path).ok()?;
    let key = <[u8; 32]>::try_from(bytes.as_slice()).ok();
    if key.is_none() {
        warn!(path = %path.display(), "master key has unexpected length");
    }
    key
}

/// The stored master key, or a new one. A new key makes any existing session file
/// undecryptable, so that file is removed.
fn master_key(directory: &Path) -> Result<[u8; 32], SecretStoreError> {
    if let Some(key) = stored_master_key(directory) {
        return Ok(key);
    }

    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    fs::create_dir_all(directory)?;
    match fs::remove_file(directory.join(FALLBACK_FILE)) {
        Ok(()) => warn!("discarded session file encrypted with a previous master key"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    write_private_file(&directory.join(MASTER_KEY_FILE), &key)?;
    Ok(key)
}

fn write_private_file(path: &Path, contents: &[u8]) -> Result<(), SecretStoreError> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}
