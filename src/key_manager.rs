//! Device-scoped encryption key management
//!
//! One 256-bit AES key is generated per install and persisted in a JSON
//! key file under the platform config directory. A legacy plain-base64
//! key file is migrated into the new format once and deleted on success.
//!
//! Environment variables:
//! - `EATLOCK_ENCRYPTION_KEY`: base64-encoded 32-byte key, overrides storage
//! - `EATLOCK_KEY_DIR`: directory for the key file
//! - `EATLOCK_LEGACY_KEY_PATH`: location of the legacy plain key file

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::content_crypto::decode_base64_key;
use crate::errors::{EatLockError, EatLockResult};

/// On-disk key file format
#[derive(Serialize, Deserialize)]
struct DeviceKeyData {
    /// Schema version for future compatibility
    version: u32,
    /// Base64-encoded 32-byte AES key
    key_b64: String,
    /// Key generation timestamp
    created_at: String,
    /// SHA-256 fingerprint prefix, for logging and sanity checks
    fingerprint: String,
}

/// Key management with environment controls and legacy migration
pub struct KeyManager;

impl KeyManager {
    /// Resolve the device encryption key.
    ///
    /// Order: `EATLOCK_ENCRYPTION_KEY` env var, then the persisted key
    /// file (migrating a legacy key if one exists), else a freshly
    /// generated key persisted for subsequent runs.
    pub fn get_encryption_key() -> EatLockResult<[u8; 32]> {
        if let Ok(key_b64) = std::env::var("EATLOCK_ENCRYPTION_KEY") {
            let key = decode_base64_key(&key_b64)?;
            tracing::debug!(fingerprint = %Self::fingerprint(&key), "using key from environment");
            return Ok(key);
        }

        let key_path = Self::key_file_path();
        let legacy_path = Self::legacy_key_path();
        Self::get_or_create_key_at(&key_path, &legacy_path)
    }

    /// Load, migrate or create the key at explicit paths.
    pub fn get_or_create_key_at(key_path: &Path, legacy_path: &Path) -> EatLockResult<[u8; 32]> {
        if key_path.exists() {
            let key = Self::load_key_file(key_path)?;
            tracing::info!(fingerprint = %Self::fingerprint(&key), "loaded device key");
            return Ok(key);
        }

        if let Some(key) = Self::try_migrate_legacy_key(legacy_path, key_path)? {
            tracing::info!(fingerprint = %Self::fingerprint(&key), "migrated legacy device key");
            return Ok(key);
        }

        let key = Self::generate_key();
        Self::save_key_file(key_path, &key)?;
        tracing::info!(
            fingerprint = %Self::fingerprint(&key),
            path = %key_path.display(),
            "generated new device key"
        );
        Ok(key)
    }

    /// Generate a fresh random 256-bit key.
    pub fn generate_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        key
    }

    /// Short SHA-256 fingerprint of a key, safe to log.
    pub fn fingerprint(key: &[u8; 32]) -> String {
        let digest = Sha256::digest(key);
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Path of the JSON key file.
    pub fn key_file_path() -> PathBuf {
        Self::key_directory().join("device_key.json")
    }

    /// Path of the legacy plain-base64 key file.
    pub fn legacy_key_path() -> PathBuf {
        std::env::var("EATLOCK_LEGACY_KEY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::key_directory().join("eatlock_key.b64"))
    }

    fn key_directory() -> PathBuf {
        std::env::var("EATLOCK_KEY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("eatlock")
            })
    }

    fn load_key_file(path: &Path) -> EatLockResult<[u8; 32]> {
        let content =
            fs::read_to_string(path).map_err(|e| EatLockError::io("reading key file", e))?;
        let data: DeviceKeyData = serde_json::from_str(&content)
            .map_err(|e| EatLockError::serialization("key file", e))?;

        let key = decode_base64_key(&data.key_b64)?;
        if data.fingerprint != Self::fingerprint(&key) {
            return Err(EatLockError::crypto("key file fingerprint mismatch"));
        }
        Ok(key)
    }

    fn save_key_file(path: &Path, key: &[u8; 32]) -> EatLockResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EatLockError::io("creating key directory", e))?;
        }

        let data = DeviceKeyData {
            version: 1,
            key_b64: B64.encode(key),
            created_at: chrono::Utc::now().to_rfc3339(),
            fingerprint: Self::fingerprint(key),
        };
        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| EatLockError::serialization("key file", e))?;
        fs::write(path, json).map_err(|e| EatLockError::io("writing key file", e))?;
        Ok(())
    }

    /// Migrate a legacy plain-base64 key file into the JSON key file,
    /// deleting the legacy copy once the new file is written.
    fn try_migrate_legacy_key(
        legacy_path: &Path,
        key_path: &Path,
    ) -> EatLockResult<Option<[u8; 32]>> {
        if !legacy_path.exists() {
            return Ok(None);
        }

        let encoded =
            fs::read_to_string(legacy_path).map_err(|e| EatLockError::io("reading legacy key", e))?;
        let key = decode_base64_key(&encoded)?;

        Self::save_key_file(key_path, &key)?;
        fs::remove_file(legacy_path).map_err(|e| EatLockError::io("removing legacy key", e))?;

        Ok(Some(key))
    }
}
