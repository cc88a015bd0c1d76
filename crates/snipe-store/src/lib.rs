//! Encrypted at-rest storage for credentials and 2FA cookies.
//!
//! Secrets live in a single AES-256-CBC encrypted file next to a
//! locally generated key file, so a copied secrets file alone is useless.
//! The payload is JSON; the on-disk format is two base64 lines (IV, then
//! ciphertext).

use aes::Aes256;
use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose};
use block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{RngCore, rng};
use serde::{Deserialize, Serialize};
use snipe_browser::Cookie;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

type Encryptor = cbc::Encryptor<Aes256>;
type Decryptor = cbc::Decryptor<Aes256>;

const SECRETS_FILE: &str = "secure_storage.tt";
const KEY_FILE: &str = "storage.key";

/// Everything the sniper persists between runs.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredSecrets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Cookies captured after an approved 2FA handshake; replaying them
    /// skips the push approval on the next login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_cookies: Option<Vec<Cookie>>,
}

/// Handle on the encrypted store directory.
pub struct SecureStore {
    secrets_path: PathBuf,
    key_path: PathBuf,
}

impl SecureStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating secret store dir {}", dir.display()))?;
        Ok(Self {
            secrets_path: dir.join(SECRETS_FILE),
            key_path: dir.join(KEY_FILE),
        })
    }

    /// Load and decrypt the stored secrets. `None` when nothing has been
    /// saved yet.
    pub fn load(&self) -> Result<Option<StoredSecrets>> {
        let raw = match fs::read_to_string(&self.secrets_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("reading secret store {}", self.secrets_path.display())
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let key = self.load_or_create_key()?;
        let json = decrypt(&key, &raw)?;
        let secrets = serde_json::from_slice(&json).context("secret store payload is corrupt")?;
        Ok(Some(secrets))
    }

    /// Encrypt and persist the secrets, replacing any previous contents.
    pub fn save(&self, secrets: &StoredSecrets) -> Result<()> {
        let key = self.load_or_create_key()?;
        let json = serde_json::to_vec(secrets)?;
        fs::write(&self.secrets_path, encrypt(&key, &json))
            .with_context(|| format!("writing secret store {}", self.secrets_path.display()))?;
        debug!(path = %self.secrets_path.display(), "secret store updated");
        Ok(())
    }

    /// Apply an update to the stored secrets in place.
    pub fn update(&self, apply: impl FnOnce(&mut StoredSecrets)) -> Result<()> {
        let mut secrets = self.load()?.unwrap_or_default();
        apply(&mut secrets);
        self.save(&secrets)
    }

    /// Wipe stored secrets (the key file stays).
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.secrets_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context("clearing secret store"),
        }
    }

    fn load_or_create_key(&self) -> Result<[u8; 32]> {
        if let Ok(bytes) = fs::read(&self.key_path) {
            let key: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("storage key file has the wrong length"))?;
            return Ok(key);
        }
        let mut key = [0u8; 32];
        rng().fill_bytes(&mut key);
        fs::write(&self.key_path, key)
            .with_context(|| format!("writing storage key {}", self.key_path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.key_path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(key)
    }
}

fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> String {
    let mut iv = [0u8; 16];
    rng().fill_bytes(&mut iv);
    let ciphertext =
        Encryptor::new(key.into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    format!(
        "{}\n{}\n",
        general_purpose::STANDARD.encode(iv),
        general_purpose::STANDARD.encode(ciphertext)
    )
}

fn decrypt(key: &[u8; 32], raw: &str) -> Result<Vec<u8>> {
    let mut lines = raw.lines();
    let (Some(iv_b64), Some(ct_b64)) = (lines.next(), lines.next()) else {
        bail!("secret store file is malformed");
    };
    let iv = general_purpose::STANDARD
        .decode(iv_b64)
        .context("secret store IV is not valid base64")?;
    let ciphertext = general_purpose::STANDARD
        .decode(ct_b64)
        .context("secret store ciphertext is not valid base64")?;
    let iv: [u8; 16] = iv
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("secret store IV has the wrong length"))?;
    Decryptor::new(key.into(), (&iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| anyhow::anyhow!("secret store cannot be decrypted with the local key"))
}
