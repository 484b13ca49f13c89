//! Key Store
//!
//! Single-slot storage of RSA private keys, one slot per CA role. Each role
//! directory holds at most one PEM key; an existing key always wins over a
//! request to generate a new one, and replacing it requires an explicit
//! [`KeyStore::rotate`] (delete, then create).
//!
//! # Example
//! ```rust,no_run
//! use pki_lifecycle::configs::CaLayout;
//! use pki_lifecycle::key_store::{KeyRole, KeyStore};
//! # fn example() -> pki_lifecycle::error::Result<()> {
//! let store = KeyStore::new(CaLayout::new("CA"), 4096);
//! let root = store.generate_or_load(KeyRole::Root, "root.key.pem")?;
//! println!("root key at {}", root.path().display());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use tracing::{info, warn};

use crate::artifact::{self, Visibility};
use crate::configs::CaLayout;
use crate::error::{CaError, Result};

/// CA tier a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    Root,
    Issuer,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Root => write!(f, "root"),
            KeyRole::Issuer => write!(f, "issuer"),
        }
    }
}

/// A private key tagged with its role and on-disk location
pub struct KeyPair {
    role: KeyRole,
    path: PathBuf,
    key: PKey<Private>,
}

impl KeyPair {
    pub fn role(&self) -> KeyRole {
        self.role
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.key
    }

    pub fn bits(&self) -> u32 {
        self.key.bits()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("role", &self.role)
            .field("path", &self.path)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

pub struct KeyStore {
    layout: CaLayout,
    modulus_bits: u32,
}

impl KeyStore {
    pub fn new(layout: CaLayout, modulus_bits: u32) -> Self {
        Self {
            layout,
            modulus_bits,
        }
    }

    pub fn modulus_bits(&self) -> u32 {
        self.modulus_bits
    }

    /// Path of the key currently occupying the role's slot, if any
    pub fn active(&self, role: KeyRole) -> Result<Option<PathBuf>> {
        let dir = self.layout.private_key_dir(role);
        let mut keys = artifact::list_artifacts(&dir)?;
        match keys.len() {
            0 => Ok(None),
            1 => Ok(keys.pop()),
            n => Err(CaError::validation(format!(
                "{} key slot holds {} files in {}; remove all but one",
                role,
                n,
                dir.display()
            ))),
        }
    }

    /// Load the role's key if present, otherwise generate and persist it as `name`
    pub fn generate_or_load(&self, role: KeyRole, name: &str) -> Result<KeyPair> {
        if let Some(existing) = self.active(role)? {
            let requested = self.layout.private_key_dir(role).join(name);
            if existing != requested {
                warn!(
                    role = %role,
                    existing = %existing.display(),
                    requested = %requested.display(),
                    "existing key wins over requested name"
                );
            }
            info!(role = %role, path = %existing.display(), "private key loaded");
            return read_key(role, existing);
        }
        self.generate(role, name)
    }

    /// Load the role's key
    pub fn load(&self, role: KeyRole) -> Result<KeyPair> {
        let path = self
            .active(role)?
            .ok_or_else(|| CaError::not_found(format!("no {} private key", role)))?;
        read_key(role, path)
    }

    /// Remove the role's key, returning whether one existed
    pub fn delete(&self, role: KeyRole) -> Result<bool> {
        match self.active(role)? {
            Some(path) => {
                let removed = artifact::remove(&path)?;
                if removed {
                    info!(role = %role, path = %path.display(), "private key deleted");
                }
                Ok(removed)
            }
            None => Ok(false),
        }
    }

    /// Replace the role's key: delete the old one, then generate `name`
    pub fn rotate(&self, role: KeyRole, name: &str) -> Result<KeyPair> {
        artifact::validate_file_name(name)?;
        self.delete(role)?;
        self.generate(role, name)
    }

    fn generate(&self, role: KeyRole, name: &str) -> Result<KeyPair> {
        artifact::validate_file_name(name)?;
        let path = self.layout.private_key_dir(role).join(name);

        // Public exponent is fixed at 65537
        let rsa = Rsa::generate(self.modulus_bits)
            .map_err(|e| CaError::crypto("Failed to generate RSA keypair", e))?;
        let key =
            PKey::from_rsa(rsa).map_err(|e| CaError::crypto("Failed to create private key", e))?;
        let pem = key
            .private_key_to_pem_pkcs8()
            .map_err(|e| CaError::crypto("Failed to encode private key", e))?;

        artifact::write_atomic(&path, &pem, Visibility::Private)?;
        info!(
            role = %role,
            bits = self.modulus_bits,
            path = %path.display(),
            "private key generated"
        );
        Ok(KeyPair { role, path, key })
    }
}

fn read_key(role: KeyRole, path: PathBuf) -> Result<KeyPair> {
    let pem = artifact::read(&path)?;
    let key = PKey::private_key_from_pem(&pem).map_err(|e| {
        CaError::crypto(
            format!("Failed to parse private key {}", path.display()),
            e,
        )
    })?;
    Ok(KeyPair { role, path, key })
}
