use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CaError, Result};
use crate::key_store::KeyRole;

const MIN_MODULUS_BITS: u32 = 2048;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub root_ca: RootCADefaults,
    #[serde(default)]
    pub crl: CrlConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            database_path: default_database_path(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("CA")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("CA/ledger.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeysConfig {
    #[serde(default = "default_modulus_bits")]
    pub modulus_bits: u32,
    #[serde(default = "default_root_key_name")]
    pub root_key_name: String,
    #[serde(default = "default_issuer_key_name")]
    pub issuer_key_name: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            modulus_bits: default_modulus_bits(),
            root_key_name: default_root_key_name(),
            issuer_key_name: default_issuer_key_name(),
        }
    }
}

fn default_modulus_bits() -> u32 {
    4096
}

fn default_root_key_name() -> String {
    "root.key.pem".to_string()
}

fn default_issuer_key_name() -> String {
    "issuer.key.pem".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RootCADefaults {
    #[serde(default = "default_root_cert_name")]
    pub cert_name: String,
    #[serde(default = "default_root_ca_country")]
    pub country: String,
    #[serde(default = "default_root_ca_org")]
    pub organization: String,
    #[serde(default = "default_root_ca_cn")]
    pub common_name: String,
    #[serde(default = "default_root_ca_validity")]
    pub validity_days: i64,
}

impl Default for RootCADefaults {
    fn default() -> Self {
        Self {
            cert_name: default_root_cert_name(),
            country: default_root_ca_country(),
            organization: default_root_ca_org(),
            common_name: default_root_ca_cn(),
            validity_days: default_root_ca_validity(),
        }
    }
}

fn default_root_cert_name() -> String {
    "root.cert.pem".to_string()
}

fn default_root_ca_country() -> String {
    "RU".to_string()
}

fn default_root_ca_org() -> String {
    "TestOrg".to_string()
}

fn default_root_ca_cn() -> String {
    "TestRoot".to_string()
}

fn default_root_ca_validity() -> i64 {
    3650 // 10 years
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrlConfig {
    #[serde(default = "default_crl_file_name")]
    pub file_name: String,
    #[serde(default = "default_crl_update_days")]
    pub update_days: i64,
}

impl Default for CrlConfig {
    fn default() -> Self {
        Self {
            file_name: default_crl_file_name(),
            update_days: default_crl_update_days(),
        }
    }
}

fn default_crl_file_name() -> String {
    "issuer.crl.pem".to_string()
}

fn default_crl_update_days() -> i64 {
    30
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .map_err(|e| CaError::io(format!("Failed to read config file: {}", path), e))?;

        let config: AppConfig = toml::from_str(&config_str)
            .map_err(|e| CaError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with default path (config.toml)
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Configuration rooted at `base_dir`, everything else defaulted
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let mut config = AppConfig::default();
        config.paths.database_path = base_dir.join("ledger.db");
        config.paths.base_dir = base_dir;
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.modulus_bits < MIN_MODULUS_BITS {
            return Err(CaError::Config(format!(
                "RSA modulus must be at least {} bits, got {}",
                MIN_MODULUS_BITS, self.keys.modulus_bits
            )));
        }
        if self.keys.root_key_name.trim().is_empty() || self.keys.issuer_key_name.trim().is_empty()
        {
            return Err(CaError::Config("Key file names must not be empty".into()));
        }
        if self.root_ca.validity_days <= 0 {
            return Err(CaError::Config(
                "Root CA validity must be a positive number of days".into(),
            ));
        }
        if self.crl.update_days <= 0 {
            return Err(CaError::Config(
                "CRL update period must be a positive number of days".into(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> CaLayout {
        CaLayout::new(&self.paths.base_dir)
    }
}

/// On-disk directory layout of the two-tier CA
#[derive(Debug, Clone)]
pub struct CaLayout {
    base: PathBuf,
}

impl CaLayout {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn private_key_dir(&self, role: KeyRole) -> PathBuf {
        match role {
            KeyRole::Root => self.base.join("root-ca").join("private"),
            KeyRole::Issuer => self.base.join("issuing-ca").join("private"),
        }
    }

    pub fn root_certs_dir(&self) -> PathBuf {
        self.base.join("root-ca").join("certs")
    }

    pub fn csr_dir(&self) -> PathBuf {
        self.base.join("issuing-ca").join("csr")
    }

    pub fn issuer_certs_dir(&self) -> PathBuf {
        self.base.join("issuing-ca").join("certs")
    }

    pub fn crl_dir(&self) -> PathBuf {
        self.base.join("issuing-ca").join("crl")
    }

    pub fn pkcs12_dir(&self) -> PathBuf {
        self.base.join("pkcs12")
    }

    pub fn user_requests_dir(&self) -> PathBuf {
        self.base.join("user_reqs_data")
    }

    /// Create every directory of the layout
    pub fn ensure(&self) -> Result<()> {
        let dirs = [
            self.private_key_dir(KeyRole::Root),
            self.private_key_dir(KeyRole::Issuer),
            self.root_certs_dir(),
            self.csr_dir(),
            self.issuer_certs_dir(),
            self.crl_dir(),
            self.pkcs12_dir(),
            self.user_requests_dir(),
        ];
        for dir in dirs.iter() {
            fs::create_dir_all(dir).map_err(|e| {
                CaError::io(format!("Failed to create directory {}", dir.display()), e)
            })?;
        }
        Ok(())
    }
}
