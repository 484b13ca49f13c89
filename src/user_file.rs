//! Requester data files
//!
//! Plain `key: value` lines supplying the subject of a new signing request and
//! the export password for its credential bundle:
//!
//! ```text
//! fio: Ivanov Ivan Ivanovich
//! countryName: RU
//! organizationName: TestOrg
//! password: s3cret
//! ```
//!
//! Lines without a colon are ignored; a repeated key keeps its last value.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use secrecy::SecretString;

use crate::artifact;
use crate::error::{CaError, Result};
use crate::subject::SubjectInfo;

const REQUIRED_FIELDS: [&str; 4] = ["fio", "countryName", "organizationName", "password"];

pub struct UserInfo {
    pub fio: String,
    pub country_name: String,
    pub organization_name: String,
    pub password: SecretString,
}

impl UserInfo {
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for line in text.lines() {
            if let Some((key, value)) = line.split_once(':') {
                fields.insert(key.trim(), value.trim());
            }
        }

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| fields.get(f).map_or(true, |v| v.is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(CaError::validation(format!(
                "user file is missing {}",
                missing.join(", ")
            )));
        }

        let field = |name: &str| fields.get(name).copied().unwrap_or_default().to_string();
        Ok(Self {
            fio: field("fio"),
            country_name: field("countryName"),
            organization_name: field("organizationName"),
            password: SecretString::from(field("password")),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = artifact::read(path)?;
        let text = String::from_utf8(bytes).map_err(|_| {
            CaError::validation(format!("user file {} is not UTF-8", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Subject for the requester's CSR; `fio` becomes the common name
    pub fn subject(&self) -> SubjectInfo {
        SubjectInfo::new(
            self.country_name.clone(),
            self.organization_name.clone(),
            self.fio.clone(),
        )
    }
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("fio", &self.fio)
            .field("country_name", &self.country_name)
            .field("organization_name", &self.organization_name)
            .field("password", &"<redacted>")
            .finish()
    }
}
