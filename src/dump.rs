//! Human-readable dumps of CA artifacts
//!
//! Certificates and requests use OpenSSL's own text formatter. The CRL is
//! rendered from its parsed model and private keys are summarised without
//! printing key material.

use std::path::Path;

use openssl::pkey::{Id, PKey};

use crate::artifact;
use crate::crl::RevocationList;
use crate::error::{CaError, Result};
use crate::issuance::Certificate;
use crate::request::SigningRequest;

/// Kind of PEM artifact, recognized by its header line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Certificate,
    SigningRequest,
    RevocationList,
    PrivateKey,
}

impl ArtifactKind {
    pub fn detect(pem: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(pem);
        if text.contains("-----BEGIN CERTIFICATE-----") {
            Some(ArtifactKind::Certificate)
        } else if text.contains("-----BEGIN CERTIFICATE REQUEST-----") {
            Some(ArtifactKind::SigningRequest)
        } else if text.contains("-----BEGIN X509 CRL-----") {
            Some(ArtifactKind::RevocationList)
        } else if text.contains("PRIVATE KEY-----") {
            Some(ArtifactKind::PrivateKey)
        } else {
            None
        }
    }
}

pub fn certificate(path: &Path) -> Result<String> {
    Certificate::load(path)?.to_text()
}

pub fn signing_request(path: &Path) -> Result<String> {
    SigningRequest::load(path)?.to_text()
}

pub fn revocation_list(path: &Path) -> Result<String> {
    Ok(RevocationList::load(path)?.render())
}

/// Algorithm, size and public half of a private key
pub fn private_key(path: &Path) -> Result<String> {
    let pem = artifact::read(path)?;
    let key = PKey::private_key_from_pem(&pem)
        .map_err(|e| CaError::crypto(format!("Failed to parse private key {}", path.display()), e))?;
    let public = key
        .public_key_to_pem()
        .map_err(|e| CaError::crypto("Failed to encode public key", e))?;
    let algorithm = match key.id() {
        Id::RSA => "RSA",
        Id::EC => "EC",
        Id::ED25519 => "ED25519",
        _ => "other",
    };
    Ok(format!(
        "Private-Key: ({} bit)\nAlgorithm: {}\n{}",
        key.bits(),
        algorithm,
        String::from_utf8_lossy(&public)
    ))
}

/// Dump any artifact, picking the formatter from its PEM header
pub fn any_artifact(path: &Path) -> Result<String> {
    let pem = artifact::read(path)?;
    match ArtifactKind::detect(&pem) {
        Some(ArtifactKind::Certificate) => certificate(path),
        Some(ArtifactKind::SigningRequest) => signing_request(path),
        Some(ArtifactKind::RevocationList) => revocation_list(path),
        Some(ArtifactKind::PrivateKey) => private_key(path),
        None => Err(CaError::validation(format!(
            "{} is not a recognized PEM artifact",
            path.display()
        ))),
    }
}

/// One artifact file name per line
pub fn listing(dir: &Path) -> Result<String> {
    let files = artifact::list_artifacts(dir)?;
    if files.is_empty() {
        return Ok(format!("{}: (empty)\n", dir.display()));
    }
    let mut out = format!("{}:\n", dir.display());
    for file in files {
        if let Some(name) = file.file_name() {
            out.push_str("  ");
            out.push_str(&name.to_string_lossy());
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::CaLayout;
    use crate::key_store::{KeyRole, KeyStore};

    #[test]
    fn test_key_summary_has_no_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(CaLayout::new(dir.path()), 2048);
        let key = store.generate_or_load(KeyRole::Root, "root.key.pem").unwrap();

        let text = any_artifact(key.path()).unwrap();
        assert!(text.contains("2048 bit"));
        assert!(text.contains("BEGIN PUBLIC KEY"));
        assert!(!text.contains("PRIVATE KEY-----\n"));
    }

    #[test]
    fn test_unknown_artifact_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(any_artifact(&path).unwrap_err().is_validation());
        assert!(listing(dir.path()).unwrap().contains("notes.txt"));
        assert!(listing(&dir.path().join("none")).unwrap().contains("(empty)"));
    }
}
