//! Credential Bundler
//!
//! Packages an issued certificate with its private key into a
//! password-protected PKCS#12 container, `<name>.p12`.

use std::path::{Path, PathBuf};

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, PKeyRef, Private};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::artifact::{self, Visibility};
use crate::error::{CaError, Result};
use crate::issuance::Certificate;

pub const BUNDLE_SUFFIX: &str = ".p12";

/// Write `<dir>/<name>.p12` holding `cert` and `key`
///
/// # Errors
/// `Validation` if the password is empty or `key` is not the certificate's
/// key, `Crypto` if the container cannot be built.
pub fn export(
    dir: &Path,
    name: &str,
    cert: &Certificate,
    key: &PKeyRef<Private>,
    password: &SecretString,
) -> Result<PathBuf> {
    if password.expose_secret().is_empty() {
        return Err(CaError::validation("bundle password must not be empty"));
    }
    if !cert.public_key()?.public_eq(key) {
        return Err(CaError::validation(format!(
            "private key does not match certificate {}",
            cert.subject_line()
        )));
    }

    let mut builder = Pkcs12::builder();
    builder.name(name).pkey(key).cert(cert.as_x509());
    let pkcs12 = builder
        .build2(password.expose_secret())
        .map_err(|e| CaError::crypto("Failed to build PKCS#12 container", e))?;
    let der = pkcs12
        .to_der()
        .map_err(|e| CaError::crypto("Failed to encode PKCS#12 container", e))?;

    let path = dir.join(format!("{}{}", name, BUNDLE_SUFFIX));
    artifact::write_atomic(&path, &der, Visibility::Private)?;
    info!(path = %path.display(), subject = %cert.subject_line(), "credential bundle exported");
    Ok(path)
}

/// Open a bundle, returning its certificate and private key
pub fn open(path: &Path, password: &SecretString) -> Result<(Certificate, PKey<Private>)> {
    let der = artifact::read(path)?;
    let parsed = Pkcs12::from_der(&der)
        .and_then(|p| p.parse2(password.expose_secret()))
        .map_err(|e| CaError::crypto(format!("Failed to open {}", path.display()), e))?;
    let cert = parsed
        .cert
        .ok_or_else(|| CaError::not_found(format!("{} holds no certificate", path.display())))?;
    let key = parsed
        .pkey
        .ok_or_else(|| CaError::not_found(format!("{} holds no private key", path.display())))?;
    Ok((Certificate::from_x509(cert), key))
}
