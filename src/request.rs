//! Certificate Signing Requests
//!
//! Builds PKCS#10 requests for the issuing CA and reads them back for
//! cross-signing. A request binds a three-attribute subject to the public half
//! of the issuer-role key and is self-signed with SHA-256.
//!
//! # Example
//! ```rust,no_run
//! use pki_lifecycle::request::SigningRequestBuilder;
//! use pki_lifecycle::subject::SubjectInfo;
//! # fn example(key: &openssl::pkey::PKey<openssl::pkey::Private>) -> pki_lifecycle::error::Result<()> {
//! let csr = SigningRequestBuilder::new(key)
//!     .subject(SubjectInfo::new("RU", "TestOrg", "TestIssuer"))
//!     .build()?;
//! println!("{}", csr.subject_line());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;

use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, PKeyRef, Private, Public};
use openssl::x509::{X509Req, X509ReqRef};

use crate::artifact;
use crate::error::{CaError, Result};
use crate::subject::{self, SubjectInfo};

const X509_REQ_VERSION_1: i32 = 0; // PKCS#10 version 1 is represented by 0

/// File suffix every CSR artifact and ledger name carries
pub const CSR_SUFFIX: &str = ".csr.pem";

/// `issuer1` and `issuer1.csr.pem` both name the same request
pub fn normalized_name(name: &str) -> String {
    let name = name.trim();
    if name.ends_with(CSR_SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, CSR_SUFFIX)
    }
}

/// Logical request name with the file suffix stripped
pub fn base_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_suffix(CSR_SUFFIX).unwrap_or(name)
}

/// A parsed PKCS#10 request
pub struct SigningRequest {
    req: X509Req,
}

impl SigningRequest {
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let req =
            X509Req::from_pem(pem).map_err(|e| CaError::crypto("Failed to parse CSR", e))?;
        Ok(Self { req })
    }

    /// Read a request file; an absent file is `NotFound`
    pub fn load(path: &Path) -> Result<Self> {
        let pem = artifact::read(path)?;
        Self::from_pem(&pem)
    }

    pub fn as_req(&self) -> &X509ReqRef {
        &self.req
    }

    /// Public key bound to the request
    pub fn public_key(&self) -> Result<PKey<Public>> {
        self.req
            .public_key()
            .map_err(|_| CaError::not_found("CSR does not carry a readable public key"))
    }

    pub fn subject(&self) -> Result<SubjectInfo> {
        SubjectInfo::from_x509_name(self.req.subject_name())
    }

    pub fn subject_line(&self) -> String {
        subject::one_line(self.req.subject_name())
    }

    /// Check the request's self-signature
    pub fn verify(&self) -> Result<bool> {
        let key = self.public_key()?;
        self.req
            .verify(&key)
            .map_err(|e| CaError::crypto("Failed to verify CSR signature", e))
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        self.req
            .to_pem()
            .map_err(|e| CaError::crypto("Failed to encode CSR", e))
    }

    pub fn to_text(&self) -> Result<String> {
        let text = self
            .req
            .to_text()
            .map_err(|e| CaError::crypto("Failed to render CSR", e))?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

impl fmt::Debug for SigningRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningRequest")
            .field("subject", &self.subject_line())
            .finish()
    }
}

/// Builder for a SHA-256 signed request over an existing key
pub struct SigningRequestBuilder<'a> {
    key: &'a PKeyRef<Private>,
    subject: Option<SubjectInfo>,
}

impl<'a> SigningRequestBuilder<'a> {
    pub fn new(key: &'a PKeyRef<Private>) -> Self {
        Self { key, subject: None }
    }

    pub fn subject(mut self, subject: SubjectInfo) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Build and sign the request
    ///
    /// # Errors
    /// `Validation` if the subject is missing or has an empty attribute,
    /// `Crypto` if encoding or signing fails.
    pub fn build(self) -> Result<SigningRequest> {
        let subject = self
            .subject
            .ok_or_else(|| CaError::validation("CSR subject is not set"))?;
        let name = subject.to_x509_name()?;

        let mut builder =
            X509Req::builder().map_err(|e| CaError::crypto("Failed to create CSR builder", e))?;
        builder
            .set_version(X509_REQ_VERSION_1)
            .map_err(|e| CaError::crypto("Failed to set CSR version", e))?;
        builder
            .set_subject_name(&name)
            .map_err(|e| CaError::crypto("Failed to set CSR subject", e))?;
        builder
            .set_pubkey(self.key)
            .map_err(|e| CaError::crypto("Failed to set CSR public key", e))?;
        builder
            .sign(self.key, MessageDigest::sha256())
            .map_err(|e| CaError::crypto("Failed to sign CSR", e))?;

        Ok(SigningRequest {
            req: builder.build(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::rsa::Rsa;

    fn key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    #[test]
    fn test_build_and_reload() {
        let key = key();
        let csr = SigningRequestBuilder::new(&key)
            .subject(SubjectInfo::new("RU", "TestOrg", "TestIssuer"))
            .build()
            .unwrap();
        assert!(csr.verify().unwrap());

        let reloaded = SigningRequest::from_pem(&csr.to_pem().unwrap()).unwrap();
        assert_eq!(reloaded.subject_line(), "/C=RU/O=TestOrg/CN=TestIssuer");
        assert!(reloaded.public_key().unwrap().public_eq(&key));
    }

    #[test]
    fn test_missing_subject_is_rejected() {
        let key = key();
        let err = SigningRequestBuilder::new(&key).build().unwrap_err();
        assert!(err.is_validation());
        let err = SigningRequestBuilder::new(&key)
            .subject(SubjectInfo::new("", "TestOrg", "TestIssuer"))
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_names_are_normalized() {
        assert_eq!(normalized_name("issuer1"), "issuer1.csr.pem");
        assert_eq!(normalized_name("issuer1.csr.pem"), "issuer1.csr.pem");
        assert_eq!(base_name("issuer1.csr.pem"), "issuer1");
        assert_eq!(base_name("issuer1"), "issuer1");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SigningRequest::load(&dir.path().join("nope.csr.pem"))
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }
}
