//! Certificate Issuance
//!
//! Builders for the two certificate shapes of the two-tier hierarchy and a
//! thin wrapper for reading issued certificates back.
//!
//! # PKI Hierarchy
//! ```text
//! Root CA (self-signed, pathlen=1)      <- RootCertificateBuilder
//!   └── Issuing CA (cross-signed, pathlen=0) <- CrossSignBuilder
//! ```
//!
//! # Certificate Properties
//! - **Version**: X.509v3
//! - **Signature Algorithm**: SHA-256 with RSA
//! - **Key Usage**: keyCertSign, cRLSign, digitalSignature
//! - **Serial Number**: caller-allocated, see [`crate::serial`]
//!
//! An issuing CA certificate never gets a fresh validity window: its
//! `notBefore`/`notAfter` are copied from the signing certificate, so it
//! cannot outlive the root that signed it.

use std::fmt;
use std::path::Path;

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, PKeyRef, Private, Public};
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Ref, X509};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::artifact;
use crate::error::{CaError, Result};
use crate::request::SigningRequest;
use crate::serial::SerialNumber;
use crate::subject::{self, SubjectInfo};

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const ROOT_CA_PATH_LENGTH: u32 = 1;
const ISSUING_CA_PATH_LENGTH: u32 = 0; // Can only sign end-entity certs

/// An issued X.509 certificate
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
}

impl Certificate {
    pub fn from_x509(x509: X509) -> Self {
        Self { x509 }
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let x509 =
            X509::from_pem(pem).map_err(|e| CaError::crypto("Failed to parse certificate", e))?;
        Ok(Self { x509 })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let pem = artifact::read(path)?;
        Self::from_pem(&pem)
    }

    pub fn as_x509(&self) -> &X509Ref {
        &self.x509
    }

    pub fn serial(&self) -> Result<SerialNumber> {
        SerialNumber::from_asn1(self.x509.serial_number())
    }

    pub fn subject_line(&self) -> String {
        subject::one_line(self.x509.subject_name())
    }

    pub fn issuer_line(&self) -> String {
        subject::one_line(self.x509.issuer_name())
    }

    pub fn subject(&self) -> Result<SubjectInfo> {
        SubjectInfo::from_x509_name(self.x509.subject_name())
    }

    pub fn public_key(&self) -> Result<PKey<Public>> {
        self.x509
            .public_key()
            .map_err(|e| CaError::crypto("Failed to read certificate public key", e))
    }

    /// `notBefore` as `YYYY-MM-DD HH:MM:SS` UTC
    pub fn not_before_text(&self) -> Result<String> {
        format_asn1_time(self.x509.not_before())
    }

    /// `notAfter` as `YYYY-MM-DD HH:MM:SS` UTC
    pub fn not_after_text(&self) -> Result<String> {
        format_asn1_time(self.x509.not_after())
    }

    /// Check that `issuer` signed this certificate
    pub fn verify_signed_by(&self, issuer: &Certificate) -> Result<bool> {
        let key = issuer.public_key()?;
        self.x509
            .verify(&key)
            .map_err(|e| CaError::crypto("Failed to verify certificate signature", e))
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        self.x509
            .to_pem()
            .map_err(|e| CaError::crypto("Failed to encode certificate", e))
    }

    pub fn to_text(&self) -> Result<String> {
        let text = self
            .x509
            .to_text()
            .map_err(|e| CaError::crypto("Failed to render certificate", e))?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject_line())
            .field("issuer", &self.issuer_line())
            .finish()
    }
}

/// Seconds since the Unix epoch for an ASN.1 time
pub fn asn1_to_unix(t: &Asn1TimeRef) -> Result<i64> {
    let epoch = Asn1Time::from_unix(0).map_err(|e| CaError::crypto("Failed to build epoch", e))?;
    let diff = epoch
        .diff(t)
        .map_err(|e| CaError::crypto("Failed to compare ASN.1 times", e))?;
    Ok(i64::from(diff.days) * 86_400 + i64::from(diff.secs))
}

pub fn format_unix(ts: i64) -> Result<String> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp(ts)
        .map_err(|e| CaError::crypto("Timestamp out of range", e))?
        .format(&format)
        .map_err(|e| CaError::crypto("Failed to format timestamp", e))
}

fn format_asn1_time(t: &Asn1TimeRef) -> Result<String> {
    format_unix(asn1_to_unix(t)?)
}

fn ca_extensions(builder: &mut X509Builder, path_length: u32) -> Result<()> {
    let mut bc = BasicConstraints::new();
    bc.critical().ca();
    bc.pathlen(path_length);
    let extension = bc
        .build()
        .map_err(|e| CaError::crypto("Failed to build BasicConstraints", e))?;
    builder
        .append_extension(extension)
        .map_err(|e| CaError::crypto("Failed to add BasicConstraints", e))?;

    let mut ku = KeyUsage::new();
    ku.critical();
    ku.key_cert_sign();
    ku.crl_sign();
    ku.digital_signature();
    let ku_extension = ku
        .build()
        .map_err(|e| CaError::crypto("Failed to build KeyUsage", e))?;
    builder
        .append_extension(ku_extension)
        .map_err(|e| CaError::crypto("Failed to add KeyUsage", e))?;
    Ok(())
}

fn new_builder(serial: &SerialNumber) -> Result<X509Builder> {
    let mut builder =
        X509::builder().map_err(|e| CaError::crypto("Failed to create X509 builder", e))?;
    builder
        .set_version(X509_VERSION_3)
        .map_err(|e| CaError::crypto("Failed to set version", e))?;
    let asn1_serial = serial.to_asn1_integer()?;
    builder
        .set_serial_number(&asn1_serial)
        .map_err(|e| CaError::crypto("Failed to set serial number", e))?;
    Ok(builder)
}

// ================= Self-signed root =================

/// Builder for the self-signed root certificate
///
/// Subject and issuer are the same three-attribute name; the validity window
/// starts now and runs for `validity_days`.
///
/// # Examples
/// ```rust,no_run
/// # use pki_lifecycle::issuance::RootCertificateBuilder;
/// # use pki_lifecycle::serial::SerialNumber;
/// # use pki_lifecycle::subject::SubjectInfo;
/// # fn example(key: &openssl::pkey::PKey<openssl::pkey::Private>, serial: SerialNumber) -> pki_lifecycle::error::Result<()> {
/// let root = RootCertificateBuilder::new(key, serial)
///     .subject(SubjectInfo::new("RU", "TestOrg", "TestRoot"))
///     .validity_days(365)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RootCertificateBuilder<'a> {
    key: &'a PKeyRef<Private>,
    serial: SerialNumber,
    subject: Option<SubjectInfo>,
    validity_days: i64,
}

impl<'a> RootCertificateBuilder<'a> {
    pub fn new(key: &'a PKeyRef<Private>, serial: SerialNumber) -> Self {
        Self {
            key,
            serial,
            subject: None,
            validity_days: 3650,
        }
    }

    pub fn subject(mut self, subject: SubjectInfo) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    /// Build and self-sign the root certificate
    ///
    /// # Errors
    /// `Validation` for an empty subject attribute or `validity_days <= 0`,
    /// `Crypto` if encoding or signing fails.
    pub fn build(self) -> Result<Certificate> {
        let subject = self
            .subject
            .ok_or_else(|| CaError::validation("root certificate subject is not set"))?;
        subject.validate()?;
        if self.validity_days <= 0 {
            return Err(CaError::validation(format!(
                "validity must be a positive number of days, got {}",
                self.validity_days
            )));
        }
        let days = u32::try_from(self.validity_days).map_err(|_| {
            CaError::validation(format!("validity of {} days is too large", self.validity_days))
        })?;

        let mut builder = new_builder(&self.serial)?;
        let name = subject.to_x509_name()?;
        builder
            .set_subject_name(&name)
            .map_err(|e| CaError::crypto("Failed to set subject", e))?;
        builder
            .set_issuer_name(&name)
            .map_err(|e| CaError::crypto("Failed to set issuer", e))?;

        let not_before = Asn1Time::days_from_now(0)
            .map_err(|e| CaError::crypto("Failed to create not_before", e))?;
        builder
            .set_not_before(&not_before)
            .map_err(|e| CaError::crypto("Failed to set not_before", e))?;
        let not_after = Asn1Time::days_from_now(days)
            .map_err(|e| CaError::crypto("Failed to create not_after", e))?;
        builder
            .set_not_after(&not_after)
            .map_err(|e| CaError::crypto("Failed to set not_after", e))?;

        builder
            .set_pubkey(self.key)
            .map_err(|e| CaError::crypto("Failed to set public key", e))?;
        ca_extensions(&mut builder, ROOT_CA_PATH_LENGTH)?;

        builder
            .sign(self.key, MessageDigest::sha256())
            .map_err(|e| CaError::crypto("Failed to sign certificate", e))?;

        Ok(Certificate::from_x509(builder.build()))
    }
}

// ================= Cross-signed issuing CA =================

/// Builder for a certificate cross-signed from a CSR
///
/// Subject and public key come from the request, issuer from the signing
/// certificate, and the validity window is copied from the signing
/// certificate unchanged.
pub struct CrossSignBuilder<'a> {
    signer_cert: &'a Certificate,
    signer_key: &'a PKeyRef<Private>,
    serial: SerialNumber,
}

impl<'a> CrossSignBuilder<'a> {
    pub fn new(
        signer_cert: &'a Certificate,
        signer_key: &'a PKeyRef<Private>,
        serial: SerialNumber,
    ) -> Self {
        Self {
            signer_cert,
            signer_key,
            serial,
        }
    }

    /// Sign `request`
    ///
    /// # Errors
    /// `NotFound` if the request's subject or public key cannot be read,
    /// `Validation` if the signer's validity bounds cannot be read,
    /// `Crypto` if signing fails.
    pub fn sign(self, request: &SigningRequest) -> Result<Certificate> {
        let public_key = request.public_key()?;
        let subject_name = request.as_req().subject_name();
        if subject_name.entries().next().is_none() {
            return Err(CaError::not_found("CSR does not carry a subject"));
        }

        let signer = self.signer_cert.as_x509();
        // both bounds must be decodable before they are copied
        for bound in [signer.not_before(), signer.not_after()] {
            asn1_to_unix(bound).map_err(|e| {
                CaError::validation(format!("signer validity bounds are unreadable: {}", e))
            })?;
        }

        let mut builder = new_builder(&self.serial)?;
        builder
            .set_subject_name(subject_name)
            .map_err(|e| CaError::crypto("Failed to set subject from CSR", e))?;
        builder
            .set_issuer_name(signer.subject_name())
            .map_err(|e| CaError::crypto("Failed to set issuer from signer", e))?;
        builder
            .set_not_before(signer.not_before())
            .map_err(|e| CaError::crypto("Failed to copy not_before", e))?;
        builder
            .set_not_after(signer.not_after())
            .map_err(|e| CaError::crypto("Failed to copy not_after", e))?;
        builder
            .set_pubkey(&public_key)
            .map_err(|e| CaError::crypto("Failed to set public key from CSR", e))?;
        ca_extensions(&mut builder, ISSUING_CA_PATH_LENGTH)?;

        builder
            .sign(self.signer_key, MessageDigest::sha256())
            .map_err(|e| CaError::crypto("Failed to sign certificate", e))?;

        Ok(Certificate::from_x509(builder.build()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SigningRequestBuilder;
    use openssl::rsa::Rsa;

    fn key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    fn serial(n: &str) -> SerialNumber {
        SerialNumber::parse(n).unwrap()
    }

    fn root(key: &PKey<Private>) -> Certificate {
        RootCertificateBuilder::new(key, serial("1001"))
            .subject(SubjectInfo::new("RU", "TestOrg", "TestRoot"))
            .validity_days(365)
            .build()
            .unwrap()
    }

    #[test]
    fn test_root_is_self_signed() {
        let key = key();
        let cert = root(&key);
        assert_eq!(cert.subject_line(), "/C=RU/O=TestOrg/CN=TestRoot");
        assert_eq!(cert.issuer_line(), cert.subject_line());
        assert_eq!(cert.serial().unwrap().as_str(), "1001");
        assert!(cert.verify_signed_by(&cert).unwrap());

        let span = asn1_to_unix(cert.as_x509().not_after()).unwrap()
            - asn1_to_unix(cert.as_x509().not_before()).unwrap();
        assert_eq!(span, 365 * 86_400);
    }

    #[test]
    fn test_root_rejects_bad_input() {
        let key = key();
        let err = RootCertificateBuilder::new(&key, serial("1"))
            .subject(SubjectInfo::new("RU", "TestOrg", "TestRoot"))
            .validity_days(0)
            .build()
            .err()
            .unwrap();
        assert!(err.is_validation());

        let err = RootCertificateBuilder::new(&key, serial("1"))
            .subject(SubjectInfo::new("RU", "TestOrg", ""))
            .build()
            .err()
            .unwrap();
        assert!(err.is_validation());
    }

    #[test]
    fn test_cross_sign_copies_signer_window() {
        let root_key = key();
        let root = root(&root_key);
        let issuer_key = key();
        let csr = SigningRequestBuilder::new(&issuer_key)
            .subject(SubjectInfo::new("RU", "TestOrg", "TestIssuer"))
            .build()
            .unwrap();

        let cert = CrossSignBuilder::new(&root, &root_key, serial("2002"))
            .sign(&csr)
            .unwrap();

        assert_eq!(cert.subject_line(), "/C=RU/O=TestOrg/CN=TestIssuer");
        assert_eq!(cert.issuer_line(), root.subject_line());
        assert_eq!(cert.not_before_text().unwrap(), root.not_before_text().unwrap());
        assert_eq!(cert.not_after_text().unwrap(), root.not_after_text().unwrap());
        assert!(cert.verify_signed_by(&root).unwrap());
        assert!(cert.public_key().unwrap().public_eq(&issuer_key));
    }

    #[test]
    fn test_format_unix() {
        assert_eq!(format_unix(0).unwrap(), "1970-01-01 00:00:00");
        assert_eq!(format_unix(1_700_000_000).unwrap(), "2023-11-14 22:13:20");
    }
}
