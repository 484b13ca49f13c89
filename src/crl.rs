//! Revocation & CRL Manager
//!
//! The CRL file is the public half of the revocation state: an X.509 v2 list
//! signed with SHA-256 over the issuer's RSA key. It is parsed with OpenSSL
//! and re-signed with rcgen, since OpenSSL's Rust bindings can read CRLs but
//! not build them.
//!
//! Every mutation goes through the same cycle:
//! ```text
//! load ──► upsert entry ──► refresh lastUpdate/nextUpdate ──► sign ──► stage ──► commit
//! ```
//! Staging and committing are separate so the caller can tie the rename to a
//! metadata transaction.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use openssl::pkey::{PKeyRef, Private};
use openssl::x509::{ReasonCode, X509Crl};
use rcgen::{
    CertificateParams, CertificateRevocationListParams, DistinguishedName, DnType, DnValue,
    KeyIdMethod, KeyPair, KeyUsagePurpose, RevokedCertParams,
};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::artifact::{self, StagedArtifact, Visibility};
use crate::error::{CaError, Result};
use crate::issuance::{self, Certificate};
use crate::serial::SerialNumber;
use crate::subject::{self, SubjectInfo};

const SECONDS_PER_DAY: i64 = 86_400;

/// Default distance between `lastUpdate` and `nextUpdate`
pub const DEFAULT_UPDATE_DAYS: i64 = 30;

/// Operator-facing revocation reasons
///
/// The numeric operator codes run 0-8 in declaration order. On the wire each
/// maps to its RFC 5280 `CRLReason`; `AccessDenied` has no RFC counterpart and
/// is written as `unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationReason {
    KeyCompromise,
    CACompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCRL,
    PrivilegeWithdrawn,
    AccessDenied,
}

impl RevocationReason {
    pub const ALL: [RevocationReason; 9] = [
        RevocationReason::KeyCompromise,
        RevocationReason::CACompromise,
        RevocationReason::AffiliationChanged,
        RevocationReason::Superseded,
        RevocationReason::CessationOfOperation,
        RevocationReason::CertificateHold,
        RevocationReason::RemoveFromCRL,
        RevocationReason::PrivilegeWithdrawn,
        RevocationReason::AccessDenied,
    ];

    /// Reason for an operator code (0 = KeyCompromise ... 8 = AccessDenied)
    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| CaError::validation(format!("unknown revocation reason code {}", code)))
    }

    pub fn code(self) -> u8 {
        match self {
            RevocationReason::KeyCompromise => 0,
            RevocationReason::CACompromise => 1,
            RevocationReason::AffiliationChanged => 2,
            RevocationReason::Superseded => 3,
            RevocationReason::CessationOfOperation => 4,
            RevocationReason::CertificateHold => 5,
            RevocationReason::RemoveFromCRL => 6,
            RevocationReason::PrivilegeWithdrawn => 7,
            RevocationReason::AccessDenied => 8,
        }
    }

    /// RFC 5280 `CRLReason` value written into the CRL entry
    pub fn rfc_code(self) -> i64 {
        match self {
            RevocationReason::AccessDenied => 0,
            RevocationReason::KeyCompromise => 1,
            RevocationReason::CACompromise => 2,
            RevocationReason::AffiliationChanged => 3,
            RevocationReason::Superseded => 4,
            RevocationReason::CessationOfOperation => 5,
            RevocationReason::CertificateHold => 6,
            RevocationReason::RemoveFromCRL => 8,
            RevocationReason::PrivilegeWithdrawn => 9,
        }
    }

    /// Inverse of [`rfc_code`](Self::rfc_code); `unspecified` reads back as `AccessDenied`
    pub fn from_rfc_code(code: i64) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.rfc_code() == code)
            .ok_or_else(|| CaError::validation(format!("unsupported CRL reason code {}", code)))
    }

    fn to_rcgen(self) -> rcgen::RevocationReason {
        match self {
            RevocationReason::AccessDenied => rcgen::RevocationReason::Unspecified,
            RevocationReason::KeyCompromise => rcgen::RevocationReason::KeyCompromise,
            RevocationReason::CACompromise => rcgen::RevocationReason::CaCompromise,
            RevocationReason::AffiliationChanged => rcgen::RevocationReason::AffiliationChanged,
            RevocationReason::Superseded => rcgen::RevocationReason::Superseded,
            RevocationReason::CessationOfOperation => {
                rcgen::RevocationReason::CessationOfOperation
            }
            RevocationReason::CertificateHold => rcgen::RevocationReason::CertificateHold,
            RevocationReason::RemoveFromCRL => rcgen::RevocationReason::RemoveFromCrl,
            RevocationReason::PrivilegeWithdrawn => rcgen::RevocationReason::PrivilegeWithdrawn,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RevocationReason::KeyCompromise => "KeyCompromise",
            RevocationReason::CACompromise => "CACompromise",
            RevocationReason::AffiliationChanged => "AffiliationChanged",
            RevocationReason::Superseded => "Superseded",
            RevocationReason::CessationOfOperation => "CessationOfOperation",
            RevocationReason::CertificateHold => "CertificateHold",
            RevocationReason::RemoveFromCRL => "RemoveFromCRL",
            RevocationReason::PrivilegeWithdrawn => "PrivilegeWithdrawn",
            RevocationReason::AccessDenied => "AccessDenied",
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RevocationReason {
    type Err = CaError;

    /// Accepts a reason name (case-insensitive) or an operator code
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CaError::validation(format!("unknown revocation reason {:?}", s)))
    }
}

/// One revoked (or held) certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationEntry {
    pub serial: SerialNumber,
    /// Seconds since the Unix epoch
    pub revoked_at: i64,
    pub reason: RevocationReason,
}

impl RevocationEntry {
    pub fn now(serial: SerialNumber, reason: RevocationReason) -> Self {
        Self {
            serial,
            revoked_at: unix_now(),
            reason,
        }
    }
}

/// In-memory model of the CRL file
#[derive(Debug, Clone)]
pub struct RevocationList {
    issuer: SubjectInfo,
    last_update: i64,
    next_update: i64,
    entries: Vec<RevocationEntry>,
}

impl RevocationList {
    /// Empty list bound to `issuer`, dated now
    pub fn new(issuer: SubjectInfo, update_days: i64) -> Self {
        let mut list = Self {
            issuer,
            last_update: 0,
            next_update: 0,
            entries: Vec::new(),
        };
        list.refresh(update_days);
        list
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let crl = X509Crl::from_pem(pem).map_err(|e| CaError::crypto("Failed to parse CRL", e))?;
        let issuer = SubjectInfo::from_x509_name(crl.issuer_name())?;
        let last_update = issuance::asn1_to_unix(crl.last_update())?;
        let next_update = match crl.next_update() {
            Some(t) => issuance::asn1_to_unix(t)?,
            None => last_update,
        };

        let mut entries = Vec::new();
        if let Some(revoked) = crl.get_revoked() {
            for item in revoked {
                let serial = SerialNumber::from_asn1(item.serial_number())?;
                let revoked_at = issuance::asn1_to_unix(item.revocation_date())?;
                let reason = match item
                    .extension::<ReasonCode>()
                    .map_err(|e| CaError::crypto("Failed to read CRL reason code", e))?
                {
                    Some((_, code)) => {
                        let code = code
                            .get_i64()
                            .map_err(|e| CaError::crypto("Failed to decode CRL reason code", e))?;
                        RevocationReason::from_rfc_code(code)?
                    }
                    // no RFC code for AccessDenied; it shares `unspecified` and the absent case
                    None => RevocationReason::AccessDenied,
                };
                entries.push(RevocationEntry {
                    serial,
                    revoked_at,
                    reason,
                });
            }
        }

        Ok(Self {
            issuer,
            last_update,
            next_update,
            entries,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let pem = artifact::read(path)?;
        Self::from_pem(&pem)
    }

    pub fn issuer(&self) -> &SubjectInfo {
        &self.issuer
    }

    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    pub fn next_update(&self) -> i64 {
        self.next_update
    }

    pub fn entries(&self) -> &[RevocationEntry] {
        &self.entries
    }

    pub fn find(&self, serial: &SerialNumber) -> Option<&RevocationEntry> {
        self.entries.iter().find(|e| &e.serial == serial)
    }

    /// Add an entry, replacing any existing entry for the same serial in place
    pub fn upsert(&mut self, entry: RevocationEntry) {
        match self.entries.iter_mut().find(|e| e.serial == entry.serial) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Re-date the list: `lastUpdate = now`, `nextUpdate = now + update_days`
    pub fn refresh(&mut self, update_days: i64) {
        self.last_update = unix_now();
        self.next_update = self.last_update + update_days * SECONDS_PER_DAY;
    }

    /// Sign the list with the issuer key and encode it as PEM
    pub fn sign(&self, key: &PKeyRef<Private>) -> Result<Vec<u8>> {
        let key_pem = key
            .private_key_to_pem_pkcs8()
            .map_err(|e| CaError::crypto("Failed to export CRL signing key", e))?;
        let key_pem = String::from_utf8(key_pem)
            .map_err(|e| CaError::crypto("CRL signing key is not valid PEM", e))?;
        let key_pair = KeyPair::from_pem(&key_pem)
            .map_err(|e| CaError::crypto("Failed to load CRL signing key", e))?;

        let mut issuer_params = CertificateParams::default();
        issuer_params.distinguished_name = distinguished_name(&self.issuer)?;
        issuer_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let issuer = rcgen::Issuer::new(issuer_params, &key_pair);

        let mut revoked_certs = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            revoked_certs.push(RevokedCertParams {
                serial_number: rcgen::SerialNumber::from_slice(&entry.serial.to_bytes()?),
                revocation_time: to_offset(entry.revoked_at)?,
                reason_code: Some(entry.reason.to_rcgen()),
                invalidity_date: None,
            });
        }

        let params = CertificateRevocationListParams {
            this_update: to_offset(self.last_update)?,
            next_update: to_offset(self.next_update)?,
            crl_number: rcgen::SerialNumber::from_slice(&crl_number()),
            issuing_distribution_point: None,
            revoked_certs,
            key_identifier_method: KeyIdMethod::Sha256,
        };
        let crl = params
            .signed_by(&issuer)
            .map_err(|e| CaError::crypto("Failed to sign CRL", e))?;
        let pem = crl
            .pem()
            .map_err(|e| CaError::crypto("Failed to encode CRL", e))?;
        Ok(pem.into_bytes())
    }

    /// Sign and stage next to `path` without replacing the live file
    pub fn stage(&self, path: &Path, key: &PKeyRef<Private>) -> Result<StagedArtifact> {
        let pem = self.sign(key)?;
        artifact::stage(path, &pem, Visibility::Public)
    }

    /// Human-readable listing
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("Certificate Revocation List (CRL):\n");
        out.push_str("    Version 2 (0x1)\n");
        out.push_str("    Signature Algorithm: sha256WithRSAEncryption\n");
        out.push_str(&format!(
            "    Issuer: /C={}/O={}/CN={}\n",
            self.issuer.country, self.issuer.organization, self.issuer.common_name
        ));
        out.push_str(&format!("    Last Update: {}\n", display_time(self.last_update)));
        out.push_str(&format!("    Next Update: {}\n", display_time(self.next_update)));
        if self.entries.is_empty() {
            out.push_str("No Revoked Certificates.\n");
            return out;
        }
        out.push_str("Revoked Certificates:\n");
        for entry in &self.entries {
            out.push_str(&format!("    Serial Number: {}\n", entry.serial));
            out.push_str(&format!(
                "        Revocation Date: {}\n",
                display_time(entry.revoked_at)
            ));
            out.push_str(&format!("        CRL Reason Code: {}\n", entry.reason));
        }
        out
    }
}

impl fmt::Display for RevocationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Create a new empty CRL bound to `issuer_cert`'s subject and write it to `path`
pub fn initialize(
    path: &Path,
    key: &PKeyRef<Private>,
    issuer_cert: &Certificate,
    update_days: i64,
) -> Result<RevocationList> {
    if !key.public_eq(&*issuer_cert.public_key()?) {
        return Err(CaError::validation(
            "CRL signing key does not belong to the issuer certificate",
        ));
    }
    let list = RevocationList::new(issuer_cert.subject()?, update_days);
    list.stage(path, key)?.commit()?;
    info!(
        path = %path.display(),
        issuer = %subject::one_line(issuer_cert.as_x509().subject_name()),
        "CRL initialized"
    );
    Ok(list)
}

/// Reload, re-date and re-sign the CRL in place
pub fn regenerate(path: &Path, key: &PKeyRef<Private>, update_days: i64) -> Result<RevocationList> {
    let mut list = load_signed_by(path, key)?;
    list.refresh(update_days);
    list.stage(path, key)?.commit()?;
    debug!(path = %path.display(), entries = list.entries().len(), "CRL regenerated");
    Ok(list)
}

/// Load the CRL, record `entry`, re-date and sign into a staged file
///
/// The live CRL is untouched until the returned artifact is committed.
pub fn prepare_entry(
    path: &Path,
    key: &PKeyRef<Private>,
    entry: RevocationEntry,
    update_days: i64,
) -> Result<(RevocationList, StagedArtifact)> {
    let mut list = load_signed_by(path, key)?;
    list.upsert(entry);
    list.refresh(update_days);
    let staged = list.stage(path, key)?;
    Ok((list, staged))
}

/// Revoke `certificate` in the CRL file only; the ledger is not touched
pub fn revoke(
    path: &Path,
    certificate: &Certificate,
    key: &PKeyRef<Private>,
    reason: RevocationReason,
    update_days: i64,
) -> Result<RevocationList> {
    let entry = RevocationEntry::now(certificate.serial()?, reason);
    let (list, staged) = prepare_entry(path, key, entry, update_days)?;
    staged.commit()?;
    info!(path = %path.display(), reason = %reason, "certificate added to CRL");
    Ok(list)
}

/// Load the CRL at `path`, refusing `key` unless it signed the current list
///
/// A list re-signed by another key would still carry the old issuer name,
/// and nobody could verify it against the issuer certificate.
fn load_signed_by(path: &Path, key: &PKeyRef<Private>) -> Result<RevocationList> {
    let pem = artifact::read(path)?;
    let crl = X509Crl::from_pem(&pem).map_err(|e| CaError::crypto("Failed to parse CRL", e))?;
    let signed = crl
        .verify(key)
        .map_err(|e| CaError::crypto("Failed to check CRL signature", e))?;
    if !signed {
        return Err(CaError::validation(format!(
            "{} was not signed by the given key",
            path.display()
        )));
    }
    RevocationList::from_pem(&pem)
}

fn distinguished_name(subject: &SubjectInfo) -> Result<DistinguishedName> {
    subject.validate()?;
    let country = rcgen::string::PrintableString::try_from(subject.country.as_str())
        .map_err(|e| CaError::crypto("CRL issuer country is not printable", e))?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, DnValue::PrintableString(country));
    dn.push(DnType::OrganizationName, subject.organization.as_str());
    dn.push(DnType::CommonName, subject.common_name.as_str());
    Ok(dn)
}

fn to_offset(ts: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(ts).map_err(|e| CaError::crypto("Timestamp out of range", e))
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

// crlNumber is the signing time in milliseconds, minimal big-endian
fn crl_number() -> Vec<u8> {
    let millis = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64;
    let bytes = millis.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

fn display_time(ts: i64) -> String {
    issuance::format_unix(ts)
        .map(|t| format!("{} GMT", t))
        .unwrap_or_else(|_| ts.to_string())
}
