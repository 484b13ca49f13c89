//! Certificate Authority facade
//!
//! [`CertificateAuthority`] is the one place where artifacts on disk and rows
//! in the ledger change together. Each mutating operation runs under a single
//! lock and follows the same shape:
//!
//! ```text
//! build artifact ──► stage next to destination ──► open ledger transaction
//!        ──► write row(s) ──► rename staged file ──► commit
//! ```
//!
//! A failure before the rename rolls the transaction back and drops the
//! staged file. A failing commit undoes the rename (removing the new file or
//! restoring the previous bytes), so the file and its row never disagree.
//!
//! Re-requesting an artifact that already exists by name is a cache hit: the
//! existing artifact is loaded and returned unchanged and no row is added.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::artifact::{self, StagedArtifact, Visibility};
use crate::bundle;
use crate::configs::{AppConfig, CaLayout};
use crate::crl::{self, RevocationEntry, RevocationList, RevocationReason};
use crate::error::{CaError, Result};
use crate::issuance::{Certificate, CrossSignBuilder, RootCertificateBuilder};
use crate::key_store::{KeyPair, KeyRole, KeyStore};
use crate::metadata::{
    CertificateStatus, CsrRecord, IssuerCertificateRecord, Ledger, MetadataStore,
    NewIssuerCertificate, RootCertificateRecord,
};
use crate::request::{self, SigningRequest, SigningRequestBuilder};
use crate::serial::{self, SerialNumber};
use crate::subject::SubjectInfo;
use crate::user_file::UserInfo;

pub const CERT_SUFFIX: &str = ".cert.pem";
const USER_FILE_SUFFIX: &str = ".txt";

/// Everything the bootstrap sequence produced or found
#[derive(Debug)]
pub struct Bootstrap {
    pub root_key: KeyPair,
    pub issuer_key: KeyPair,
    pub root_certificate: PathBuf,
    pub crl: PathBuf,
}

/// Disagreements between the CRL and the ledger
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditReport {
    /// Suspended or revoked in the ledger but absent from the CRL
    pub missing_from_crl: Vec<String>,
    /// Listed in the CRL without a suspended or revoked ledger row
    pub unknown_in_crl: Vec<String>,
    /// Suspended rows listed with a final reason, or revoked rows still on hold
    pub reason_mismatch: Vec<String>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_from_crl.is_empty()
            && self.unknown_in_crl.is_empty()
            && self.reason_mismatch.is_empty()
    }
}

pub struct CertificateAuthority {
    config: AppConfig,
    layout: CaLayout,
    keys: KeyStore,
    store: Mutex<MetadataStore>,
}

impl CertificateAuthority {
    /// Open the CA described by `config`, creating its directories and ledger
    pub fn open(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let store = MetadataStore::open(&config.paths.database_path)?;
        Self::with_store(config, store)
    }

    /// Use an already opened ledger (e.g. in-memory)
    pub fn with_store(config: AppConfig, store: MetadataStore) -> Result<Self> {
        config.validate()?;
        let layout = config.layout();
        layout.ensure()?;
        let keys = KeyStore::new(layout.clone(), config.keys.modulus_bits);
        info!(base = %layout.base().display(), "certificate authority opened");
        Ok(Self {
            config,
            layout,
            keys,
            store: Mutex::new(store),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn layout(&self) -> &CaLayout {
        &self.layout
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn crl_path(&self) -> PathBuf {
        self.layout.crl_dir().join(&self.config.crl.file_name)
    }

    pub fn root_certificate_path(&self) -> PathBuf {
        self.layout.root_certs_dir().join(&self.config.root_ca.cert_name)
    }

    pub fn signing_request_path(&self, name: &str) -> PathBuf {
        self.layout.csr_dir().join(request::normalized_name(name))
    }

    pub fn issuer_certificate_path(&self, name: &str) -> PathBuf {
        self.layout.issuer_certs_dir().join(certificate_file_name(name))
    }

    // ================= Keys =================

    pub fn generate_or_load_key(&self, role: KeyRole, name: &str) -> Result<KeyPair> {
        let _guard = self.store.lock();
        self.keys.generate_or_load(role, name)
    }

    pub fn rotate_key(&self, role: KeyRole, name: &str) -> Result<KeyPair> {
        let _guard = self.store.lock();
        self.keys.rotate(role, name)
    }

    // ================= Issuance =================

    /// Self-sign a root certificate stored as `name` in the root certificate directory
    ///
    /// # Errors
    /// `Validation` for an empty subject attribute or `validity_days <= 0`,
    /// `Crypto` if signing fails.
    pub fn create_self_signed_certificate(
        &self,
        name: &str,
        key: &KeyPair,
        subject: &SubjectInfo,
        validity_days: i64,
    ) -> Result<Certificate> {
        let mut store = self.store.lock();
        artifact::validate_file_name(name)?;
        let path = self.layout.root_certs_dir().join(name);
        if path.exists() {
            info!(path = %path.display(), "root certificate exists, loading");
            return Certificate::load(&path);
        }
        subject.validate()?;
        if validity_days <= 0 {
            return Err(CaError::validation(format!(
                "validity must be a positive number of days, got {}",
                validity_days
            )));
        }

        let serial = allocate_serial(store.ledger())?;
        let cert = RootCertificateBuilder::new(key.private_key(), serial.clone())
            .subject(subject.clone())
            .validity_days(validity_days)
            .build()?;
        let staged = artifact::stage(&path, &cert.to_pem()?, Visibility::Public)?;
        let info = cert.subject_line();
        commit_paired(&mut store, staged, None, |ledger| {
            ledger
                .insert_root_certificate(name, serial.as_str(), &info, validity_days)
                .map(|_| ())
        })?;
        info!(name, serial = %serial, subject = %info, "root certificate issued");
        Ok(cert)
    }

    /// Create `<name>.csr.pem` over `key` and record it
    pub fn create_signing_request(
        &self,
        name: &str,
        key: &KeyPair,
        subject: &SubjectInfo,
    ) -> Result<SigningRequest> {
        let mut store = self.store.lock();
        let base = request::base_name(name);
        artifact::validate_file_name(base)?;
        let path = self.signing_request_path(base);
        if path.exists() {
            if store.ledger().find_csr(base)?.is_none() {
                warn!(path = %path.display(), "CSR file has no ledger row");
            }
            info!(path = %path.display(), "CSR exists, loading");
            return SigningRequest::load(&path);
        }

        let csr = SigningRequestBuilder::new(key.private_key())
            .subject(subject.clone())
            .build()?;
        let staged = artifact::stage(&path, &csr.to_pem()?, Visibility::Public)?;
        let info = csr.subject_line();
        commit_paired(&mut store, staged, None, |ledger| {
            ledger.insert_csr(base, &info).map(|_| ())
        })?;
        info!(name = base, subject = %info, "CSR created");
        Ok(csr)
    }

    /// Create a CSR from a requester file; the file stem names the request
    /// and the issuer-role key signs it
    pub fn create_signing_request_from_file(&self, path: &Path) -> Result<SigningRequest> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                CaError::validation(format!("{} has no usable file name", path.display()))
            })?
            .to_string();
        let user = UserInfo::load(path)?;
        let key = self.generate_or_load_key(KeyRole::Issuer, &self.config.keys.issuer_key_name)?;
        self.create_signing_request(&name, &key, &user.subject())
    }

    /// Cross-sign the recorded CSR `csr_name` into `<name>.cert.pem`
    ///
    /// The new certificate copies its validity window from `signer_cert`.
    ///
    /// # Errors
    /// `NotFound` if the CSR file or row is missing or unreadable,
    /// `Validation` if the signer's validity cannot be read,
    /// `Crypto` if signing fails.
    pub fn create_cross_signed_certificate(
        &self,
        csr_name: &str,
        signer_cert: &Certificate,
        signer_key: &KeyPair,
    ) -> Result<Certificate> {
        let mut store = self.store.lock();
        let base = request::base_name(csr_name);
        artifact::validate_file_name(base)?;
        let cert_name = certificate_file_name(base);
        let path = self.layout.issuer_certs_dir().join(&cert_name);
        if path.exists() {
            info!(path = %path.display(), "issuer certificate exists, loading");
            return Certificate::load(&path);
        }

        let csr = SigningRequest::load(&self.signing_request_path(base))?;
        let serial = allocate_serial(store.ledger())?;
        let cert = CrossSignBuilder::new(signer_cert, signer_key.private_key(), serial.clone())
            .sign(&csr)?;

        let not_before = cert.not_before_text()?;
        let not_after = cert.not_after_text()?;
        let info = cert.subject_line();
        let staged = artifact::stage(&path, &cert.to_pem()?, Visibility::Public)?;
        commit_paired(&mut store, staged, None, |ledger| {
            ledger
                .insert_issuer_certificate(&NewIssuerCertificate {
                    cert_name: &cert_name,
                    serial: serial.as_str(),
                    not_before: &not_before,
                    not_after: &not_after,
                    info: &info,
                    csr_name: base,
                })
                .map(|_| ())
        })?;
        info!(
            name = %cert_name,
            serial = %serial,
            subject = %info,
            issuer = %cert.issuer_line(),
            "issuer certificate issued"
        );
        Ok(cert)
    }

    /// Cross-sign `csr_name` with the configured root key and certificate
    pub fn issue(&self, csr_name: &str) -> Result<Certificate> {
        let root_key = self.keys.load(KeyRole::Root)?;
        let root_cert = Certificate::load(&self.root_certificate_path())?;
        self.create_cross_signed_certificate(csr_name, &root_cert, &root_key)
    }

    // ================= Revocation =================

    /// Create the CRL bound to `issuer_cert`, or load it if it already exists
    pub fn initialize_crl(&self, key: &KeyPair, issuer_cert: &Certificate) -> Result<RevocationList> {
        let _guard = self.store.lock();
        let path = self.crl_path();
        if path.exists() {
            info!(path = %path.display(), "CRL exists, loading");
            return RevocationList::load(&path);
        }
        crl::initialize(&path, key.private_key(), issuer_cert, self.config.crl.update_days)
    }

    /// Re-date and re-sign the CRL with `key`, which must have signed the current list
    pub fn regenerate_crl(&self, key: &KeyPair) -> Result<RevocationList> {
        let _guard = self.store.lock();
        crl::regenerate(&self.crl_path(), key.private_key(), self.config.crl.update_days)
    }

    /// Revoke `certificate` with `reason`, signing the CRL with `crl_key`
    ///
    /// The CRL entry and the ledger status change land together or not at all.
    ///
    /// # Errors
    /// `Validation` if `crl_key` did not sign the current CRL (after bootstrap
    /// that is the root key) or the status cannot move to `revoked`,
    /// `NotFound` for an unknown serial.
    pub fn revoke(
        &self,
        certificate: &Certificate,
        crl_key: &KeyPair,
        reason: RevocationReason,
    ) -> Result<()> {
        self.revoke_serial(&certificate.serial()?, crl_key, reason)
    }

    pub fn revoke_serial(
        &self,
        serial: &SerialNumber,
        crl_key: &KeyPair,
        reason: RevocationReason,
    ) -> Result<()> {
        self.change_status(serial, crl_key, CertificateStatus::Revoked, reason)?;
        info!(serial = %serial, reason = %reason, "certificate revoked");
        Ok(())
    }

    /// Put a certificate on hold: status `suspended`, CRL reason `CertificateHold`
    pub fn suspend(&self, serial: &SerialNumber, crl_key: &KeyPair) -> Result<()> {
        self.change_status(
            serial,
            crl_key,
            CertificateStatus::Suspended,
            RevocationReason::CertificateHold,
        )?;
        info!(serial = %serial, "certificate suspended");
        Ok(())
    }

    fn change_status(
        &self,
        serial: &SerialNumber,
        crl_key: &KeyPair,
        status: CertificateStatus,
        reason: RevocationReason,
    ) -> Result<()> {
        let mut store = self.store.lock();
        let record = store
            .ledger()
            .find_issuer_certificate(serial.as_str())?
            .ok_or_else(|| {
                CaError::not_found(format!("no issuer certificate with serial {}", serial))
            })?;
        if !record.status.can_transition_to(status) {
            return Err(CaError::validation(format!(
                "certificate {} cannot move from {} to {}",
                serial, record.status, status
            )));
        }

        let path = self.crl_path();
        let previous = artifact::read(&path)?;
        let (_, staged) = crl::prepare_entry(
            &path,
            crl_key.private_key(),
            RevocationEntry::now(serial.clone(), reason),
            self.config.crl.update_days,
        )?;
        commit_paired(&mut store, staged, Some(previous), |ledger| {
            ledger
                .update_certificate_status(serial.as_str(), status)
                .map(|_| ())
        })?;
        debug!(serial = %serial, status = %status, "CRL and ledger updated");
        Ok(())
    }

    // ================= Administrative deletes =================

    /// Remove `<name>.csr.pem` and its row; returns whether anything was removed
    ///
    /// Refused with `Validation` while an issuer certificate row references it.
    pub fn delete_signing_request(&self, name: &str) -> Result<bool> {
        let mut store = self.store.lock();
        let base = request::base_name(name);
        let path = self.signing_request_path(base);
        let removed = delete_paired(&mut store, &path, |ledger| ledger.delete_csr(base))?;
        if removed {
            info!(name = base, "CSR deleted");
        }
        Ok(removed)
    }

    /// Remove an issued certificate file and its row
    ///
    /// Suspended and revoked certificates stay, since the CRL lists them.
    pub fn delete_issuer_certificate(&self, name: &str) -> Result<bool> {
        let mut store = self.store.lock();
        let cert_name = certificate_file_name(name);
        let path = self.layout.issuer_certs_dir().join(&cert_name);
        let removed = delete_paired(&mut store, &path, |ledger| {
            ledger.delete_issuer_certificate(&cert_name)
        })?;
        if removed {
            info!(name = %cert_name, "issuer certificate deleted");
        }
        Ok(removed)
    }

    /// Truncate the ledger; artifacts on disk are left alone
    pub fn clear_ledger(&self) -> Result<()> {
        let store = self.store.lock();
        store.ledger().clear_all()
    }

    // ================= Export =================

    /// Bundle an issued certificate with the issuer-role key as `<name>.p12`
    pub fn export_bundle(&self, name: &str, password: &SecretString) -> Result<PathBuf> {
        let _guard = self.store.lock();
        let base = request::base_name(name.trim_end_matches(CERT_SUFFIX));
        let cert = Certificate::load(&self.issuer_certificate_path(base))?;
        let key = self.keys.load(KeyRole::Issuer)?;
        bundle::export(
            &self.layout.pkcs12_dir(),
            base,
            &cert,
            key.private_key(),
            password,
        )
    }

    /// Bundle using the password from `user_reqs_data/<name>.txt`
    pub fn export_bundle_for_request(&self, name: &str) -> Result<PathBuf> {
        let base = request::base_name(name);
        let user_file = self
            .layout
            .user_requests_dir()
            .join(format!("{}{}", base, USER_FILE_SUFFIX));
        let user = UserInfo::load(&user_file)?;
        self.export_bundle(base, &user.password)
    }

    // ================= Queries =================

    pub fn root_certificates(&self) -> Result<Vec<RootCertificateRecord>> {
        self.store.lock().ledger().root_certificates()
    }

    pub fn signing_requests(&self) -> Result<Vec<CsrRecord>> {
        self.store.lock().ledger().signing_requests()
    }

    pub fn issuer_certificates(&self) -> Result<Vec<IssuerCertificateRecord>> {
        self.store.lock().ledger().issuer_certificates()
    }

    pub fn find_issuer_certificate(
        &self,
        serial: &SerialNumber,
    ) -> Result<Option<IssuerCertificateRecord>> {
        self.store
            .lock()
            .ledger()
            .find_issuer_certificate(serial.as_str())
    }

    pub fn revocation_list(&self) -> Result<RevocationList> {
        let _guard = self.store.lock();
        RevocationList::load(&self.crl_path())
    }

    /// Compare CRL entries with the ledger's suspended and revoked rows
    pub fn audit(&self) -> Result<AuditReport> {
        let store = self.store.lock();
        let list = RevocationList::load(&self.crl_path())?;
        let records = store.ledger().issuer_certificates()?;

        let listed: HashMap<&str, RevocationReason> = list
            .entries()
            .iter()
            .map(|e| (e.serial.as_str(), e.reason))
            .collect();
        let mut report = AuditReport::default();
        let mut flagged = HashSet::new();

        for record in records.iter().filter(|r| r.status != CertificateStatus::Valid) {
            flagged.insert(record.serial.as_str());
            match listed.get(record.serial.as_str()) {
                None => report.missing_from_crl.push(record.serial.clone()),
                Some(reason) => {
                    let on_hold = *reason == RevocationReason::CertificateHold;
                    if on_hold != (record.status == CertificateStatus::Suspended) {
                        report.reason_mismatch.push(record.serial.clone());
                    }
                }
            }
        }
        for entry in list.entries() {
            if !flagged.contains(entry.serial.as_str()) {
                report.unknown_in_crl.push(entry.serial.to_string());
            }
        }

        if report.is_consistent() {
            debug!(entries = list.entries().len(), "CRL and ledger agree");
        } else {
            warn!(?report, "CRL and ledger disagree");
        }
        Ok(report)
    }

    // ================= Bootstrap =================

    /// Root key, issuer key, root certificate and CRL, each created only if absent
    pub fn bootstrap(&self) -> Result<Bootstrap> {
        let keys = &self.config.keys;
        let root_key = self.generate_or_load_key(KeyRole::Root, &keys.root_key_name)?;
        let issuer_key = self.generate_or_load_key(KeyRole::Issuer, &keys.issuer_key_name)?;

        let root_ca = &self.config.root_ca;
        let subject = SubjectInfo::new(
            root_ca.country.clone(),
            root_ca.organization.clone(),
            root_ca.common_name.clone(),
        );
        let root_cert = self.create_self_signed_certificate(
            &root_ca.cert_name,
            &root_key,
            &subject,
            root_ca.validity_days,
        )?;
        self.initialize_crl(&root_key, &root_cert)?;

        Ok(Bootstrap {
            root_key,
            issuer_key,
            root_certificate: self.root_certificate_path(),
            crl: self.crl_path(),
        })
    }
}

/// `issuer1`, `issuer1.csr.pem` and `issuer1.cert.pem` all map to `issuer1.cert.pem`
fn certificate_file_name(name: &str) -> String {
    let base = request::base_name(name);
    let base = base.strip_suffix(CERT_SUFFIX).unwrap_or(base);
    format!("{}{}", base, CERT_SUFFIX)
}

fn allocate_serial(ledger: Ledger<'_>) -> Result<SerialNumber> {
    serial::allocate(|candidate| ledger.serial_exists(candidate.as_str()))
}

/// Write ledger rows and move a staged artifact into place as one unit
///
/// `previous` holds the bytes the destination had before, restored if the
/// commit fails; without it the new file is removed instead.
fn commit_paired<F>(
    store: &mut MetadataStore,
    staged: StagedArtifact,
    previous: Option<Vec<u8>>,
    record: F,
) -> Result<PathBuf>
where
    F: FnOnce(Ledger<'_>) -> Result<()>,
{
    let tx = store.transaction()?;
    record(tx.ledger())?;
    let path = staged.commit()?;
    if let Err(e) = tx.commit() {
        let undo = match previous {
            Some(bytes) => artifact::write_atomic(&path, &bytes, Visibility::Public).map(|_| ()),
            None => artifact::remove(&path).map(|_| ()),
        };
        if let Err(undo_err) = undo {
            warn!(path = %path.display(), error = %undo_err, "failed to undo artifact after rollback");
        }
        return Err(e);
    }
    Ok(path)
}

/// Delete a row and its artifact as one unit
fn delete_paired<F>(store: &mut MetadataStore, path: &Path, delete_row: F) -> Result<bool>
where
    F: FnOnce(Ledger<'_>) -> Result<bool>,
{
    let previous = match artifact::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };
    let tx = store.transaction()?;
    let row_removed = delete_row(tx.ledger())?;
    let file_removed = artifact::remove(path)?;
    if let Err(e) = tx.commit() {
        if let Some(bytes) = previous {
            if let Err(undo_err) = artifact::write_atomic(path, &bytes, Visibility::Public) {
                warn!(path = %path.display(), error = %undo_err, "failed to restore artifact after rollback");
            }
        }
        return Err(e);
    }
    Ok(row_removed || file_removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority(dir: &Path) -> CertificateAuthority {
        let mut config = AppConfig::with_base_dir(dir);
        config.keys.modulus_bits = 2048;
        config.root_ca.validity_days = 365;
        CertificateAuthority::with_store(config, MetadataStore::open_in_memory().unwrap()).unwrap()
    }

    fn issued(ca: &CertificateAuthority) -> (Bootstrap, Certificate) {
        let boot = ca.bootstrap().unwrap();
        ca.create_signing_request(
            "issuer1",
            &boot.issuer_key,
            &SubjectInfo::new("RU", "TestOrg", "TestIssuer"),
        )
        .unwrap();
        let cert = ca.issue("issuer1").unwrap();
        (boot, cert)
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let first = ca.bootstrap().unwrap();
        let root_pem = std::fs::read(&first.root_certificate).unwrap();
        let crl_pem = std::fs::read(&first.crl).unwrap();

        let second = ca.bootstrap().unwrap();
        assert_eq!(std::fs::read(&second.root_certificate).unwrap(), root_pem);
        assert_eq!(std::fs::read(&second.crl).unwrap(), crl_pem);
        assert_eq!(ca.root_certificates().unwrap().len(), 1);
        assert!(first.root_key.private_key().public_eq(second.root_key.private_key()));
    }

    #[test]
    fn test_csr_rerequest_is_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let boot = ca.bootstrap().unwrap();
        let subject = SubjectInfo::new("RU", "TestOrg", "TestIssuer");

        let first = ca
            .create_signing_request("issuer1", &boot.issuer_key, &subject)
            .unwrap();
        let other = SubjectInfo::new("RU", "TestOrg", "Someone Else");
        let second = ca
            .create_signing_request("issuer1.csr.pem", &boot.issuer_key, &other)
            .unwrap();
        assert_eq!(first.to_pem().unwrap(), second.to_pem().unwrap());
        assert_eq!(ca.signing_requests().unwrap().len(), 1);
    }

    #[test]
    fn test_issue_records_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let (_, cert) = issued(&ca);

        let again = ca.issue("issuer1").unwrap();
        assert_eq!(again.to_pem().unwrap(), cert.to_pem().unwrap());

        let records = ca.issuer_certificates().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cert_name, "issuer1.cert.pem");
        assert_eq!(records[0].serial, cert.serial().unwrap().as_str());
        assert_eq!(records[0].not_before, cert.not_before_text().unwrap());
        assert_eq!(records[0].status, CertificateStatus::Valid);
    }

    #[test]
    fn test_issue_without_csr_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        ca.bootstrap().unwrap();
        assert!(ca.issue("ghost").unwrap_err().is_not_found());
        assert!(ca.issuer_certificates().unwrap().is_empty());
        assert!(!ca.issuer_certificate_path("ghost").exists());
    }

    #[test]
    fn test_suspend_then_revoke_keeps_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let (boot, cert) = issued(&ca);
        let serial = cert.serial().unwrap();

        ca.suspend(&serial, &boot.root_key).unwrap();
        let list = ca.revocation_list().unwrap();
        assert_eq!(
            list.find(&serial).unwrap().reason,
            RevocationReason::CertificateHold
        );
        assert!(ca.audit().unwrap().is_consistent());

        ca.revoke(&cert, &boot.root_key, RevocationReason::Superseded)
            .unwrap();
        let list = ca.revocation_list().unwrap();
        assert_eq!(list.entries().len(), 1);
        assert_eq!(list.find(&serial).unwrap().reason, RevocationReason::Superseded);
        assert!(ca.audit().unwrap().is_consistent());
    }

    #[test]
    fn test_revoked_is_terminal_and_crl_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let (boot, cert) = issued(&ca);
        let serial = cert.serial().unwrap();
        ca.revoke(&cert, &boot.root_key, RevocationReason::KeyCompromise)
            .unwrap();
        let crl_before = std::fs::read(ca.crl_path()).unwrap();

        assert!(ca.suspend(&serial, &boot.root_key).unwrap_err().is_validation());
        assert!(ca
            .revoke(&cert, &boot.root_key, RevocationReason::AccessDenied)
            .unwrap_err()
            .is_validation());
        assert_eq!(std::fs::read(ca.crl_path()).unwrap(), crl_before);
        assert_eq!(
            ca.find_issuer_certificate(&serial).unwrap().unwrap().status,
            CertificateStatus::Revoked
        );
    }

    #[test]
    fn test_revoke_unknown_serial_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let boot = ca.bootstrap().unwrap();
        let serial = SerialNumber::parse("123456789").unwrap();
        let err = ca
            .revoke_serial(&serial, &boot.root_key, RevocationReason::KeyCompromise)
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(ca.revocation_list().unwrap().entries().is_empty());
    }

    #[test]
    fn test_audit_flags_divergence() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let (boot, cert) = issued(&ca);
        let serial = cert.serial().unwrap();

        // CRL changed behind the ledger's back
        crl::revoke(
            &ca.crl_path(),
            &cert,
            boot.root_key.private_key(),
            RevocationReason::KeyCompromise,
            30,
        )
        .unwrap();
        let report = ca.audit().unwrap();
        assert_eq!(report.unknown_in_crl, vec![serial.to_string()]);
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_delete_removes_file_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        issued(&ca);

        assert!(ca.delete_issuer_certificate("issuer1").unwrap());
        assert!(!ca.issuer_certificate_path("issuer1").exists());
        assert!(ca.issuer_certificates().unwrap().is_empty());
        assert!(!ca.delete_issuer_certificate("issuer1").unwrap());

        assert!(ca.delete_signing_request("issuer1").unwrap());
        assert!(!ca.signing_request_path("issuer1").exists());
        assert!(ca.signing_requests().unwrap().is_empty());
    }

    #[test]
    fn test_revoke_with_key_that_did_not_sign_crl() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let (boot, cert) = issued(&ca);
        let crl_before = std::fs::read(ca.crl_path()).unwrap();

        let err = ca
            .revoke(&cert, &boot.issuer_key, RevocationReason::KeyCompromise)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(ca.regenerate_crl(&boot.issuer_key).unwrap_err().is_validation());
        assert_eq!(std::fs::read(ca.crl_path()).unwrap(), crl_before);
        assert_eq!(
            ca.find_issuer_certificate(&cert.serial().unwrap())
                .unwrap()
                .unwrap()
                .status,
            CertificateStatus::Valid
        );

        ca.revoke(&cert, &boot.root_key, RevocationReason::KeyCompromise)
            .unwrap();
        let root = Certificate::load(&ca.root_certificate_path()).unwrap();
        let crl = openssl::x509::X509Crl::from_pem(&std::fs::read(ca.crl_path()).unwrap()).unwrap();
        assert!(crl.verify(&root.public_key().unwrap()).unwrap());
    }

    #[test]
    fn test_issued_csr_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        issued(&ca);

        let err = ca.delete_signing_request("issuer1").unwrap_err();
        assert!(err.is_validation());
        assert!(ca.signing_request_path("issuer1").exists());
        assert_eq!(ca.signing_requests().unwrap().len(), 1);
    }

    #[test]
    fn test_revoked_certificate_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let (boot, cert) = issued(&ca);
        ca.revoke(&cert, &boot.root_key, RevocationReason::KeyCompromise)
            .unwrap();

        let err = ca.delete_issuer_certificate("issuer1").unwrap_err();
        assert!(err.is_validation());
        assert!(ca.issuer_certificate_path("issuer1").exists());
        assert_eq!(ca.issuer_certificates().unwrap().len(), 1);
        assert!(ca.audit().unwrap().is_consistent());
    }

    #[test]
    fn test_export_bundle_from_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        ca.bootstrap().unwrap();

        let user_file = ca.layout().user_requests_dir().join("ivanov.txt");
        std::fs::write(
            &user_file,
            "fio: Ivanov Ivan\ncountryName: RU\norganizationName: TestOrg\npassword: changeit\n",
        )
        .unwrap();
        let csr = ca.create_signing_request_from_file(&user_file).unwrap();
        assert_eq!(csr.subject_line(), "/C=RU/O=TestOrg/CN=Ivanov Ivan");
        ca.issue("ivanov").unwrap();

        let path = ca.export_bundle_for_request("ivanov").unwrap();
        let password = SecretString::from("changeit".to_string());
        let (cert, _) = bundle::open(&path, &password).unwrap();
        assert_eq!(cert.subject_line(), "/C=RU/O=TestOrg/CN=Ivanov Ivan");
    }

    #[test]
    fn test_invalid_root_request_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ca = authority(dir.path());
        let key = ca.generate_or_load_key(KeyRole::Root, "root.key.pem").unwrap();
        let err = ca
            .create_self_signed_certificate(
                "bad.cert.pem",
                &key,
                &SubjectInfo::new("RU", "TestOrg", "TestRoot"),
                0,
            )
            .err()
            .unwrap();
        assert!(err.is_validation());
        assert!(artifact::list_artifacts(&ca.layout().root_certs_dir())
            .unwrap()
            .is_empty());
        assert!(ca.root_certificates().unwrap().is_empty());
    }
}
