use std::collections::HashSet;
use std::path::Path;

use pki_lifecycle::authority::CertificateAuthority;
use pki_lifecycle::configs::AppConfig;
use pki_lifecycle::crl::{RevocationList, RevocationReason};
use pki_lifecycle::key_store::KeyRole;
use pki_lifecycle::metadata::{CertificateStatus, MetadataStore};
use pki_lifecycle::subject::SubjectInfo;

fn open(dir: &Path, modulus_bits: u32) -> CertificateAuthority {
    let mut config = AppConfig::with_base_dir(dir);
    config.keys.modulus_bits = modulus_bits;
    CertificateAuthority::open(config).unwrap()
}

#[test]
fn test_root_issue_revoke_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let ca = open(dir.path(), 4096);

    let root_key = ca
        .generate_or_load_key(KeyRole::Root, "root.key.pem")
        .unwrap();
    assert_eq!(root_key.bits(), 4096);
    let root = ca
        .create_self_signed_certificate(
            "root.cert.pem",
            &root_key,
            &SubjectInfo::new("RU", "TestOrg", "TestRoot"),
            365,
        )
        .unwrap();
    assert_eq!(root.subject_line(), "/C=RU/O=TestOrg/CN=TestRoot");
    ca.initialize_crl(&root_key, &root).unwrap();

    let issuer_key = ca
        .generate_or_load_key(KeyRole::Issuer, "issuer.key.pem")
        .unwrap();
    ca.create_signing_request(
        "issuer1",
        &issuer_key,
        &SubjectInfo::new("RU", "TestOrg", "TestIssuer"),
    )
    .unwrap();
    let cert = ca
        .create_cross_signed_certificate("issuer1", &root, &root_key)
        .unwrap();

    assert!(ca.issuer_certificate_path("issuer1").ends_with("issuer1.cert.pem"));
    assert!(ca.issuer_certificate_path("issuer1").exists());
    assert_eq!(cert.not_before_text().unwrap(), root.not_before_text().unwrap());
    assert_eq!(cert.not_after_text().unwrap(), root.not_after_text().unwrap());
    assert!(cert.verify_signed_by(&root).unwrap());

    let reason = RevocationReason::from_code(0).unwrap();
    assert_eq!(reason, RevocationReason::KeyCompromise);
    ca.revoke(&cert, &root_key, reason).unwrap();

    let serial = cert.serial().unwrap();
    let crl = RevocationList::load(&ca.crl_path()).unwrap();
    let matching: Vec<_> = crl
        .entries()
        .iter()
        .filter(|e| e.serial == serial)
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].reason, RevocationReason::KeyCompromise);

    let record = ca.find_issuer_certificate(&serial).unwrap().unwrap();
    assert_eq!(record.status, CertificateStatus::Revoked);
    assert!(ca.audit().unwrap().is_consistent());
}

#[test]
fn test_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let serial = {
        let ca = open(dir.path(), 2048);
        let boot = ca.bootstrap().unwrap();
        ca.create_signing_request(
            "issuer1",
            &boot.issuer_key,
            &SubjectInfo::new("RU", "TestOrg", "TestIssuer"),
        )
        .unwrap();
        let cert = ca.issue("issuer1").unwrap();
        ca.suspend(&cert.serial().unwrap(), &boot.root_key).unwrap();
        cert.serial().unwrap()
    };

    let ca = open(dir.path(), 2048);
    ca.bootstrap().unwrap();
    assert_eq!(ca.root_certificates().unwrap().len(), 1);
    let record = ca.find_issuer_certificate(&serial).unwrap().unwrap();
    assert_eq!(record.status, CertificateStatus::Suspended);
    assert!(ca.audit().unwrap().is_consistent());
}

#[test]
fn test_issued_serials_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::with_base_dir(dir.path());
    config.keys.modulus_bits = 2048;
    let ca =
        CertificateAuthority::with_store(config, MetadataStore::open_in_memory().unwrap()).unwrap();
    let boot = ca.bootstrap().unwrap();

    let mut seen = HashSet::new();
    for i in 0..20 {
        let name = format!("issuer{}", i);
        ca.create_signing_request(
            &name,
            &boot.issuer_key,
            &SubjectInfo::new("RU", "TestOrg", name.as_str()),
        )
        .unwrap();
        let cert = ca.issue(&name).unwrap();
        assert!(seen.insert(cert.serial().unwrap()), "serial collision");
    }
    assert_eq!(ca.issuer_certificates().unwrap().len(), 20);
}
