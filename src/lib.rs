//! PKI Lifecycle - Two-Tier Certificate Authority Engine
//!
//! Issues, tracks, suspends and revokes X.509 certificates across a root
//! authority and a subordinate issuing authority, and keeps a signed
//! revocation list in step with an SQLite ledger of everything issued.
//!
//! # Overview
//!
//! ```text
//! Root CA (self-signed, pathlen=1)
//!   └── Issuing CA (cross-signed from a CSR, pathlen=0, root's validity window)
//! ```
//!
//! Artifacts live under one base directory:
//!
//! ```text
//! CA/
//! ├── root-ca/private/      root key (one file)
//! ├── root-ca/certs/        root certificate
//! ├── issuing-ca/private/   issuer key (one file)
//! ├── issuing-ca/csr/       <name>.csr.pem
//! ├── issuing-ca/certs/     <name>.cert.pem
//! ├── issuing-ca/crl/       issuer.crl.pem
//! ├── pkcs12/               <name>.p12
//! ├── user_reqs_data/       <name>.txt requester files
//! └── ledger.db
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use pki_lifecycle::authority::CertificateAuthority;
//! use pki_lifecycle::configs::AppConfig;
//! use pki_lifecycle::crl::RevocationReason;
//! use pki_lifecycle::subject::SubjectInfo;
//!
//! fn main() -> pki_lifecycle::error::Result<()> {
//!     let ca = CertificateAuthority::open(AppConfig::with_base_dir("CA"))?;
//!     let boot = ca.bootstrap()?;
//!
//!     ca.create_signing_request(
//!         "issuer1",
//!         &boot.issuer_key,
//!         &SubjectInfo::new("RU", "TestOrg", "TestIssuer"),
//!     )?;
//!     let cert = ca.issue("issuer1")?;
//!
//!     ca.revoke(&cert, &boot.root_key, RevocationReason::KeyCompromise)?;
//!     assert!(ca.audit()?.is_consistent());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`key_store`]: single-slot RSA keys per role, explicit rotate
//! - [`request`]: PKCS#10 signing requests
//! - [`issuance`]: self-signed root and cross-signed issuer certificates
//! - [`serial`]: CSPRNG serials checked against the ledger
//! - [`crl`]: reason codes, CRL model, signing and regeneration
//! - [`metadata`]: SQLite ledger with monotonic status transitions
//! - [`authority`]: atomic issue/revoke/suspend over files and ledger
//! - [`bundle`]: PKCS#12 export
//! - [`user_file`], [`dump`]: requester files and human-readable dumps
//!
//! # Error Handling
//!
//! Every fallible operation returns [`error::Result`]. Validation and
//! not-found failures are reported to the caller as-is; re-requesting an
//! artifact that already exists by name returns the existing artifact.

pub mod artifact;
pub mod authority;
pub mod bundle;
pub mod configs;
pub mod crl;
pub mod dump;
pub mod error;
pub mod issuance;
pub mod key_store;
pub mod metadata;
pub mod request;
pub mod serial;
pub mod subject;
pub mod user_file;
