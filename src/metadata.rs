//! Metadata Store
//!
//! SQLite ledger of every root certificate, issuing CA signing request and
//! issuing CA certificate. The store never performs cryptography; it records
//! what the issuance engine and the CRL manager produced.
//!
//! # Schema
//! ```text
//! RootCertificates   (id, certName, serial UNIQUE, info, validity)
//! IssuerCSRs         (id, csrName UNIQUE, info)
//! IssuerCertificates (id, certName, serial UNIQUE, certDataFrom, certDataTo,
//!                     info, status, csrName UNIQUE)
//! ```
//!
//! Every statement binds its values; no SQL text is built from input. Inserts
//! and status updates are also available inside a [`LedgerTransaction`] so a
//! caller can pair them with an artifact rename.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::error::{CaError, Result};
use crate::request;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS RootCertificates (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    certName TEXT    NOT NULL,
    serial   TEXT    NOT NULL UNIQUE,
    info     TEXT    NOT NULL,
    validity INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS IssuerCSRs (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    csrName TEXT    NOT NULL UNIQUE,
    info    TEXT    NOT NULL
);
CREATE TABLE IF NOT EXISTS IssuerCertificates (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    certName     TEXT    NOT NULL,
    serial       TEXT    NOT NULL UNIQUE,
    certDataFrom TEXT    NOT NULL,
    certDataTo   TEXT    NOT NULL,
    info         TEXT    NOT NULL,
    status       TEXT    NOT NULL DEFAULT 'valid',
    csrName      TEXT    NOT NULL UNIQUE
);
";

/// Lifecycle status of an issuing CA certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateStatus {
    Valid,
    Suspended,
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CertificateStatus::Valid => "valid",
            CertificateStatus::Suspended => "suspended",
            CertificateStatus::Revoked => "revoked",
        }
    }

    /// `valid -> suspended`, `valid -> revoked`, `suspended -> revoked`
    pub fn can_transition_to(self, next: CertificateStatus) -> bool {
        matches!(
            (self, next),
            (CertificateStatus::Valid, CertificateStatus::Suspended)
                | (CertificateStatus::Valid, CertificateStatus::Revoked)
                | (CertificateStatus::Suspended, CertificateStatus::Revoked)
        )
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateStatus {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "valid" => Ok(CertificateStatus::Valid),
            "suspended" => Ok(CertificateStatus::Suspended),
            "revoked" => Ok(CertificateStatus::Revoked),
            other => Err(CaError::validation(format!(
                "unknown certificate status {:?}",
                other
            ))),
        }
    }
}

impl ToSql for CertificateStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CertificateStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: CaError| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCertificateRecord {
    pub id: i64,
    pub cert_name: String,
    pub serial: String,
    pub info: String,
    pub validity_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrRecord {
    pub id: i64,
    pub csr_name: String,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerCertificateRecord {
    pub id: i64,
    pub cert_name: String,
    pub serial: String,
    pub not_before: String,
    pub not_after: String,
    pub info: String,
    pub status: CertificateStatus,
    pub csr_name: String,
}

/// Fields of a new `IssuerCertificates` row
#[derive(Debug, Clone)]
pub struct NewIssuerCertificate<'a> {
    pub cert_name: &'a str,
    pub serial: &'a str,
    pub not_before: &'a str,
    pub not_after: &'a str,
    pub info: &'a str,
    /// Originating request; must already be recorded in `IssuerCSRs`
    pub csr_name: &'a str,
}

fn require(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CaError::validation(format!("{} must not be empty", label)));
    }
    Ok(())
}

fn db_err(context: &str) -> impl FnOnce(rusqlite::Error) -> CaError + '_ {
    move |e| {
        let constraint = matches!(
            &e,
            rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
        );
        if constraint {
            CaError::validation(format!("{}: {}", context, e))
        } else {
            CaError::database(context, e)
        }
    }
}

fn root_row(row: &Row<'_>) -> rusqlite::Result<RootCertificateRecord> {
    Ok(RootCertificateRecord {
        id: row.get(0)?,
        cert_name: row.get(1)?,
        serial: row.get(2)?,
        info: row.get(3)?,
        validity_days: row.get(4)?,
    })
}

fn csr_row(row: &Row<'_>) -> rusqlite::Result<CsrRecord> {
    Ok(CsrRecord {
        id: row.get(0)?,
        csr_name: row.get(1)?,
        info: row.get(2)?,
    })
}

fn issuer_row(row: &Row<'_>) -> rusqlite::Result<IssuerCertificateRecord> {
    Ok(IssuerCertificateRecord {
        id: row.get(0)?,
        cert_name: row.get(1)?,
        serial: row.get(2)?,
        not_before: row.get(3)?,
        not_after: row.get(4)?,
        info: row.get(5)?,
        status: row.get(6)?,
        csr_name: row.get(7)?,
    })
}

const ISSUER_COLUMNS: &str =
    "id, certName, serial, certDataFrom, certDataTo, info, status, csrName";

/// Ledger operations over a connection or an open transaction
#[derive(Clone, Copy)]
pub struct Ledger<'c> {
    conn: &'c Connection,
}

impl<'c> Ledger<'c> {
    pub fn insert_root_certificate(
        &self,
        name: &str,
        serial: &str,
        info: &str,
        validity_days: i64,
    ) -> Result<i64> {
        require("certificate name", name)?;
        require("serial", serial)?;
        require("info", info)?;
        if validity_days <= 0 {
            return Err(CaError::validation(format!(
                "validity must be a positive number of days, got {}",
                validity_days
            )));
        }
        self.conn
            .execute(
                "INSERT INTO RootCertificates (certName, serial, info, validity) VALUES (?1, ?2, ?3, ?4)",
                params![name, serial, info, validity_days],
            )
            .map_err(db_err("inserting root certificate"))?;
        debug!(name, serial, "root certificate recorded");
        Ok(self.conn.last_insert_rowid())
    }

    /// Record a CSR under its normalized `<name>.csr.pem` name, which is returned
    pub fn insert_csr(&self, name: &str, info: &str) -> Result<String> {
        require("CSR name", name)?;
        require("info", info)?;
        let csr_name = request::normalized_name(name);
        self.conn
            .execute(
                "INSERT INTO IssuerCSRs (csrName, info) VALUES (?1, ?2)",
                params![csr_name, info],
            )
            .map_err(db_err("inserting CSR"))?;
        debug!(csr = %csr_name, "CSR recorded");
        Ok(csr_name)
    }

    /// Record an issued certificate with status `valid`
    ///
    /// # Errors
    /// `Validation` on an empty field, `NotFound` if the originating CSR is
    /// not recorded.
    pub fn insert_issuer_certificate(&self, cert: &NewIssuerCertificate<'_>) -> Result<i64> {
        require("certificate name", cert.cert_name)?;
        require("serial", cert.serial)?;
        require("notBefore", cert.not_before)?;
        require("notAfter", cert.not_after)?;
        require("info", cert.info)?;
        require("CSR name", cert.csr_name)?;

        let csr_name = request::normalized_name(cert.csr_name);
        if self.find_csr(&csr_name)?.is_none() {
            return Err(CaError::not_found(format!(
                "CSR {} is not recorded",
                csr_name
            )));
        }

        self.conn
            .execute(
                "INSERT INTO IssuerCertificates (certName, serial, certDataFrom, certDataTo, info, status, csrName)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    cert.cert_name,
                    cert.serial,
                    cert.not_before,
                    cert.not_after,
                    cert.info,
                    CertificateStatus::Valid,
                    csr_name
                ],
            )
            .map_err(db_err("inserting issuer certificate"))?;
        debug!(name = cert.cert_name, serial = cert.serial, "issuer certificate recorded");
        Ok(self.conn.last_insert_rowid())
    }

    /// Move an issuer certificate to `new_status`, returning the previous status
    ///
    /// # Errors
    /// `NotFound` if no row has `serial`, `Validation` if the transition is
    /// not allowed (`revoked` is terminal).
    pub fn update_certificate_status(
        &self,
        serial: &str,
        new_status: CertificateStatus,
    ) -> Result<CertificateStatus> {
        let current = self
            .find_issuer_certificate(serial)?
            .ok_or_else(|| CaError::not_found(format!("no issuer certificate with serial {}", serial)))?
            .status;
        if !current.can_transition_to(new_status) {
            return Err(CaError::validation(format!(
                "certificate {} cannot move from {} to {}",
                serial, current, new_status
            )));
        }
        let changed = self
            .conn
            .execute(
                "UPDATE IssuerCertificates SET status = ?1 WHERE serial = ?2",
                params![new_status, serial],
            )
            .map_err(db_err("updating certificate status"))?;
        if changed == 0 {
            return Err(CaError::not_found(format!(
                "no issuer certificate with serial {}",
                serial
            )));
        }
        info!(serial, from = %current, to = %new_status, "certificate status changed");
        Ok(current)
    }

    /// Remove a CSR row, returning whether one was deleted
    ///
    /// A CSR that an issuer certificate was signed from stays until that
    /// certificate's row is gone.
    pub fn delete_csr(&self, name: &str) -> Result<bool> {
        let csr_name = request::normalized_name(name);
        let referenced: Option<String> = self
            .conn
            .query_row(
                "SELECT certName FROM IssuerCertificates WHERE csrName = ?1",
                params![csr_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("checking CSR references"))?;
        if let Some(cert_name) = referenced {
            return Err(CaError::validation(format!(
                "{} is still referenced by {}",
                csr_name, cert_name
            )));
        }
        let deleted = self
            .conn
            .execute("DELETE FROM IssuerCSRs WHERE csrName = ?1", params![csr_name])
            .map_err(db_err("deleting CSR"))?;
        Ok(deleted > 0)
    }

    /// Remove an issuer certificate row, returning whether one was deleted
    ///
    /// Only `valid` rows can go: a suspended or revoked row backs a CRL entry.
    pub fn delete_issuer_certificate(&self, name: &str) -> Result<bool> {
        let listed: Option<CertificateStatus> = self
            .conn
            .query_row(
                "SELECT status FROM IssuerCertificates WHERE certName = ?1 AND status != ?2 LIMIT 1",
                params![name, CertificateStatus::Valid],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("checking issuer certificate status"))?;
        if let Some(status) = listed {
            return Err(CaError::validation(format!(
                "{} is {} and listed in the CRL",
                name, status
            )));
        }
        let deleted = self
            .conn
            .execute(
                "DELETE FROM IssuerCertificates WHERE certName = ?1",
                params![name],
            )
            .map_err(db_err("deleting issuer certificate"))?;
        Ok(deleted > 0)
    }

    /// Truncate all tables and reset their id counters
    pub fn clear_all(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "DELETE FROM RootCertificates;
                 DELETE FROM IssuerCSRs;
                 DELETE FROM IssuerCertificates;
                 DELETE FROM sqlite_sequence
                  WHERE name IN ('RootCertificates', 'IssuerCSRs', 'IssuerCertificates');",
            )
            .map_err(db_err("clearing ledger"))?;
        info!("ledger cleared");
        Ok(())
    }

    /// Whether either certificate table already holds `serial`
    pub fn serial_exists(&self, serial: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM RootCertificates WHERE serial = ?1)
                     OR EXISTS(SELECT 1 FROM IssuerCertificates WHERE serial = ?1)",
                params![serial],
                |row| row.get(0),
            )
            .map_err(db_err("checking serial"))
    }

    pub fn root_certificates(&self) -> Result<Vec<RootCertificateRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, certName, serial, info, validity FROM RootCertificates ORDER BY id")
            .map_err(db_err("listing root certificates"))?;
        let rows = stmt
            .query_map([], root_row)
            .map_err(db_err("listing root certificates"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("reading root certificate"))
    }

    pub fn find_root_certificate(&self, name: &str) -> Result<Option<RootCertificateRecord>> {
        self.conn
            .query_row(
                "SELECT id, certName, serial, info, validity FROM RootCertificates
                 WHERE certName = ?1 ORDER BY id LIMIT 1",
                params![name],
                root_row,
            )
            .optional()
            .map_err(db_err("looking up root certificate"))
    }

    pub fn signing_requests(&self) -> Result<Vec<CsrRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, csrName, info FROM IssuerCSRs ORDER BY id")
            .map_err(db_err("listing CSRs"))?;
        let rows = stmt.query_map([], csr_row).map_err(db_err("listing CSRs"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("reading CSR"))
    }

    pub fn find_csr(&self, name: &str) -> Result<Option<CsrRecord>> {
        let csr_name = request::normalized_name(name);
        self.conn
            .query_row(
                "SELECT id, csrName, info FROM IssuerCSRs WHERE csrName = ?1",
                params![csr_name],
                csr_row,
            )
            .optional()
            .map_err(db_err("looking up CSR"))
    }

    pub fn issuer_certificates(&self) -> Result<Vec<IssuerCertificateRecord>> {
        let sql = format!("SELECT {} FROM IssuerCertificates ORDER BY id", ISSUER_COLUMNS);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(db_err("listing issuer certificates"))?;
        let rows = stmt
            .query_map([], issuer_row)
            .map_err(db_err("listing issuer certificates"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("reading issuer certificate"))
    }

    pub fn find_issuer_certificate(&self, serial: &str) -> Result<Option<IssuerCertificateRecord>> {
        let sql = format!(
            "SELECT {} FROM IssuerCertificates WHERE serial = ?1",
            ISSUER_COLUMNS
        );
        self.conn
            .query_row(&sql, params![serial], issuer_row)
            .optional()
            .map_err(db_err("looking up issuer certificate"))
    }

    pub fn find_issuer_certificate_by_name(
        &self,
        name: &str,
    ) -> Result<Option<IssuerCertificateRecord>> {
        let sql = format!(
            "SELECT {} FROM IssuerCertificates WHERE certName = ?1 ORDER BY id LIMIT 1",
            ISSUER_COLUMNS
        );
        self.conn
            .query_row(&sql, params![name], issuer_row)
            .optional()
            .map_err(db_err("looking up issuer certificate"))
    }
}

/// An open ledger transaction; dropping it without [`commit`](Self::commit) rolls back
pub struct LedgerTransaction<'c> {
    tx: Transaction<'c>,
}

impl<'c> LedgerTransaction<'c> {
    pub fn ledger(&self) -> Ledger<'_> {
        Ledger { conn: &self.tx }
    }

    pub fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .map_err(|e| CaError::database("committing ledger transaction", e))
    }
}

/// Owner of the SQLite connection
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Open (creating if needed) the ledger database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                CaError::io(format!("Failed to create directory {}", dir.display()), e)
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| CaError::database(format!("opening {}", path.display()), e))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CaError::database("opening in-memory ledger", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| CaError::database("creating schema", e))?;
        Ok(Self { conn })
    }

    pub fn ledger(&self) -> Ledger<'_> {
        Ledger { conn: &self.conn }
    }

    pub fn transaction(&mut self) -> Result<LedgerTransaction<'_>> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| CaError::database("starting ledger transaction", e))?;
        Ok(LedgerTransaction { tx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer_cert<'a>(serial: &'a str, csr: &'a str) -> NewIssuerCertificate<'a> {
        NewIssuerCertificate {
            cert_name: "issuer1.cert.pem",
            serial,
            not_before: "2026-01-01 00:00:00",
            not_after: "2027-01-01 00:00:00",
            info: "/C=RU/O=TestOrg/CN=TestIssuer",
            csr_name: csr,
        }
    }

    #[test]
    fn test_empty_info_inserts_nothing() {
        let store = MetadataStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        let err = ledger
            .insert_root_certificate("root.cert.pem", "42", "", 365)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(ledger.root_certificates().unwrap().is_empty());

        assert!(ledger
            .insert_root_certificate("root.cert.pem", "42", "/C=RU", 0)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_csr_names_are_normalized() {
        let store = MetadataStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        let name = ledger.insert_csr("issuer1", "/C=RU/O=TestOrg/CN=TestIssuer").unwrap();
        assert_eq!(name, "issuer1.csr.pem");
        assert!(ledger.find_csr("issuer1.csr.pem").unwrap().is_some());
        assert!(ledger.insert_csr("issuer1", "again").unwrap_err().is_validation());
        assert!(ledger.delete_csr("issuer1").unwrap());
        assert!(!ledger.delete_csr("issuer1").unwrap());
    }

    #[test]
    fn test_issuer_certificate_requires_recorded_csr() {
        let store = MetadataStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        let err = ledger
            .insert_issuer_certificate(&issuer_cert("100", "issuer1"))
            .unwrap_err();
        assert!(err.is_not_found());

        ledger.insert_csr("issuer1", "/CN=TestIssuer").unwrap();
        ledger
            .insert_issuer_certificate(&issuer_cert("100", "issuer1"))
            .unwrap();
        let record = ledger.find_issuer_certificate("100").unwrap().unwrap();
        assert_eq!(record.status, CertificateStatus::Valid);
        assert_eq!(record.csr_name, "issuer1.csr.pem");
        assert!(ledger.serial_exists("100").unwrap());
        assert!(!ledger.serial_exists("101").unwrap());
    }

    #[test]
    fn test_status_is_monotonic() {
        let store = MetadataStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        ledger.insert_csr("issuer1", "/CN=TestIssuer").unwrap();
        ledger
            .insert_issuer_certificate(&issuer_cert("7", "issuer1"))
            .unwrap();

        assert_eq!(
            ledger
                .update_certificate_status("7", CertificateStatus::Suspended)
                .unwrap(),
            CertificateStatus::Valid
        );
        ledger
            .update_certificate_status("7", CertificateStatus::Revoked)
            .unwrap();
        for next in [
            CertificateStatus::Valid,
            CertificateStatus::Suspended,
            CertificateStatus::Revoked,
        ] {
            assert!(ledger
                .update_certificate_status("7", next)
                .unwrap_err()
                .is_validation());
        }
        assert_eq!(
            ledger.find_issuer_certificate("7").unwrap().unwrap().status,
            CertificateStatus::Revoked
        );
        assert!(ledger
            .update_certificate_status("8", CertificateStatus::Revoked)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_referenced_csr_cannot_be_deleted() {
        let store = MetadataStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        ledger.insert_csr("issuer1", "/CN=TestIssuer").unwrap();
        ledger
            .insert_issuer_certificate(&issuer_cert("11", "issuer1"))
            .unwrap();

        assert!(ledger.delete_csr("issuer1").unwrap_err().is_validation());
        assert!(ledger.find_csr("issuer1").unwrap().is_some());

        assert!(ledger.delete_issuer_certificate("issuer1.cert.pem").unwrap());
        assert!(ledger.delete_csr("issuer1").unwrap());
    }

    #[test]
    fn test_only_valid_certificates_can_be_deleted() {
        let store = MetadataStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        ledger.insert_csr("issuer1", "/CN=TestIssuer").unwrap();
        ledger
            .insert_issuer_certificate(&issuer_cert("12", "issuer1"))
            .unwrap();
        ledger
            .update_certificate_status("12", CertificateStatus::Suspended)
            .unwrap();

        let err = ledger
            .delete_issuer_certificate("issuer1.cert.pem")
            .unwrap_err();
        assert!(err.is_validation());
        assert!(ledger.find_issuer_certificate("12").unwrap().is_some());
    }

    #[test]
    fn test_status_value_is_bound_not_spliced() {
        let store = MetadataStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        ledger.insert_csr("issuer1", "/CN=TestIssuer").unwrap();
        ledger
            .insert_issuer_certificate(&issuer_cert("9", "issuer1"))
            .unwrap();
        let hostile = "9' OR '1'='1";
        assert!(ledger
            .update_certificate_status(hostile, CertificateStatus::Revoked)
            .unwrap_err()
            .is_not_found());
        assert_eq!(
            ledger.find_issuer_certificate("9").unwrap().unwrap().status,
            CertificateStatus::Valid
        );
    }

    #[test]
    fn test_transaction_rolls_back_on_drop() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let tx = store.transaction().unwrap();
            tx.ledger()
                .insert_root_certificate("root.cert.pem", "1", "/CN=TestRoot", 365)
                .unwrap();
        }
        assert!(store.ledger().root_certificates().unwrap().is_empty());

        let tx = store.transaction().unwrap();
        tx.ledger()
            .insert_root_certificate("root.cert.pem", "1", "/CN=TestRoot", 365)
            .unwrap();
        tx.commit().unwrap();
        assert_eq!(store.ledger().root_certificates().unwrap().len(), 1);
    }

    #[test]
    fn test_clear_all_resets_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(&dir.path().join("ledger.db")).unwrap();
        let ledger = store.ledger();
        ledger
            .insert_root_certificate("root.cert.pem", "1", "/CN=TestRoot", 365)
            .unwrap();
        ledger.insert_csr("issuer1", "/CN=TestIssuer").unwrap();
        ledger.clear_all().unwrap();
        assert!(ledger.signing_requests().unwrap().is_empty());
        let id = ledger
            .insert_root_certificate("root.cert.pem", "2", "/CN=TestRoot", 365)
            .unwrap();
        assert_eq!(id, 1);
    }
}
