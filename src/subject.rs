//! Subject attributes shared by CSRs, certificates and the ledger
//!
//! The two-tier CA uses a fixed three-attribute subject:
//! country (C), organization (O) and common name (CN).

use openssl::nid::Nid;
use openssl::x509::{X509Name, X509NameRef};

use crate::error::{CaError, Result};

/// Distinguished name attributes for a certificate or signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectInfo {
    pub country: String,
    pub organization: String,
    pub common_name: String,
}

impl SubjectInfo {
    pub fn new(
        country: impl Into<String>,
        organization: impl Into<String>,
        common_name: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            organization: organization.into(),
            common_name: common_name.into(),
        }
    }

    /// Reject any empty attribute
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("countryName", &self.country),
            ("organizationName", &self.organization),
            ("commonName", &self.common_name),
        ];
        for (label, value) in fields.iter() {
            if value.trim().is_empty() {
                return Err(CaError::validation(format!(
                    "subject field {} must not be empty",
                    label
                )));
            }
        }
        Ok(())
    }

    /// Build the X.509 name in C, O, CN order
    pub fn to_x509_name(&self) -> Result<X509Name> {
        self.validate()?;
        let mut name_builder = X509Name::builder()
            .map_err(|e| CaError::crypto("Failed to create name builder", e))?;
        name_builder
            .append_entry_by_nid(Nid::COUNTRYNAME, &self.country)
            .map_err(|e| CaError::crypto("Failed to set country", e))?;
        name_builder
            .append_entry_by_nid(Nid::ORGANIZATIONNAME, &self.organization)
            .map_err(|e| CaError::crypto("Failed to set organization", e))?;
        name_builder
            .append_entry_by_nid(Nid::COMMONNAME, &self.common_name)
            .map_err(|e| CaError::crypto("Failed to set CN", e))?;
        Ok(name_builder.build())
    }

    /// Read C, O and CN back out of an X.509 name
    pub fn from_x509_name(name: &X509NameRef) -> Result<Self> {
        let subject = Self {
            country: entry_text(name, Nid::COUNTRYNAME)?,
            organization: entry_text(name, Nid::ORGANIZATIONNAME)?,
            common_name: entry_text(name, Nid::COMMONNAME)?,
        };
        Ok(subject)
    }
}

fn entry_text(name: &X509NameRef, nid: Nid) -> Result<String> {
    let entry = name.entries_by_nid(nid).next().ok_or_else(|| {
        CaError::not_found(format!(
            "subject attribute {} is missing",
            nid.short_name().unwrap_or("?")
        ))
    })?;
    let text = std::str::from_utf8(entry.data().as_slice())
        .map_err(|e| CaError::crypto("Failed to decode subject attribute", e))?;
    Ok(text.to_string())
}

/// Render a name in OpenSSL one-line form, e.g. `/C=RU/O=TestOrg/CN=TestRoot`
pub fn one_line(name: &X509NameRef) -> String {
    let mut out = String::new();
    for entry in name.entries() {
        let key = entry.object().nid().short_name().unwrap_or("UNDEF");
        let value = String::from_utf8_lossy(entry.data().as_slice());
        out.push('/');
        out.push_str(key);
        out.push('=');
        out.push_str(&value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_order() {
        let subject = SubjectInfo::new("RU", "TestOrg", "TestRoot");
        let name = subject.to_x509_name().unwrap();
        assert_eq!(one_line(&name), "/C=RU/O=TestOrg/CN=TestRoot");
    }

    #[test]
    fn test_name_round_trip_keeps_attributes() {
        let subject = SubjectInfo::new("RU", "TestOrg", "TestIssuer");
        let name = subject.to_x509_name().unwrap();
        assert_eq!(SubjectInfo::from_x509_name(&name).unwrap(), subject);
    }

    #[test]
    fn test_empty_field_is_validation_error() {
        let subject = SubjectInfo::new("RU", "  ", "TestRoot");
        let err = subject.to_x509_name().err().unwrap();
        assert!(err.is_validation());
        assert!(err.to_string().contains("organizationName"));
    }
}
