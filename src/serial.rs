//! Certificate serial numbers
//!
//! Serials are 128-bit values drawn from OpenSSL's CSPRNG. A candidate is only
//! accepted once the caller confirms it is not already recorded; a collision
//! is retried a bounded number of times.

use std::fmt;

use openssl::asn1::{Asn1Integer, Asn1IntegerRef};
use openssl::bn::{BigNum, MsbOption};
use tracing::warn;

use crate::error::{CaError, Result};

const SERIAL_BITS: i32 = 128;
const MAX_ATTEMPTS: usize = 8;

/// Serial number in decimal form, as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerialNumber(String);

impl SerialNumber {
    pub fn from_asn1(serial: &Asn1IntegerRef) -> Result<Self> {
        let bn = serial
            .to_bn()
            .map_err(|e| CaError::crypto("Failed to read serial number", e))?;
        Self::from_bn(&bn)
    }

    fn from_bn(bn: &BigNum) -> Result<Self> {
        let dec = bn
            .to_dec_str()
            .map_err(|e| CaError::crypto("Failed to format serial number", e))?;
        Ok(SerialNumber(dec.to_string()))
    }

    /// Parse a decimal serial; rejects anything that is not a positive integer
    pub fn parse(decimal: &str) -> Result<Self> {
        let trimmed = decimal.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CaError::validation(format!(
                "serial {:?} is not a decimal number",
                decimal
            )));
        }
        let bn = BigNum::from_dec_str(trimmed)
            .map_err(|e| CaError::crypto("Failed to parse serial number", e))?;
        if bn.num_bits() == 0 {
            return Err(CaError::validation("serial number must be positive"));
        }
        Self::from_bn(&bn)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_asn1_integer(&self) -> Result<Asn1Integer> {
        BigNum::from_dec_str(&self.0)
            .and_then(|bn| bn.to_asn1_integer())
            .map_err(|e| CaError::crypto("Failed to encode serial number", e))
    }

    /// Big-endian magnitude bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        BigNum::from_dec_str(&self.0)
            .map(|bn| bn.to_vec())
            .map_err(|e| CaError::crypto("Failed to encode serial number", e))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Draw a fresh serial that `is_taken` reports as unused
pub fn allocate<F>(mut is_taken: F) -> Result<SerialNumber>
where
    F: FnMut(&SerialNumber) -> Result<bool>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let mut bn = BigNum::new().map_err(|e| CaError::crypto("Failed to allocate serial", e))?;
        bn.rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)
            .map_err(|e| CaError::crypto("Failed to generate random serial", e))?;
        if bn.num_bits() == 0 {
            continue;
        }
        let candidate = SerialNumber::from_bn(&bn)?;
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
        warn!(attempt, serial = %candidate, "serial collision, drawing again");
    }
    Err(CaError::crypto(
        "Failed to allocate a unique serial number",
        format!("{} consecutive candidates were already in use", MAX_ATTEMPTS),
    ))
}
