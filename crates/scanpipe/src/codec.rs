//! Numeric codec for the job record store.
//!
//! The record store has no binary floating-point column type that preserves
//! values faithfully, so every numeric leaf in a job record is persisted as
//! an exact decimal string and decoded back to a native float on read.
//! Rust's shortest round-trip formatting of `f64` makes the encoding exact:
//! `decode(encode(x)) == x` for every finite `x`.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// An exact decimal rendering of a number, as stored in a job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal(String);

impl Decimal {
    /// Encodes a native float. Non-finite values have no decimal rendering
    /// and are rejected rather than stored.
    pub fn encode(value: f64) -> Result<Self, CodecError> {
        if !value.is_finite() {
            return Err(CodecError::NonFinite(value));
        }
        Ok(Self(format!("{}", value)))
    }

    /// Encodes an integer leaf (e.g. the classifier flag).
    pub fn encode_int(value: i64) -> Self {
        Self(value.to_string())
    }

    /// Wraps a rendering read back from the store. Validation happens at
    /// decode time.
    pub fn from_stored(raw: &str) -> Self {
        Self(raw.to_string())
    }

    /// Decodes back to a native float.
    pub fn decode(&self) -> Result<f64, CodecError> {
        let parsed: f64 = self
            .0
            .parse()
            .map_err(|_| CodecError::InvalidDecimal(self.0.clone()))?;
        if !parsed.is_finite() {
            return Err(CodecError::InvalidDecimal(self.0.clone()));
        }
        Ok(parsed)
    }

    /// Decodes an integer leaf. Tolerates a fractional rendering of a whole
    /// number (`"1.0"` decodes to `1`).
    pub fn decode_int(&self) -> Result<i64, CodecError> {
        if let Ok(v) = self.0.parse::<i64>() {
            return Ok(v);
        }
        let as_float = self.decode()?;
        if as_float.fract() != 0.0 {
            return Err(CodecError::InvalidDecimal(self.0.clone()));
        }
        Ok(as_float as i64)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Decimal> for String {
    fn from(value: Decimal) -> Self {
        value.0
    }
}
