//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Catalog serial: the immutable identity of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Serial(String);

/// Marketplace SKU (one of up to three per entry).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

/// Identifier of a marketplace order holding reservations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

/// Arena slot of a registered entry. Never reused within one ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

/// Audit log identity (auto-incrementing).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(u64);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap a raw value without validation. Prefer `str::parse` for user input.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

macro_rules! impl_numeric_newtype {
    ($t:ty, $prefix:literal) => {
        impl $t {
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }

            /// The identifier directly after this one.
            pub const fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

impl_string_newtype!(Serial, "Serial");
impl_string_newtype!(Sku, "Sku");
impl_string_newtype!(OrderId, "OrderId");
impl_numeric_newtype!(EntryId, "entry:");
impl_numeric_newtype!(LogId, "#");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_parse_trims_and_rejects_empty() {
        let serial: Serial = "  BOLT-M4 ".parse().unwrap();
        assert_eq!(serial.as_str(), "BOLT-M4");

        let err = "   ".parse::<Serial>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn log_id_displays_with_hash_prefix() {
        assert_eq!(LogId::from_raw(42).to_string(), "#42");
        assert_eq!(LogId::from_raw(42).next(), LogId::from_raw(43));
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let sku = Sku::new("AMZ-1");
        assert_eq!(serde_json::to_string(&sku).unwrap(), "\"AMZ-1\"");
    }
}
