//! ISD-AS identifiers.
//!
//! An [`IA`] names an AS inside an isolation domain. The text form is
//! `<isd>-<as>`, where the AS number is written in decimal when it fits the
//! BGP range and as three colon-separated 16-bit hex groups otherwise,
//! e.g. `1-ff00:0:110`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest AS number that is written in decimal notation.
pub const MAX_BGP_AS: u64 = (1 << 32) - 1;

/// Largest representable AS number (48 bits).
pub const MAX_AS: u64 = (1 << 48) - 1;

const AS_PART_BITS: u32 = 16;
const AS_PARTS: usize = 3;

/// Isolation domain number.
pub type Isd = u16;

/// Errors returned when parsing identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IaError {
    #[error("empty identifier")]
    Empty,

    #[error("invalid ISD-AS {0:?}: expected <isd>-<as>")]
    MissingSeparator(String),

    #[error("invalid ISD {0:?}")]
    InvalidIsd(String),

    #[error("invalid AS {0:?}")]
    InvalidAs(String),

    #[error("AS number {0} out of range")]
    AsOutOfRange(u64),
}

/// An AS number. Only the lower 48 bits are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Asn(u64);

impl Asn {
    /// Creates an AS number, rejecting values that need more than 48 bits.
    pub fn new(value: u64) -> Result<Self, IaError> {
        if value > MAX_AS {
            return Err(IaError::AsOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_wildcard(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for Asn {
    type Err = IaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IaError::InvalidAs(s.to_string()));
        }
        if !s.contains(':') {
            let value: u64 = s.parse().map_err(|_| IaError::InvalidAs(s.to_string()))?;
            if value > MAX_BGP_AS {
                return Err(IaError::AsOutOfRange(value));
            }
            return Ok(Self(value));
        }
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != AS_PARTS {
            return Err(IaError::InvalidAs(s.to_string()));
        }
        let mut value = 0u64;
        for part in parts {
            if part.is_empty() || part.len() > 4 {
                return Err(IaError::InvalidAs(s.to_string()));
            }
            let group =
                u16::from_str_radix(part, 16).map_err(|_| IaError::InvalidAs(s.to_string()))?;
            value = (value << AS_PART_BITS) | u64::from(group);
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= MAX_BGP_AS {
            return write!(f, "{}", self.0);
        }
        let mask = (1u64 << AS_PART_BITS) - 1;
        write!(
            f,
            "{:x}:{:x}:{:x}",
            (self.0 >> (2 * AS_PART_BITS)) & mask,
            (self.0 >> AS_PART_BITS) & mask,
            self.0 & mask
        )
    }
}

/// An ISD-AS pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct IA {
    isd: Isd,
    asn: Asn,
}

impl IA {
    pub fn new(isd: Isd, asn: Asn) -> Self {
        Self { isd, asn }
    }

    pub fn isd(&self) -> Isd {
        self.isd
    }

    pub fn asn(&self) -> Asn {
        self.asn
    }

    /// Reports whether either component is the zero wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.isd == 0 || self.asn.is_wildcard()
    }

    /// Reports whether both identifiers belong to the same ISD.
    pub fn same_isd(&self, other: &IA) -> bool {
        self.isd == other.isd
    }
}

impl FromStr for IA {
    type Err = IaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IaError::Empty);
        }
        let (isd, asn) = s
            .split_once('-')
            .ok_or_else(|| IaError::MissingSeparator(s.to_string()))?;
        let isd: Isd = isd.parse().map_err(|_| IaError::InvalidIsd(isd.to_string()))?;
        Ok(Self {
            isd,
            asn: asn.parse()?,
        })
    }
}

impl fmt::Display for IA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.isd, self.asn)
    }
}

impl Serialize for IA {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IA {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
