//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Highest number of shadow namespaces a process may host.
///
/// glibc supports 16 link-map lists, one of which is the base namespace.
pub const MAX_NAMESPACES: usize = 15;

/// The dynamic linker's link-map list id (`Lmid_t`)
pub type Lmid = std::ffi::c_long;

/// Shadow namespace identifier
///
/// `0` is the base namespace hosting the main program. Every other value
/// names an isolation group and lies in `[1, MAX_NAMESPACES]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "u8", into = "u8")]
pub struct NamespaceId(u8);

impl NamespaceId {
    /// The base (default) namespace
    pub const BASE: Self = Self(0);

    /// Create a shadow namespace id with validation
    ///
    /// # Errors
    /// Returns error if `raw` is the base id or exceeds [`MAX_NAMESPACES`]
    pub fn shadow(raw: i64) -> Result<Self> {
        match u8::try_from(raw) {
            Ok(id) if id != 0 && usize::from(id) <= MAX_NAMESPACES => Ok(Self(id)),
            _ => Err(Error::InvalidNamespace { id: raw }),
        }
    }

    /// Create from a raw value without range checks
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Get raw id value
    #[must_use]
    pub const fn as_raw(self) -> u8 {
        self.0
    }

    /// Convert to the dynamic linker's `Lmid_t`
    #[must_use]
    pub const fn as_lmid(self) -> Lmid {
        self.0 as Lmid
    }

    /// Check whether this is the base namespace
    #[must_use]
    pub const fn is_base(self) -> bool {
        self.0 == 0
    }

    /// Zero-based slot for per-namespace tables, `None` for the base namespace
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self.0 {
            0 => None,
            id => Some(id as usize - 1),
        }
    }
}

impl Default for NamespaceId {
    fn default() -> Self {
        Self::BASE
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NamespaceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw: i64 = s.trim().parse().map_err(|_| Error::InvalidConfig {
            message: format!("Namespace id must be numeric, got {s:?}"),
        })?;
        if raw == 0 {
            return Ok(Self::BASE);
        }
        Self::shadow(raw)
    }
}

impl TryFrom<u8> for NamespaceId {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        if raw == 0 {
            Ok(Self::BASE)
        } else {
            Self::shadow(i64::from(raw))
        }
    }
}

impl From<NamespaceId> for u8 {
    fn from(id: NamespaceId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_validation() {
        assert!(NamespaceId::shadow(1).is_ok());
        assert!(NamespaceId::shadow(MAX_NAMESPACES as i64).is_ok());
        assert!(NamespaceId::shadow(0).is_err());
        assert!(NamespaceId::shadow(-1).is_err());
        assert!(NamespaceId::shadow(MAX_NAMESPACES as i64 + 1).is_err());
        assert!(NamespaceId::shadow(300).is_err());
    }

    #[test]
    fn test_base_namespace() {
        assert!(NamespaceId::BASE.is_base());
        assert_eq!(NamespaceId::default(), NamespaceId::BASE);
        assert_eq!(NamespaceId::BASE.index(), None);
        assert_eq!(NamespaceId::BASE.as_lmid(), 0);
    }

    #[test]
    fn test_index_is_offset_by_one() {
        let id = NamespaceId::shadow(3).unwrap();
        assert_eq!(id.index(), Some(2));
        assert_eq!(id.as_lmid(), 3);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("0".parse::<NamespaceId>().unwrap(), NamespaceId::BASE);
        assert_eq!(" 4 ".parse::<NamespaceId>().unwrap().as_raw(), 4);
        assert!("abc".parse::<NamespaceId>().is_err());
        assert!("16".parse::<NamespaceId>().is_err());
    }

    #[test]
    fn test_namespace_id_serde() {
        let id = NamespaceId::shadow(2).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "2");
        let deserialized: NamespaceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
        assert!(serde_json::from_str::<NamespaceId>("99").is_err());
    }
}
