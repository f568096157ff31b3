//! Permission model: owner/group/other × read/write/execute.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Who a permission bit applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AccessClass {
    #[strum(serialize = "owner", serialize = "u")]
    Owner,
    #[strum(serialize = "group", serialize = "g")]
    Group,
    #[strum(serialize = "other", serialize = "o")]
    Other,
}

impl AccessClass {
    const fn shift(self) -> u16 {
        match self {
            AccessClass::Owner => 6,
            AccessClass::Group => 3,
            AccessClass::Other => 0,
        }
    }
}

/// What a permission bit grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Right {
    #[strum(serialize = "read", serialize = "r")]
    Read,
    #[strum(serialize = "write", serialize = "w")]
    Write,
    #[strum(serialize = "execute", serialize = "x")]
    Execute,
}

impl Right {
    const fn mask(self) -> u16 {
        match self {
            Right::Read => 0o4,
            Right::Write => 0o2,
            Right::Execute => 0o1,
        }
    }

    fn symbol(self) -> char {
        match self {
            Right::Read => 'r',
            Right::Write => 'w',
            Right::Execute => 'x',
        }
    }
}

/// The nine classic permission bits, as in a POSIX mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionBits(u16);

impl PermissionBits {
    pub const EMPTY: PermissionBits = PermissionBits(0);
    pub const FULL: PermissionBits = PermissionBits(0o777);

    /// Bits beyond the lower nine are dropped.
    pub const fn new(value: u16) -> Self {
        Self(value & 0o777)
    }

    /// Extract the permission bits from a full native mode (file type bits,
    /// setuid and friends are discarded).
    pub const fn from_mode(mode: u32) -> Self {
        Self((mode & 0o777) as u16)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    const fn flag(class: AccessClass, right: Right) -> u16 {
        right.mask() << class.shift()
    }

    pub const fn bit(self, class: AccessClass, right: Right) -> bool {
        self.0 & Self::flag(class, right) != 0
    }

    #[must_use]
    pub const fn with_bit(self, class: AccessClass, right: Right, enabled: bool) -> Self {
        let flag = Self::flag(class, right);
        if enabled {
            Self(self.0 | flag)
        } else {
            Self(self.0 & !flag)
        }
    }

    #[must_use]
    pub const fn intersect(self, other: PermissionBits) -> Self {
        Self(self.0 & other.0)
    }
}

impl From<u16> for PermissionBits {
    fn from(value: u16) -> Self {
        Self::new(value)
    }
}

/// Renders as `rwxr-x---`.
impl fmt::Display for PermissionBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use strum::IntoEnumIterator;

        for class in AccessClass::iter() {
            for right in Right::iter() {
                let c = if self.bit(class, right) { right.symbol() } else { '-' };
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Permission bits as reported by a backend.
///
/// `mask` marks the bits that carry real information. A bit outside the mask
/// is not supported by the backend and always reads as `false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilePermissions {
    bits: PermissionBits,
    mask: PermissionBits,
}

impl FilePermissions {
    /// `rw-r--r--`
    pub const DEFAULT_FILE: FilePermissions = FilePermissions::full(PermissionBits::new(0o644));
    /// `rwxr-xr-x`
    pub const DEFAULT_DIRECTORY: FilePermissions = FilePermissions::full(PermissionBits::new(0o755));
    /// `rwxr-xr-x`
    pub const DEFAULT_EXECUTABLE: FilePermissions = FilePermissions::full(PermissionBits::new(0o755));
    /// Nothing known.
    pub const UNKNOWN: FilePermissions = FilePermissions::new(PermissionBits::EMPTY, PermissionBits::EMPTY);

    pub const fn new(bits: PermissionBits, mask: PermissionBits) -> Self {
        Self {
            bits: bits.intersect(mask),
            mask,
        }
    }

    /// Every bit is meaningful.
    pub const fn full(bits: PermissionBits) -> Self {
        Self::new(bits, PermissionBits::FULL)
    }

    pub const fn bits(self) -> PermissionBits {
        self.bits
    }

    pub const fn mask(self) -> PermissionBits {
        self.mask
    }

    pub const fn bit(self, class: AccessClass, right: Right) -> bool {
        self.bits.bit(class, right)
    }

    pub const fn is_supported(self, class: AccessClass, right: Right) -> bool {
        self.mask.bit(class, right)
    }
}

impl fmt::Display for FilePermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bits.fmt(f)
    }
}
