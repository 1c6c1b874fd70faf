//! Program addressing

use serde::{Deserialize, Serialize};

/// First address available to user-authored programs.
///
/// Addresses below this value are reserved for packaged system programs.
pub const USER_SPACE_BASE: u32 = 1000;

/// Integer identity of a program, stable for the lifetime of its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramAddress(u32);

impl ProgramAddress {
    /// Create an address from its raw value
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw address value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this address lies in the user program space
    pub const fn is_user_space(self) -> bool {
        self.0 >= USER_SPACE_BASE
    }
}

impl From<u32> for ProgramAddress {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ProgramAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_space() {
        assert!(!ProgramAddress::new(1).is_user_space());
        assert!(!ProgramAddress::new(999).is_user_space());
        assert!(ProgramAddress::new(USER_SPACE_BASE).is_user_space());
        assert!(ProgramAddress::new(4242).is_user_space());
    }

    #[test]
    fn test_ordering() {
        assert!(ProgramAddress::new(1000) < ProgramAddress::new(1001));
    }

    #[test]
    fn test_serde_transparent() {
        let addr = ProgramAddress::new(1005);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "1005");
        let parsed: ProgramAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, addr);
    }
}
