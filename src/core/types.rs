//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch
pub type Timestamp = i64;

/// Identifier of a faction (tribe)
///
/// Engine team ids are effectively 32-bit and may arrive sign-extended or
/// negative depending on where they were read. Every id entering the crate is
/// canonicalized to the unsigned 32-bit range; `0` means "no faction".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub u32);

impl FactionId {
    pub const NONE: FactionId = FactionId(0);

    /// Canonicalize a raw engine id (truncate to 32 bits, reinterpret unsigned)
    pub fn from_raw(raw: i64) -> Self {
        Self(raw as i32 as u32)
    }

    /// Canonicalize and drop the "no faction" value
    pub fn resolve(raw: i64) -> Option<Self> {
        let id = Self::from_raw(raw);
        (!id.is_none()).then_some(id)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a war record, assigned monotonically from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarId(pub u64);

impl fmt::Display for WarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable key of a player as seen by the host (e.g. a platform account id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render a duration as `Hh Mm Ss`
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}h {}m {}s", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_negative_id() {
        assert_eq!(FactionId::from_raw(-1), FactionId(u32::MAX));
        assert_eq!(FactionId::from_raw(-2_000_000_000), FactionId(2_294_967_296));
    }

    #[test]
    fn test_canonical_wide_id() {
        // Upper bits are discarded
        assert_eq!(FactionId::from_raw(0x1_0000_0005), FactionId(5));
        assert_eq!(FactionId::resolve(0x1_0000_0000), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(43200), "12h 0m 0s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
        assert_eq!(format_duration(-5), "0h 0m 0s");
    }

    proptest! {
        #[test]
        fn canonicalization_is_idempotent(raw in any::<i64>()) {
            let once = FactionId::from_raw(raw);
            let twice = FactionId::from_raw(once.0 as i64);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn u32_ids_survive_canonicalization(id in any::<u32>()) {
            prop_assert_eq!(FactionId::from_raw(id as i64), FactionId(id));
        }
    }
}
