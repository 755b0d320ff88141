//! Serial versions and the per-client version negotiator.
//!
//! A client starts at the highest serial version it speaks. When the service
//! rejects that version, the negotiator steps down one version at a time and
//! never climbs back up for the lifetime of the client instance.

use crate::error::WireError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI16, Ordering};

/// Wire protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum SerialVersion {
    V2 = 2,
    V3 = 3,
}

impl SerialVersion {
    /// Lowest version this client can speak.
    pub const MIN: SerialVersion = SerialVersion::V2;
    /// Highest version this client can speak; the starting point.
    pub const MAX: SerialVersion = SerialVersion::V3;

    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// Returns the next lower supported version, or `None` at the floor.
    pub fn lower(self) -> Option<SerialVersion> {
        match self {
            SerialVersion::V3 => Some(SerialVersion::V2),
            SerialVersion::V2 => None,
        }
    }
}

impl TryFrom<i16> for SerialVersion {
    type Error = WireError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(SerialVersion::V2),
            3 => Ok(SerialVersion::V3),
            other => Err(WireError::Malformed(format!(
                "unsupported serial version: {}",
                other
            ))),
        }
    }
}

impl From<SerialVersion> for i16 {
    fn from(version: SerialVersion) -> Self {
        version.as_i16()
    }
}

impl fmt::Display for SerialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.as_i16())
    }
}

/// Tracks the serial version in use by one client instance.
///
/// Shared by every in-flight request of that client. Reads are lock-free and
/// downgrades are a single compare-and-swap, so concurrent callers that saw
/// the same version cause exactly one transition.
#[derive(Debug)]
pub struct VersionNegotiator {
    current: AtomicI16,
}

impl VersionNegotiator {
    /// Creates a negotiator starting at [`SerialVersion::MAX`].
    pub fn new() -> Self {
        Self::starting_at(SerialVersion::MAX)
    }

    /// Creates a negotiator starting at the given version.
    pub fn starting_at(version: SerialVersion) -> Self {
        Self {
            current: AtomicI16::new(version.as_i16()),
        }
    }

    /// Returns the active serial version.
    pub fn current(&self) -> SerialVersion {
        match self.current.load(Ordering::Acquire) {
            3 => SerialVersion::V3,
            _ => SerialVersion::V2,
        }
    }

    /// Steps down from whatever version is active now.
    ///
    /// Returns `false` at the floor. Callers that know which version a failed
    /// request was encoded with should prefer [`downgrade_from`], which cannot
    /// step past a transition another caller already made.
    ///
    /// [`downgrade_from`]: VersionNegotiator::downgrade_from
    pub fn downgrade(&self) -> bool {
        self.downgrade_from(self.current())
    }

    /// Steps down from `observed` to the next lower version.
    ///
    /// Only succeeds if `observed` is still the active version. Returns
    /// `false` when another caller already moved past it or when `observed`
    /// is the floor.
    pub fn downgrade_from(&self, observed: SerialVersion) -> bool {
        let Some(next) = observed.lower() else {
            return false;
        };

        let swapped = self
            .current
            .compare_exchange(
                observed.as_i16(),
                next.as_i16(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if swapped {
            tracing::warn!("Serial version downgraded from {} to {}", observed, next);
        }
        swapped
    }

    /// Returns whether no further downgrade is possible.
    pub fn at_floor(&self) -> bool {
        self.current() == SerialVersion::MIN
    }
}

impl Default for VersionNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_starts_at_highest_version() {
        let negotiator = VersionNegotiator::new();
        assert_eq!(negotiator.current(), SerialVersion::V3);
        assert!(!negotiator.at_floor());
    }

    #[test]
    fn test_downgrade_stops_at_floor() {
        let negotiator = VersionNegotiator::new();

        assert!(negotiator.downgrade());
        assert_eq!(negotiator.current(), SerialVersion::V2);

        assert!(!negotiator.downgrade());
        assert_eq!(negotiator.current(), SerialVersion::V2);
        assert!(negotiator.at_floor());
    }

    #[test]
    fn test_stale_downgrade_is_noop() {
        let negotiator = VersionNegotiator::new();
        assert!(negotiator.downgrade_from(SerialVersion::V3));
        // A second caller that also saw V3 must not move the version again.
        assert!(!negotiator.downgrade_from(SerialVersion::V3));
        assert_eq!(negotiator.current(), SerialVersion::V2);
    }

    #[test]
    fn test_concurrent_downgrades_transition_once() {
        const THREADS: usize = 16;

        let negotiator = Arc::new(VersionNegotiator::new());
        let barrier = Arc::new(Barrier::new(THREADS));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let negotiator = negotiator.clone();
                let barrier = barrier.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if negotiator.downgrade() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(negotiator.current(), SerialVersion::V2);
    }

    #[test]
    fn test_serial_version_conversions() {
        assert_eq!(SerialVersion::try_from(3).unwrap(), SerialVersion::V3);
        assert!(matches!(
            SerialVersion::try_from(7),
            Err(WireError::Malformed(_))
        ));
        assert_eq!(i16::from(SerialVersion::V2), 2);
        assert_eq!(SerialVersion::V3.to_string(), "V3");
        assert!(SerialVersion::V2 < SerialVersion::V3);
    }

    #[test]
    fn test_serial_version_serde() {
        let json = serde_json::to_string(&SerialVersion::V3).unwrap();
        assert_eq!(json, "3");
        let parsed: SerialVersion = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, SerialVersion::V2);
        assert!(serde_json::from_str::<SerialVersion>("9").is_err());
    }
}
