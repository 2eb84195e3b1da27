use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Operating mode of a working-set [`Cache`](crate::Cache).
///
/// # Variants
///
/// * `Split` - **Two generations** of half the byte budget each
///   - Writes land in the current generation, reads fall back to the previous one
///   - The expiration watcher rotates the generations every expire duration
///   - The initial mode of every cache that did not start from a snapshot
///
/// * `Switching` - **Capacity growth in progress**
///   - Entered once the current generation is 90% full
///   - The current generation has twice its former capacity, the previous
///     one still answers reads
///   - Transient: left as soon as the new generation is as full as the old one was
///
/// * `Whole` - **Single generation** holding the whole byte budget
///   - The previous generation is a small placeholder and is never read
///   - No rotation happens anymore
///   - Entered after growth, or directly when loading a non-empty snapshot
///
/// Modes only move forward `Split → Switching → Whole`; only
/// [`Cache::reset`](crate::Cache::reset) brings a cache back to `Split`.
///
/// # Examples
///
/// ```
/// use wscache::Mode;
///
/// assert_eq!(Mode::default(), Mode::Split);
/// assert_eq!(Mode::Whole.as_str(), "whole");
/// assert!(Mode::Split < Mode::Switching);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Mode {
    #[default]
    Split = 0,
    Switching = 1,
    Whole = 2,
}

impl Mode {
    /// Returns the lowercase name of the mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Split => "split",
            Mode::Switching => "switching",
            Mode::Whole => "whole",
        }
    }

    const fn from_u8(value: u8) -> Mode {
        match value {
            0 => Mode::Split,
            1 => Mode::Switching,
            2 => Mode::Whole,
            _ => unreachable!(),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`Mode`] readable without locks.
///
/// Writers must hold the cache's transition mutex; readers on the hot path
/// only load.
#[derive(Debug, Default)]
pub(crate) struct AtomicMode(AtomicU8);

impl AtomicMode {
    pub(crate) fn new(mode: Mode) -> Self {
        Self(AtomicU8::new(mode as u8))
    }

    pub(crate) fn load(&self) -> Mode {
        Mode::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, mode: Mode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips_through_atomic() {
        let mode = AtomicMode::new(Mode::Split);
        assert_eq!(mode.load(), Mode::Split);

        mode.store(Mode::Switching);
        assert_eq!(mode.load(), Mode::Switching);

        mode.store(Mode::Whole);
        assert_eq!(mode.load(), Mode::Whole);
    }

    #[test]
    fn test_mode_ordering_follows_transitions() {
        assert!(Mode::Split < Mode::Switching);
        assert!(Mode::Switching < Mode::Whole);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Split.to_string(), "split");
        assert_eq!(Mode::Switching.to_string(), "switching");
        assert_eq!(format!("{}", Mode::Whole), "whole");
    }
}
