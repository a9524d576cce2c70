//! Lamport clock implementation

use std::fmt;

/// Lamport logical clock
/// INVARIANT: every tick strictly increases the value
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LamportClock {
    value: u64,
}

impl LamportClock {
    /// Create a clock starting at zero
    pub fn new() -> Self {
        LamportClock { value: 0 }
    }

    /// Create a clock starting at an arbitrary value
    pub fn starting_at(value: u64) -> Self {
        LamportClock { value }
    }

    /// Current value without advancing
    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Advance for an internal or send event.
    /// Returns the new value
    pub fn tick_internal_or_send(&mut self) -> u64 {
        self.value = self.value.saturating_add(1);
        self.value
    }

    /// Merge a received timestamp: `max(local, received) + 1`.
    /// Returns the new value
    pub fn tick_receive(&mut self, received: u64) -> u64 {
        self.value = self.value.max(received).saturating_add(1);
        self.value
    }
}

impl fmt::Debug for LamportClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LamportClock({})", self.value)
    }
}

impl fmt::Display for LamportClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_internal_event_increments() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.tick_internal_or_send(), 1);
        assert_eq!(clock.tick_internal_or_send(), 2);
        assert_eq!(clock.value(), 2);
    }

    #[test]
    fn test_receive_jumps_ahead() {
        let mut clock = LamportClock::starting_at(5);
        assert_eq!(clock.tick_receive(7), 8);
    }

    #[test]
    fn test_receive_from_behind() {
        let mut clock = LamportClock::starting_at(10);
        assert_eq!(clock.tick_receive(3), 11);
    }

    #[test]
    fn test_saturates_at_max() {
        let mut clock = LamportClock::starting_at(u64::MAX);
        assert_eq!(clock.tick_internal_or_send(), u64::MAX);
        assert_eq!(clock.tick_receive(u64::MAX), u64::MAX);
    }

    proptest! {
        #[test]
        fn prop_local_events_add_k(start in 0u64..1_000_000, k in 0usize..500) {
            let mut clock = LamportClock::starting_at(start);
            for _ in 0..k {
                clock.tick_internal_or_send();
            }
            prop_assert_eq!(clock.value(), start + k as u64);
        }

        #[test]
        fn prop_receive_is_strict_causal_advance(c in 0u64..u64::MAX / 2, r in 0u64..u64::MAX / 2) {
            let mut clock = LamportClock::starting_at(c);
            let after = clock.tick_receive(r);
            prop_assert_eq!(after, c.max(r) + 1);
            prop_assert!(after > c);
            prop_assert!(after > r);
        }

        #[test]
        fn prop_mixed_events_never_decrease(events in proptest::collection::vec(proptest::option::of(0u64..10_000), 1..200)) {
            let mut clock = LamportClock::new();
            for event in events {
                let before = clock.value();
                match event {
                    Some(received) => clock.tick_receive(received),
                    None => clock.tick_internal_or_send(),
                };
                prop_assert!(clock.value() > before);
            }
        }
    }
}
