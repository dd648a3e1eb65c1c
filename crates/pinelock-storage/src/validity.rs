//! Activation flag plus optional validity window.
//!
//! The decision rule is written once here and shared by both credential
//! tables: an entry is usable iff it is active and, when it carries a
//! window, the current time lies inside it (inclusive on both ends).
//!
//! When no wall clock is available the window check passes. Physical access
//! must not be denied because the real-time clock failed.

use chrono::{DateTime, Utc};
use pinelock_core::TimeWindow;

pub trait TemporalValidity {
    /// Inactive entries never validate, whatever their window says.
    fn is_active(&self) -> bool;

    fn window(&self) -> Option<&TimeWindow>;

    /// Whether the entry is usable at `now`.
    ///
    /// `now` is `None` when the clock is unavailable; windowed entries are
    /// then treated as valid.
    fn is_valid_at(&self, now: Option<DateTime<Utc>>) -> bool {
        if !self.is_active() {
            return false;
        }

        match (self.window(), now) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(window), Some(now)) => window.contains(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    struct MockEntity {
        active: bool,
        window: Option<TimeWindow>,
    }

    impl TemporalValidity for MockEntity {
        fn is_active(&self) -> bool {
            self.active
        }

        fn window(&self) -> Option<&TimeWindow> {
            self.window.as_ref()
        }
    }

    fn office_hours() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_active_entity_with_no_window_is_valid() {
        let entity = MockEntity {
            active: true,
            window: None,
        };
        assert!(entity.is_valid_at(Some(Utc::now())));
        assert!(entity.is_valid_at(None));
    }

    #[test]
    fn test_inactive_entity_is_invalid() {
        let entity = MockEntity {
            active: false,
            window: None,
        };
        assert!(!entity.is_valid_at(Some(Utc::now())));
        assert!(!entity.is_valid_at(None));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = office_hours();
        let entity = MockEntity {
            active: true,
            window: Some(window),
        };

        assert!(entity.is_valid_at(Some(window.from())));
        assert!(entity.is_valid_at(Some(window.until())));
        assert!(!entity.is_valid_at(Some(window.from() - Duration::seconds(1))));
        assert!(!entity.is_valid_at(Some(window.until() + Duration::seconds(1))));
    }

    #[test]
    fn test_missing_clock_fails_open() {
        let entity = MockEntity {
            active: true,
            window: Some(office_hours()),
        };
        assert!(entity.is_valid_at(None));
    }
}
