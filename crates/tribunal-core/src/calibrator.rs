//! Score-floor calibration for aggregated means.
//!
//! Oracle panels grade weak-but-genuine answers harshly enough to bunch
//! them near zero, where downstream grade bands stop discriminating. Means
//! below the floor get a fixed bump, clamped so the floor itself is the
//! minimum. Applied exactly once, to the post-filter mean only; raw scores
//! are never calibrated.

use crate::profile::ScoringProfile;

/// Result of calibrating one aggregated mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// The calibrated value.
    pub value: f64,

    /// Whether the floor changed the value.
    pub floor_applied: bool,
}

/// Score-floor calibrator.
///
/// With the default floor 30 and bump 15: a mean of 10 becomes 30, a mean
/// of 22 becomes 37, and anything at or above 30 passes through unchanged.
/// The mapping is idempotent, so re-calibrating an already calibrated value
/// is always a no-op.
#[derive(Debug, Clone, Copy)]
pub struct Calibrator {
    floor: f64,
    bump: f64,
}

impl Calibrator {
    /// Create a calibrator with an explicit floor and bump.
    pub fn new(floor: f64, bump: f64) -> Self {
        Self { floor, bump }
    }

    /// Create a calibrator from a scoring profile.
    pub fn from_profile(profile: &ScoringProfile) -> Self {
        Self::new(profile.score_floor, profile.score_floor_bump)
    }

    /// Calibrate an aggregated mean.
    pub fn calibrate(&self, value: f64) -> Calibration {
        if value >= self.floor {
            return Calibration {
                value,
                floor_applied: false,
            };
        }

        Calibration {
            value: (value + self.bump).max(self.floor),
            floor_applied: true,
        }
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::from_profile(&ScoringProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_below_floor_gets_bump() {
        let calibrator = Calibrator::default();

        // 18 + 15 = 33, already above the floor.
        let result = calibrator.calibrate(18.0);
        assert_eq!(result.value, 33.0);
        assert!(result.floor_applied);
    }

    #[test]
    fn test_deep_low_clamped_to_floor() {
        let calibrator = Calibrator::default();

        // 5 + 15 = 20 would still sit below the floor; the floor wins.
        let result = calibrator.calibrate(5.0);
        assert_eq!(result.value, 30.0);
        assert!(result.floor_applied);
    }

    #[test]
    fn test_at_floor_unchanged() {
        let result = Calibrator::default().calibrate(30.0);
        assert_eq!(result.value, 30.0);
        assert!(!result.floor_applied);
    }

    #[test]
    fn test_above_floor_unchanged() {
        let result = Calibrator::default().calibrate(76.25);
        assert_eq!(result.value, 76.25);
        assert!(!result.floor_applied);
    }

    #[test]
    fn test_custom_floor() {
        let calibrator = Calibrator::new(40.0, 10.0);

        assert_eq!(calibrator.calibrate(25.0).value, 40.0);
        assert_eq!(calibrator.calibrate(35.0).value, 45.0);
        assert!(!calibrator.calibrate(40.0).floor_applied);
    }

    proptest! {
        #[test]
        fn prop_calibration_is_idempotent(value in 0.0f64..=100.0) {
            let calibrator = Calibrator::default();
            let once = calibrator.calibrate(value);
            let twice = calibrator.calibrate(once.value);

            prop_assert_eq!(once.value, twice.value);
            prop_assert!(!twice.floor_applied);
        }

        #[test]
        fn prop_output_never_below_floor_when_applied(value in 0.0f64..30.0) {
            let result = Calibrator::default().calibrate(value);
            prop_assert!(result.floor_applied);
            prop_assert!(result.value >= 30.0);
        }
    }
}
