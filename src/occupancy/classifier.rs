//! Distance to occupancy classification.
//!
//! A reading is trusted only inside the plausible range of the sensor; inside
//! that range anything closer than the threshold counts as a parked vehicle.

use crate::sensor::{RangeOutcome, TimeoutPhase};
use serde::Deserialize;

pub const DEFAULT_THRESHOLD_CM: f32 = 10.0;
pub const DEFAULT_MIN_PLAUSIBLE_CM: f32 = 2.0;
pub const DEFAULT_MAX_PLAUSIBLE_CM: f32 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Distance (cm) below which the slot is considered occupied.
    pub threshold_cm: f32,
    /// Smallest reading the sensor can physically produce.
    pub min_cm: f32,
    /// Largest reading the sensor can physically produce.
    pub max_cm: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold_cm: DEFAULT_THRESHOLD_CM,
            min_cm: DEFAULT_MIN_PLAUSIBLE_CM,
            max_cm: DEFAULT_MAX_PLAUSIBLE_CM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Timeout(TimeoutPhase),
    OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Occupied,
    Available,
    Invalid(InvalidReason),
}

impl Classification {
    pub fn is_valid(self) -> bool {
        !matches!(self, Classification::Invalid(_))
    }

    /// The verdict, only when the reading was valid.
    pub fn occupied(self) -> Option<bool> {
        match self {
            Classification::Occupied => Some(true),
            Classification::Available => Some(false),
            Classification::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlotClassifier {
    config: ClassifierConfig,
}

impl SlotClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, distance_cm: f32) -> Classification {
        // NaN fails `contains` and lands here as well.
        if !(self.config.min_cm..=self.config.max_cm).contains(&distance_cm) {
            return Classification::Invalid(InvalidReason::OutOfRange);
        }
        if distance_cm < self.config.threshold_cm {
            Classification::Occupied
        } else {
            Classification::Available
        }
    }

    pub fn classify_outcome(&self, outcome: RangeOutcome) -> Classification {
        match outcome {
            RangeOutcome::Distance { distance_cm } => self.classify(distance_cm),
            RangeOutcome::Timeout(phase) => Classification::Invalid(InvalidReason::Timeout(phase)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_matches_plausible_bounds() {
        let classifier = SlotClassifier::default();
        for tenths in 0..5000 {
            let distance = tenths as f32 / 10.0;
            let classification = classifier.classify(distance);
            assert_eq!(
                classification.is_valid(),
                (2.0..=400.0).contains(&distance),
                "distance {distance}"
            );
            if classification.is_valid() {
                assert_eq!(classification.occupied(), Some(distance < 10.0));
            }
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let classifier = SlotClassifier::default();
        assert_eq!(classifier.classify(2.0), Classification::Occupied);
        assert_eq!(classifier.classify(400.0), Classification::Available);
        assert_eq!(
            classifier.classify(400.1),
            Classification::Invalid(InvalidReason::OutOfRange)
        );
        assert_eq!(
            classifier.classify(1.99),
            Classification::Invalid(InvalidReason::OutOfRange)
        );
    }

    #[test]
    fn threshold_itself_is_available() {
        let classifier = SlotClassifier::default();
        assert_eq!(classifier.classify(10.0), Classification::Available);
        assert_eq!(classifier.classify(9.99), Classification::Occupied);
    }

    #[test]
    fn nan_is_invalid() {
        let classifier = SlotClassifier::default();
        assert!(!classifier.classify(f32::NAN).is_valid());
    }

    #[test]
    fn timeout_is_invalid_without_verdict() {
        let classifier = SlotClassifier::default();
        let classification = classifier.classify_outcome(RangeOutcome::Timeout(TimeoutPhase::Fall));

        assert_eq!(
            classification,
            Classification::Invalid(InvalidReason::Timeout(TimeoutPhase::Fall))
        );
        assert_eq!(classification.occupied(), None);
    }

    #[test]
    fn custom_threshold_is_honoured() {
        let classifier = SlotClassifier::new(ClassifierConfig {
            threshold_cm: 50.0,
            ..ClassifierConfig::default()
        });
        assert_eq!(classifier.classify(20.0), Classification::Occupied);
        assert_eq!(classifier.classify(60.0), Classification::Available);
    }
}
