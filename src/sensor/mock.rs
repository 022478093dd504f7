use crate::sensor::{DistanceSensor, EchoLine, RangeOutcome, TimeoutPhase, TriggerLine};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Echo behaviour relative to the moment the trigger pulse ends.
#[derive(Debug, Clone, Copy)]
pub enum EchoScript {
    Silent,
    Pulse { delay: Duration, width: Duration },
    RiseOnly { delay: Duration },
    /// High before the trigger fires, falling shortly after it.
    StaleHigh { falls_after: Duration },
}

#[derive(Debug, Default)]
struct LineShared {
    trigger_high: bool,
    released_at: Option<Instant>,
    edges: Vec<bool>,
}

pub struct MockTrigger {
    shared: Arc<Mutex<LineShared>>,
}

impl MockTrigger {
    /// Levels written to the trigger, in order.
    pub fn edges(&self) -> Vec<bool> {
        self.shared
            .lock()
            .map(|shared| shared.edges.clone())
            .unwrap_or_default()
    }
}

impl TriggerLine for MockTrigger {
    fn set_high(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.trigger_high = true;
            shared.edges.push(true);
        }
    }

    fn set_low(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            if shared.trigger_high {
                shared.released_at = Some(Instant::now());
            }
            shared.trigger_high = false;
            shared.edges.push(false);
        }
    }
}

pub struct MockEcho {
    shared: Arc<Mutex<LineShared>>,
    script: EchoScript,
}

impl EchoLine for MockEcho {
    fn is_high(&self) -> bool {
        let released_at = match self.shared.lock() {
            Ok(shared) => shared.released_at,
            Err(_) => return false,
        };
        let since_release = released_at.map(|at| at.elapsed());
        match (self.script, since_release) {
            (EchoScript::Silent, _) => false,
            (EchoScript::StaleHigh { .. }, None) => true,
            (EchoScript::StaleHigh { falls_after }, Some(elapsed)) => elapsed < falls_after,
            (_, None) => false,
            (EchoScript::Pulse { delay, width }, Some(elapsed)) => {
                elapsed >= delay && elapsed < delay + width
            }
            (EchoScript::RiseOnly { delay }, Some(elapsed)) => elapsed >= delay,
        }
    }
}

/// Trigger/echo pair sharing one timeline.
pub fn mock_line_pair(script: EchoScript) -> (MockTrigger, MockEcho) {
    let shared = Arc::new(Mutex::new(LineShared::default()));
    (
        MockTrigger {
            shared: Arc::clone(&shared),
        },
        MockEcho { shared, script },
    )
}

/// Distance sensor that replays queued outcomes, then times out.
#[derive(Debug, Default)]
pub struct MockDistanceSensor {
    outcomes: VecDeque<RangeOutcome>,
}

impl MockDistanceSensor {
    pub fn new(outcomes: Vec<RangeOutcome>) -> Self {
        Self {
            outcomes: outcomes.into(),
        }
    }

    pub fn with_distances(distances_cm: &[f32]) -> Self {
        Self::new(
            distances_cm
                .iter()
                .map(|distance_cm| RangeOutcome::Distance {
                    distance_cm: *distance_cm,
                })
                .collect(),
        )
    }
}

impl DistanceSensor for MockDistanceSensor {
    fn measure(&mut self) -> RangeOutcome {
        self.outcomes
            .pop_front()
            .unwrap_or(RangeOutcome::Timeout(TimeoutPhase::Rise))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_distances_then_times_out() {
        let mut sensor = MockDistanceSensor::with_distances(&[5.0, 20.0]);

        assert_eq!(sensor.measure().distance_cm(), Some(5.0));
        assert_eq!(sensor.measure().distance_cm(), Some(20.0));
        assert_eq!(
            sensor.measure(),
            RangeOutcome::Timeout(TimeoutPhase::Rise)
        );
    }

    #[test]
    fn echo_stays_low_until_trigger_released() {
        let (mut trigger, echo) = mock_line_pair(EchoScript::RiseOnly {
            delay: Duration::ZERO,
        });

        assert!(!echo.is_high());
        trigger.set_high();
        assert!(!echo.is_high());
        trigger.set_low();
        assert!(echo.is_high());
    }
}
