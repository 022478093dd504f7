use crate::sensor::{EchoLine, RangeOutcome, TimeoutPhase, TriggerLine, echo_to_distance_cm};
use std::time::{Duration, Instant};

pub const DEFAULT_SETTLE: Duration = Duration::from_micros(2);
pub const DEFAULT_PULSE_WIDTH: Duration = Duration::from_micros(10);
pub const DEFAULT_RISE_TIMEOUT: Duration = Duration::from_millis(30);
pub const DEFAULT_FALL_TIMEOUT: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangerTiming {
    /// Time the trigger is held low before the pulse.
    pub settle: Duration,
    /// Width of the trigger pulse.
    pub pulse_width: Duration,
    /// Window for the echo line to rise, measured from the end of the pulse.
    pub rise_timeout: Duration,
    /// Window for the echo line to fall, measured from the end of the rise window.
    pub fall_timeout: Duration,
}

impl Default for RangerTiming {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            pulse_width: DEFAULT_PULSE_WIDTH,
            rise_timeout: DEFAULT_RISE_TIMEOUT,
            fall_timeout: DEFAULT_FALL_TIMEOUT,
        }
    }
}

/// Single pulse-echo measurement with bounded waits.
///
/// Both waits spin on the monotonic clock; the echo width needs microsecond
/// resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseRanger {
    timing: RangerTiming,
}

impl PulseRanger {
    pub fn new(timing: RangerTiming) -> Self {
        Self { timing }
    }

    pub fn measure<T, E>(&self, trigger: &mut T, echo: &E) -> RangeOutcome
    where
        T: TriggerLine + ?Sized,
        E: EchoLine + ?Sized,
    {
        trigger.set_low();
        spin_for(self.timing.settle);
        trigger.set_high();
        spin_for(self.timing.pulse_width);
        trigger.set_low();

        let rise_deadline = Instant::now() + self.timing.rise_timeout;
        // A line that is already high (stale echo, noise) passes straight through;
        // the short result is left for the plausible-range filter.
        while !echo.is_high() {
            if Instant::now() >= rise_deadline {
                return RangeOutcome::Timeout(TimeoutPhase::Rise);
            }
            std::hint::spin_loop();
        }
        let rose_at = Instant::now();

        let fall_deadline = rise_deadline + self.timing.fall_timeout;
        while echo.is_high() {
            if Instant::now() >= fall_deadline {
                return RangeOutcome::Timeout(TimeoutPhase::Fall);
            }
            std::hint::spin_loop();
        }
        let fell_at = Instant::now();

        RangeOutcome::Distance {
            distance_cm: echo_to_distance_cm(fell_at.saturating_duration_since(rose_at)),
        }
    }
}

fn spin_for(duration: Duration) {
    let until = Instant::now() + duration;
    while Instant::now() < until {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::mock::{EchoScript, mock_line_pair};

    fn fast_timing() -> RangerTiming {
        RangerTiming {
            rise_timeout: Duration::from_millis(5),
            fall_timeout: Duration::from_millis(5),
            ..RangerTiming::default()
        }
    }

    #[test]
    fn measures_echo_width_as_distance() {
        let (mut trigger, echo) = mock_line_pair(EchoScript::Pulse {
            delay: Duration::from_micros(200),
            width: Duration::from_millis(1),
        });
        let ranger = PulseRanger::new(fast_timing());

        let outcome = ranger.measure(&mut trigger, &echo);

        let distance = outcome.distance_cm().expect("distance expected");
        assert!(
            (17.0..18.5).contains(&distance),
            "unexpected distance {distance}"
        );
    }

    #[test]
    fn trigger_is_pulsed_low_high_low() {
        let (mut trigger, echo) = mock_line_pair(EchoScript::Pulse {
            delay: Duration::ZERO,
            width: Duration::from_micros(100),
        });
        let ranger = PulseRanger::new(fast_timing());

        let _ = ranger.measure(&mut trigger, &echo);

        assert_eq!(trigger.edges(), vec![false, true, false]);
    }

    #[test]
    fn silent_echo_times_out_on_rise() {
        let (mut trigger, echo) = mock_line_pair(EchoScript::Silent);
        let ranger = PulseRanger::new(fast_timing());

        let started = Instant::now();
        let outcome = ranger.measure(&mut trigger, &echo);

        assert_eq!(outcome, RangeOutcome::Timeout(TimeoutPhase::Rise));
        assert!(started.elapsed() >= Duration::from_millis(5));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn echo_that_never_falls_times_out_on_fall() {
        let (mut trigger, echo) = mock_line_pair(EchoScript::RiseOnly {
            delay: Duration::from_micros(100),
        });
        let ranger = PulseRanger::new(fast_timing());

        let started = Instant::now();
        let outcome = ranger.measure(&mut trigger, &echo);

        assert_eq!(outcome, RangeOutcome::Timeout(TimeoutPhase::Fall));
        // Fall window starts where the rise window ends.
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn stale_high_echo_yields_short_reading() {
        let (mut trigger, echo) = mock_line_pair(EchoScript::StaleHigh {
            falls_after: Duration::from_micros(20),
        });
        let ranger = PulseRanger::new(fast_timing());

        let outcome = ranger.measure(&mut trigger, &echo);

        let distance = outcome.distance_cm().expect("distance expected");
        assert!(distance >= 0.0);
        assert!(distance < 2.0, "stale echo should read short, got {distance}");
    }
}
