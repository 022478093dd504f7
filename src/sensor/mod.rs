use std::time::Duration;

pub mod mock;
pub mod ranger;

use ranger::PulseRanger;

/// Propagation speed of the ranging pulse in air, in centimetres per microsecond.
pub const SPEED_OF_SOUND_CM_PER_US: f64 = 0.0343;

/// Output line that fires the ranging pulse.
pub trait TriggerLine {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Input line that carries the returning echo.
pub trait EchoLine {
    fn is_high(&self) -> bool;
}

impl TriggerLine for Box<dyn TriggerLine + Send> {
    fn set_high(&mut self) {
        (**self).set_high()
    }
    fn set_low(&mut self) {
        (**self).set_low()
    }
}

impl EchoLine for Box<dyn EchoLine + Send> {
    fn is_high(&self) -> bool {
        (**self).is_high()
    }
}

/// Which bounded wait ran out during a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// The echo line never rose.
    Rise,
    /// The echo line rose but never fell.
    Fall,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeOutcome {
    Distance { distance_cm: f32 },
    Timeout(TimeoutPhase),
}

impl RangeOutcome {
    pub fn distance_cm(&self) -> Option<f32> {
        match self {
            RangeOutcome::Distance { distance_cm } => Some(*distance_cm),
            RangeOutcome::Timeout(_) => None,
        }
    }
}

/// A source of one distance measurement per call.
pub trait DistanceSensor {
    fn measure(&mut self) -> RangeOutcome;
}

impl DistanceSensor for Box<dyn DistanceSensor + Send> {
    fn measure(&mut self) -> RangeOutcome {
        (**self).measure()
    }
}

/// Pulse-echo sensor wired to a trigger/echo line pair.
pub struct EchoSensor<T, E> {
    trigger: T,
    echo: E,
    ranger: PulseRanger,
}

impl<T, E> EchoSensor<T, E>
where
    T: TriggerLine,
    E: EchoLine,
{
    pub fn new(trigger: T, echo: E, ranger: PulseRanger) -> Self {
        Self {
            trigger,
            echo,
            ranger,
        }
    }
}

impl<T, E> DistanceSensor for EchoSensor<T, E>
where
    T: TriggerLine,
    E: EchoLine,
{
    fn measure(&mut self) -> RangeOutcome {
        self.ranger.measure(&mut self.trigger, &self.echo)
    }
}

/// Convert the time the echo line stayed high into a one-way distance.
pub fn echo_to_distance_cm(high_time: Duration) -> f32 {
    let micros = high_time.as_secs_f64() * 1_000_000.0;
    (micros * SPEED_OF_SOUND_CM_PER_US / 2.0) as f32
}
