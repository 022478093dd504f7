use crate::state::SlotStatus;
use serde::Deserialize;
use tracing::debug;

/// Two-channel lamp of one slot.
pub trait IndicatorLines {
    fn set_red(&mut self, on: bool);
    fn set_green(&mut self, on: bool);
}

impl IndicatorLines for Box<dyn IndicatorLines + Send> {
    fn set_red(&mut self, on: bool) {
        (**self).set_red(on)
    }
    fn set_green(&mut self, on: bool) {
        (**self).set_green(on)
    }
}

/// How an invalid reading is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidSignal {
    /// Both channels off, same as unknown.
    #[default]
    Off,
    /// Both channels on, a distinct third state.
    BothOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lamp {
    pub red: bool,
    pub green: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorDriver {
    invalid_signal: InvalidSignal,
}

impl IndicatorDriver {
    pub fn new(invalid_signal: InvalidSignal) -> Self {
        Self { invalid_signal }
    }

    pub fn lamp_for(&self, status: SlotStatus) -> Lamp {
        match status {
            SlotStatus::Occupied => Lamp {
                red: true,
                green: false,
            },
            SlotStatus::Available => Lamp {
                red: false,
                green: true,
            },
            SlotStatus::Invalid if self.invalid_signal == InvalidSignal::BothOn => Lamp {
                red: true,
                green: true,
            },
            SlotStatus::Invalid | SlotStatus::Unknown => Lamp {
                red: false,
                green: false,
            },
        }
    }

    pub fn show<L>(&self, slot_id: &str, lines: &mut L, status: SlotStatus) -> Lamp
    where
        L: IndicatorLines + ?Sized,
    {
        let lamp = self.lamp_for(status);
        lines.set_red(lamp.red);
        lines.set_green(lamp.green);
        debug!(slot = slot_id, red = lamp.red, green = lamp.green, "Indicator updated");
        lamp
    }
}

/// Lamp that remembers its last levels.
#[derive(Debug, Clone, Default)]
pub struct MockLamp {
    state: std::sync::Arc<std::sync::Mutex<Option<Lamp>>>,
}

impl MockLamp {
    pub fn current(&self) -> Option<Lamp> {
        self.state.lock().ok().and_then(|state| *state)
    }
}

impl IndicatorLines for MockLamp {
    fn set_red(&mut self, on: bool) {
        if let Ok(mut state) = self.state.lock() {
            let green = state.map(|lamp| lamp.green).unwrap_or(false);
            *state = Some(Lamp { red: on, green });
        }
    }

    fn set_green(&mut self, on: bool) {
        if let Ok(mut state) = self.state.lock() {
            let red = state.map(|lamp| lamp.red).unwrap_or(false);
            *state = Some(Lamp { red, green: on });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupied_is_red_available_is_green() {
        let driver = IndicatorDriver::default();
        let mut lamp = MockLamp::default();

        driver.show("Slot1", &mut lamp, SlotStatus::Occupied);
        assert_eq!(lamp.current(), Some(Lamp { red: true, green: false }));

        driver.show("Slot1", &mut lamp, SlotStatus::Available);
        assert_eq!(lamp.current(), Some(Lamp { red: false, green: true }));
    }

    #[test]
    fn invalid_and_unknown_are_dark_by_default() {
        let driver = IndicatorDriver::default();
        let dark = Lamp {
            red: false,
            green: false,
        };
        assert_eq!(driver.lamp_for(SlotStatus::Invalid), dark);
        assert_eq!(driver.lamp_for(SlotStatus::Unknown), dark);
    }

    #[test]
    fn invalid_can_light_both_channels() {
        let driver = IndicatorDriver::new(InvalidSignal::BothOn);
        assert_eq!(
            driver.lamp_for(SlotStatus::Invalid),
            Lamp {
                red: true,
                green: true
            }
        );
        assert_eq!(
            driver.lamp_for(SlotStatus::Unknown),
            Lamp {
                red: false,
                green: false
            }
        );
    }
}
