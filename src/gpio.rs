//! Raspberry Pi pin backend for ranging and indicator lines.

use crate::config::SlotConfig;
use crate::error::AppError;
use crate::monitor::SlotHardware;
use crate::sensor::ranger::PulseRanger;

#[cfg(target_os = "linux")]
use crate::indicator::IndicatorLines;
#[cfg(target_os = "linux")]
use crate::sensor::{EchoLine, EchoSensor, TriggerLine};
#[cfg(target_os = "linux")]
use rppal::gpio::{Gpio, InputPin, OutputPin};
#[cfg(target_os = "linux")]
use tracing::info;

#[cfg(target_os = "linux")]
pub struct RppalTrigger(OutputPin);

#[cfg(target_os = "linux")]
impl TriggerLine for RppalTrigger {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }
}

#[cfg(target_os = "linux")]
pub struct RppalEcho(InputPin);

#[cfg(target_os = "linux")]
impl EchoLine for RppalEcho {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}

/// Common-cathode RGB lamp: driving a pin high lights that channel.
#[cfg(target_os = "linux")]
pub struct RppalLamp {
    red: OutputPin,
    green: OutputPin,
}

#[cfg(target_os = "linux")]
impl IndicatorLines for RppalLamp {
    fn set_red(&mut self, on: bool) {
        if on {
            self.red.set_high();
        } else {
            self.red.set_low();
        }
    }

    fn set_green(&mut self, on: bool) {
        if on {
            self.green.set_high();
        } else {
            self.green.set_low();
        }
    }
}

/// Claim and configure the pins of every slot.
///
/// Any failure here is fatal: the monitor has nothing to do without hardware.
#[cfg(target_os = "linux")]
pub fn open_slot_hardware(
    slots: &[SlotConfig],
    ranger: PulseRanger,
) -> Result<Vec<SlotHardware>, AppError> {
    let gpio = Gpio::new().map_err(|err| AppError::Gpio(err.to_string()))?;
    let output = |pin: u8| -> Result<OutputPin, AppError> {
        gpio.get(pin)
            .map(|p| p.into_output_low())
            .map_err(|err| AppError::Gpio(format!("pin {pin}: {err}")))
    };
    let input = |pin: u8| -> Result<InputPin, AppError> {
        gpio.get(pin)
            .map(|p| p.into_input())
            .map_err(|err| AppError::Gpio(format!("pin {pin}: {err}")))
    };

    let mut hardware = Vec::with_capacity(slots.len());
    for slot in slots {
        let trigger = RppalTrigger(output(slot.trigger_pin)?);
        let echo = RppalEcho(input(slot.echo_pin)?);
        let lamp = RppalLamp {
            red: output(slot.red_pin)?,
            green: output(slot.green_pin)?,
        };
        info!(
            slot = %slot.name,
            trigger_pin = slot.trigger_pin,
            echo_pin = slot.echo_pin,
            red_pin = slot.red_pin,
            green_pin = slot.green_pin,
            "Slot pins configured"
        );
        hardware.push(SlotHardware {
            name: slot.name.clone(),
            sensor: Box::new(EchoSensor::new(trigger, echo, ranger)),
            lamp: Box::new(lamp),
        });
    }
    Ok(hardware)
}

#[cfg(not(target_os = "linux"))]
pub fn open_slot_hardware(
    slots: &[SlotConfig],
    ranger: PulseRanger,
) -> Result<Vec<SlotHardware>, AppError> {
    let _ = (slots, ranger);
    Err(AppError::Gpio(
        "GPIO access requires Linux/Raspberry Pi".to_string(),
    ))
}
