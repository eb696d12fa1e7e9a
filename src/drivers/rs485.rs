//! RS-485 transceiver direction control (MAX485 DE/RE pin).
//!
//! The transceiver is half duplex: DE high drives the bus, DE low listens.
//! The line idles in receive so the slave's answer is never clipped.
//!
//! Generic over `embedded_hal::digital::OutputPin` so the same driver runs
//! on an `esp_idf_hal::gpio::PinDriver` and on the host [`SimPin`].

use embedded_hal::digital::OutputPin;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Receive,
    Transmit,
}

pub struct Rs485Direction<P: OutputPin> {
    pin: P,
    direction: Direction,
}

impl<P: OutputPin> Rs485Direction<P> {
    /// Take the pin and park the transceiver in receive mode.
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            warn!("RS485: failed to drive DE low at init");
        }
        Self {
            pin,
            direction: Direction::Receive,
        }
    }

    pub fn transmit(&mut self) {
        if self.pin.set_high().is_err() {
            warn!("RS485: failed to assert DE");
        }
        self.direction = Direction::Transmit;
    }

    pub fn receive(&mut self) {
        if self.pin.set_low().is_err() {
            warn!("RS485: failed to release DE");
        }
        self.direction = Direction::Receive;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Transceivers with automatic direction control have no DE pin wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPin;

impl embedded_hal::digital::ErrorType for NoPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Host stand-in that records every level change.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default, Clone)]
pub struct SimPin {
    pub levels: Vec<bool>,
}

#[cfg(not(target_os = "espidf"))]
impl SimPin {
    pub fn is_high(&self) -> bool {
        self.levels.last().copied().unwrap_or(false)
    }
}

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::digital::ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

#[cfg(not(target_os = "espidf"))]
impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}
