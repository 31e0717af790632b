//! The single bidirectional data line the sensor talks on.
//!
//! Timing comes from [`embedded_hal::delay::DelayNs`]; the line itself is the
//! [`GpioLine`] trait below so the driver can switch it between driving and
//! sensing without caring how the target does that.

use embedded_hal::digital::{InputPin, OutputPin};

/// A digital pin that can either drive a level or sense one.
pub trait GpioLine {
    type Error: core::fmt::Debug;

    /// Switch to output and drive `high`.
    fn drive(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Switch to input so the other end can pull the line.
    fn sense(&mut self) -> Result<(), Self::Error>;

    /// Current logic level of the line.
    fn is_high(&mut self) -> Result<bool, Self::Error>;
}

/// [`GpioLine`] over an open-drain pin with an external pull-up.
///
/// Sensing is done by releasing the line (writing high) and reading it back,
/// which is how the ESP32 flex pins are wired for one-wire sensors.
pub struct OpenDrainLine<P> {
    pin: P,
}

impl<P> OpenDrainLine<P>
where
    P: InputPin + OutputPin,
{
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P> GpioLine for OpenDrainLine<P>
where
    P: InputPin + OutputPin,
    P::Error: core::fmt::Debug,
{
    type Error = P::Error;

    fn drive(&mut self, high: bool) -> Result<(), Self::Error> {
        if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }

    fn sense(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high()
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        InputPin::is_high(&mut self.pin)
    }
}
