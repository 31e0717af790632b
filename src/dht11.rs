//! DHT11 humidity/temperature sensor on a single-wire bus.
//!
//! ```text
//!   wake (host)     ack (sensor)        bit 0          bit 1
//! ──┐          ┌──┐       ┌──────┐      ┌──┐      ┌──────┐      ┌─
//!   │          │  │       │      │      │  │      │      │      │
//!   └──────────┘  └───────┘      └──────┘  └──────┘      └──────┘
//!     ~18 ms       80 µs   80 µs   50 µs  ~27 µs   50 µs  ~70 µs
//! ```
//!
//! Pulse widths are measured by counting poll iterations, so the whole read is
//! a busy wait bounded by [`Dht11Config::timeout_polls`] per phase.

use embedded_hal::delay::DelayNs;

use crate::config::Dht11Config;
use crate::line::GpioLine;

const SAMPLE_BYTES: usize = 5;
const SAMPLE_BITS: u8 = 40;

/// Line-level failures of a single read. None of them is fatal; the caller
/// decides when to try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError<E> {
    #[error("sensor did not pull the line low to acknowledge")]
    AckLowTimeout,
    #[error("sensor did not finish the acknowledge pulse")]
    AckHighTimeout,
    #[error("timed out while receiving bit {bit}")]
    BitTimeout { bit: u8 },
    #[error("gpio error: {0:?}")]
    Line(E),
}

/// Failure of [`Dht11::measure`]: either the line timed out or the bytes
/// arrived but do not add up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasureError<E> {
    #[error("{0}")]
    Sensor(SensorError<E>),
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },
}

impl<E> SensorError<E> {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SensorError::AckLowTimeout => "ack low timeout",
            SensorError::AckHighTimeout => "ack high timeout",
            SensorError::BitTimeout { .. } => "bit timeout",
            SensorError::Line(_) => "gpio error",
        }
    }
}

impl<E> From<SensorError<E>> for MeasureError<E> {
    fn from(e: SensorError<E>) -> Self {
        MeasureError::Sensor(e)
    }
}

/// Raw bytes of one transmission:
/// `[humidity, humidity_frac, temperature, temperature_frac, checksum]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSample {
    raw: [u8; SAMPLE_BYTES],
}

impl SensorSample {
    pub const fn from_raw(raw: [u8; SAMPLE_BYTES]) -> Self {
        Self { raw }
    }

    pub const fn raw(&self) -> [u8; SAMPLE_BYTES] {
        self.raw
    }

    /// Relative humidity, 0..=127 %.
    pub const fn humidity(&self) -> u8 {
        self.raw[0] & 0x7F
    }

    /// Temperature, 0..=127 °C.
    pub const fn temperature(&self) -> u8 {
        self.raw[2] & 0x7F
    }

    pub const fn checksum(&self) -> u8 {
        self.raw[4]
    }

    /// The DHT11 only sums the integral bytes; the fractional ones are always 0.
    pub const fn expected_checksum(&self) -> u8 {
        self.raw[0].wrapping_add(self.raw[2])
    }

    pub const fn is_valid(&self) -> bool {
        self.checksum() == self.expected_checksum()
    }

    pub fn climate(&self) -> Option<Climate> {
        self.is_valid().then(|| Climate {
            humidity: self.humidity(),
            temperature: self.temperature(),
        })
    }
}

/// A validated reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Climate {
    pub humidity: u8,
    pub temperature: u8,
}

impl Climate {
    /// Temperature in the low byte, humidity in the high byte; this is the
    /// value handed to the attribute reporting path.
    pub const fn packed(&self) -> u16 {
        u16::from_le_bytes([self.temperature, self.humidity])
    }
}

/// Collects bits MSB first into the five sample bytes.
struct BitAccumulator {
    bytes: [u8; SAMPLE_BYTES],
    byte: usize,
    shift: u8,
    consumed: u8,
}

impl BitAccumulator {
    const fn new() -> Self {
        Self {
            bytes: [0; SAMPLE_BYTES],
            byte: 0,
            shift: 7,
            consumed: 0,
        }
    }

    const fn is_complete(&self) -> bool {
        self.consumed >= SAMPLE_BITS
    }

    fn push(&mut self, bit: bool) {
        if bit {
            self.bytes[self.byte] |= 1 << self.shift;
        }
        if self.shift == 0 {
            self.shift = 7;
            self.byte += 1;
        } else {
            self.shift -= 1;
        }
        self.consumed += 1;
    }
}

pub struct Dht11<L, D> {
    line: L,
    delay: D,
    config: Dht11Config,
    latest: Option<Climate>,
}

impl<L, D> Dht11<L, D>
where
    L: GpioLine,
    D: DelayNs,
{
    pub fn new(line: L, delay: D, config: Dht11Config) -> Self {
        Dht11 {
            line,
            delay,
            config,
            latest: None,
        }
    }

    /// Drive the line high so the sensor sees an idle bus.
    pub fn init(&mut self) -> Result<(), SensorError<L::Error>> {
        self.line.drive(true).map_err(SensorError::Line)
    }

    pub fn config(&self) -> &Dht11Config {
        &self.config
    }

    /// Last reading that passed the checksum, if any.
    pub fn latest(&self) -> Option<Climate> {
        self.latest
    }

    pub fn release(self) -> (L, D) {
        (self.line, self.delay)
    }

    /// Read, validate and convert one sample.
    ///
    /// A bad checksum keeps the previous reading; the raw sample is dropped
    /// either way.
    pub fn measure(&mut self) -> Result<Climate, MeasureError<L::Error>> {
        let sample = match self.read() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("dht11 read failed: {}", e.as_str());
                return Err(e.into());
            }
        };

        match sample.climate() {
            Some(climate) => {
                debug!(
                    "dht11: {}% {}C",
                    climate.humidity, climate.temperature
                );
                self.latest = Some(climate);
                Ok(climate)
            }
            None => {
                warn!(
                    "dht11 checksum mismatch: {:?}",
                    sample.raw()
                );
                Err(MeasureError::Checksum {
                    expected: sample.expected_checksum(),
                    actual: sample.checksum(),
                })
            }
        }
    }

    /// Run the wake/acknowledge/data exchange and return the raw bytes.
    ///
    /// The checksum is not checked here. On a timeout the line is left in
    /// input mode.
    pub fn read(&mut self) -> Result<SensorSample, SensorError<L::Error>> {
        let config = self.config;

        // The wake pulse is long and not timing critical, so interrupts stay on.
        self.line.drive(false).map_err(SensorError::Line)?;
        self.delay.delay_ms(config.wake_ms);

        critical_section::with(|_cs| {
            self.line.drive(true).map_err(SensorError::Line)?;
            self.delay.delay_us(config.settle_us);
            self.line.sense().map_err(SensorError::Line)?;

            self.wait_while(true)?.ok_or(SensorError::AckLowTimeout)?;
            self.wait_while(false)?.ok_or(SensorError::AckLowTimeout)?;
            self.wait_while(true)?.ok_or(SensorError::AckHighTimeout)?;

            let mut bits = BitAccumulator::new();
            while !bits.is_complete() {
                let bit = bits.consumed;
                self.wait_while(false)?
                    .ok_or(SensorError::BitTimeout { bit })?;
                let high_polls = self
                    .wait_while(true)?
                    .ok_or(SensorError::BitTimeout { bit })?;
                bits.push(high_polls > config.one_threshold);
            }

            self.line.drive(true).map_err(SensorError::Line)?;
            Ok(SensorSample::from_raw(bits.bytes))
        })
    }

    /// Poll while the line sits at `high`. Returns the number of polls that
    /// saw that level, or `None` once the ceiling is exceeded.
    fn wait_while(&mut self, high: bool) -> Result<Option<u32>, SensorError<L::Error>> {
        let mut polls = 0;
        while self.line.is_high().map_err(SensorError::Line)? == high {
            polls += 1;
            if polls > self.config.timeout_polls {
                return Ok(None);
            }
            if self.config.poll_delay_ns > 0 {
                self.delay.delay_ns(self.config.poll_delay_ns);
            }
        }
        Ok(Some(polls))
    }
}
