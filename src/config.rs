//! Tunable timings, ceilings and buffer policies.

/// Capacity of the UART receive ring buffer.
pub const RX_BUFFER_SIZE: usize = 128;

/// Largest payload carried by the `+DATA=` and `+CONTROL=` commands.
pub const FREE_DATA_LEN: usize = 32;

/// Timing of the DHT11 wake/acknowledge/bit protocol.
///
/// Polling ceilings count loop iterations, not microseconds: on the target the
/// iteration count is a proxy for pulse width, so `one_threshold` has to be
/// tuned together with `poll_delay_ns` and the core clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dht11Config {
    /// Length of the low wake pulse (milliseconds).
    pub wake_ms: u32,
    /// Time the line is held high after the wake pulse (microseconds).
    pub settle_us: u32,
    /// Poll iterations allowed for any single line phase before timing out.
    pub timeout_polls: u32,
    /// A data bit whose high phase lasts more polls than this reads as `1`.
    pub one_threshold: u32,
    /// Extra delay inserted in every poll iteration (nanoseconds).
    pub poll_delay_ns: u32,
}

impl Default for Dht11Config {
    fn default() -> Self {
        Self {
            wake_ms: 18,
            settle_us: 10,
            timeout_polls: 100,
            one_threshold: 20,
            poll_delay_ns: 0,
        }
    }
}

impl Dht11Config {
    /// Each poll is padded to roughly 1 µs, so the ceilings read as
    /// microseconds whatever the core clock. Used by the firmware.
    pub const fn padded_polls() -> Self {
        Self {
            wake_ms: 18,
            settle_us: 10,
            timeout_polls: 100,
            one_threshold: 40,
            poll_delay_ns: 1_000,
        }
    }

    pub const fn with_ceilings(mut self, timeout_polls: u32, one_threshold: u32) -> Self {
        self.timeout_polls = timeout_polls;
        self.one_threshold = one_threshold;
        self
    }
}

/// What the receive path does when a write would fill the ring buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverflowPolicy {
    /// Historical behavior: the unread count drops back to zero and every
    /// pending byte is forgotten. Kept for compatibility only.
    ResetOnFull,
    /// Keep the unread bytes and refuse the rest of the block.
    #[default]
    RejectNew,
}

/// Receive-path configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxConfig {
    pub overflow: OverflowPolicy,
}

/// Cadence of the cooperative task loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// How often the command task looks for a complete frame (milliseconds).
    pub poll_period_ms: u64,
    /// How often the sensor is read. Each read blocks the core for tens of
    /// milliseconds, so keep this well above `poll_period_ms`.
    pub sensor_period_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: 10,
            sensor_period_ms: 2_000,
        }
    }
}
