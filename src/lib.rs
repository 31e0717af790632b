#![cfg_attr(not(test), no_std)]

//! Serial command bridge and DHT11 driver for an ESP32-C3 Zigbee node.
//!
//! The library is target-agnostic; the firmware in `src/bin/main.rs` wires it
//! to the UART, a GPIO pin and the embassy executor.

// Must come first so the logging macros are visible in every module.
#[macro_use]
mod fmt;

pub mod command;
pub mod config;
pub mod dht11;
pub mod frame;
pub mod host;
pub mod line;
pub mod link;
pub mod report;
pub mod ring;

pub use command::{Command, Dispatch, Dispatcher, Session};
pub use config::{Dht11Config, LinkConfig, OverflowPolicy, RxConfig, RX_BUFFER_SIZE};
pub use dht11::{Climate, Dht11, MeasureError, SensorError, SensorSample};
pub use host::{DeviceRole, ExtAddr, FreeData, HostRuntime};
pub use line::{GpioLine, OpenDrainLine};
pub use link::{LinkError, SerialLink};
pub use report::Notification;
pub use ring::{RingBuffer, RxError, RxEvent, SharedRing};
