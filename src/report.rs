//! Frames the node pushes to the host without being asked.
//!
//! They use the command framing (`@ZBx:...!`) with `;`-separated decimal
//! fields, so the host can parse them with the same reader it uses for
//! replies.

use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::command::Session;
use crate::host::ExtAddr;

/// Longest rendered notification.
pub const NOTIFICATION_MAX: usize = 96;

pub type Rendered = Vec<u8, NOTIFICATION_MAX>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification<'a> {
    /// Measured values reported by a sensor node.
    SensorValue {
        rssi: i8,
        short_addr: u16,
        temperature: u8,
        humidity: u8,
        heating: u8,
        cooling: u8,
    },
    /// Actuator state reported back by a heating/cooling unit.
    Feedback {
        rssi: i8,
        short_addr: u16,
        endpoint: u8,
        heating: u8,
        cooling: u8,
    },
    /// Free data received from another node.
    FreeData {
        rssi: i8,
        short_addr: u16,
        endpoint: u8,
        coord_addr: u16,
        data: &'a [u8],
    },
}

impl Notification<'_> {
    /// Received traffic is only forwarded while the host asked for it.
    pub fn is_enabled(&self, session: &Session) -> bool {
        match self {
            Notification::SensorValue { .. } => true,
            Notification::Feedback { .. } | Notification::FreeData { .. } => session.echo_receive,
        }
    }

    pub fn render(&self) -> Rendered {
        let mut head: String<48> = String::new();
        // The numeric header is bounded well below 48 bytes.
        let _ = match *self {
            Notification::SensorValue {
                rssi,
                short_addr,
                temperature,
                humidity,
                heating,
                cooling,
            } => write!(
                head,
                "@ZBS:{};{};{};{};{};{}",
                rssi, short_addr, temperature, humidity, heating, cooling
            ),
            Notification::Feedback {
                rssi,
                short_addr,
                endpoint,
                heating,
                cooling,
            } => write!(
                head,
                "@ZBF:{};{};{};{};{}",
                rssi, short_addr, endpoint, heating, cooling
            ),
            Notification::FreeData {
                rssi,
                short_addr,
                endpoint,
                coord_addr,
                data,
            } => write!(
                head,
                "@ZBR:{};{};{};{};{};",
                rssi,
                short_addr,
                endpoint,
                coord_addr,
                data.len()
            ),
        };

        let mut out = Rendered::new();
        let _ = out.extend_from_slice(head.as_bytes());
        if let Notification::FreeData { data, .. } = self {
            let room = NOTIFICATION_MAX - out.len() - 1;
            let _ = out.extend_from_slice(&data[..data.len().min(room)]);
        }
        let _ = out.push(b'!');
        out
    }
}

/// Write `notification` followed by a line break if the session wants it.
/// Returns whether anything was written.
pub fn notify<W>(
    session: &Session,
    notification: &Notification<'_>,
    tx: &mut W,
) -> Result<bool, W::Error>
where
    W: embedded_io::Write,
{
    if !notification.is_enabled(session) {
        return Ok(false);
    }
    tx.write_all(&notification.render())?;
    tx.write_all(b"\r\n")?;
    Ok(true)
}

/// Two uppercase hex digits.
pub fn hex_u8(value: u8) -> [u8; 2] {
    let mut out = [0u8; 2];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = hex_digit(value >> (4 - 4 * i));
    }
    out
}

/// Four uppercase hex digits, most significant first.
pub fn hex_u16(value: u16) -> [u8; 4] {
    let [hi, lo] = value.to_be_bytes();
    let [a, b] = hex_u8(hi);
    let [c, d] = hex_u8(lo);
    [a, b, c, d]
}

/// An over-air IEEE address as 16 hex digits, most significant byte first,
/// the way `+CONTROL=` takes it.
pub fn hex_ext_addr(addr: &ExtAddr) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (pair, &byte) in out.chunks_exact_mut(2).zip(addr.iter().rev()) {
        pair.copy_from_slice(&hex_u8(byte));
    }
    out
}

fn hex_digit(nibble: u8) -> u8 {
    b"0123456789ABCDEF"[usize::from(nibble & 0x0F)]
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::convert::Infallible;
    use std::vec::Vec;

    struct Sink(Vec<u8>);

    impl embedded_io::ErrorType for Sink {
        type Error = Infallible;
    }

    impl embedded_io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[test]
    fn sensor_value_frame() {
        let n = Notification::SensorValue {
            rssi: -42,
            short_addr: 0x1A2B,
            temperature: 24,
            humidity: 55,
            heating: 0,
            cooling: 1,
        };

        assert_eq!(&n.render()[..], b"@ZBS:-42;6699;24;55;0;1!");
    }

    #[test]
    fn free_data_frame_carries_payload() {
        let n = Notification::FreeData {
            rssi: -60,
            short_addr: 2,
            endpoint: 8,
            coord_addr: 0,
            data: b"hello",
        };

        assert_eq!(&n.render()[..], b"@ZBR:-60;2;8;0;5;hello!");
    }

    #[test]
    fn received_traffic_needs_echo_enabled() {
        let feedback = Notification::Feedback {
            rssi: -30,
            short_addr: 7,
            endpoint: 1,
            heating: 1,
            cooling: 0,
        };
        let mut session = Session::default();
        let mut sink = Sink(Vec::new());

        assert_eq!(notify(&session, &feedback, &mut sink), Ok(false));
        assert!(sink.0.is_empty());

        session.echo_receive = true;
        assert_eq!(notify(&session, &feedback, &mut sink), Ok(true));
        assert_eq!(sink.0, b"@ZBF:-30;7;1;1;0!\r\n");
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(&hex_u8(0x0F), b"0F");
        assert_eq!(&hex_u8(0xA0), b"A0");
        assert_eq!(&hex_u16(0x796F), b"796F");
        assert_eq!(&hex_u16(0x0000), b"0000");
    }

    #[test]
    fn ext_addr_renders_as_control_takes_it() {
        let text = b"00124B0001020304";
        let addr = crate::command::parse_ext_addr(text).unwrap();

        assert_eq!(&hex_ext_addr(&addr), text);
    }
}
