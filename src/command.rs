//! Command table and dispatcher for `@ZB...!` frames.
//!
//! Matching is a first-match scan over [`COMMAND_TABLE`]; an entry matches when
//! its pattern occurs anywhere in the frame. Several patterns share prefixes,
//! so the table order decides which handler runs.

use core::fmt::Write;

use heapless::String;

use crate::frame;
use crate::host::{DeviceRole, ExtAddr, FreeData, HostRuntime};

/// Reply text, without the trailing line break.
pub type Reply = String<32>;

pub const REPLY_OK: &str = "OK";
pub const REPLY_ERROR: &str = "ERROR";

/// Hex digits of the destination address at the start of a control payload.
const EXT_ADDR_DIGITS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    CheckAlive,
    BindingStop,
    BindingStart,
    ShortAddress,
    CoordShortAddress,
    EchoSendOff,
    EchoSendOn,
    EchoReceiveOff,
    EchoReceiveOn,
    SendFreeData,
    SendControl,
}

pub struct CommandEntry {
    pub pattern: &'static [u8],
    pub command: Command,
}

const fn entry(pattern: &'static [u8], command: Command) -> CommandEntry {
    CommandEntry { pattern, command }
}

pub const COMMAND_TABLE: &[CommandEntry] = &[
    entry(b"@ZB!", Command::CheckAlive),
    entry(b"@ZB+BIND=0!", Command::BindingStop),
    entry(b"@ZB+BIND=1!", Command::BindingStart),
    entry(b"@ZB+SHORTADDR!", Command::ShortAddress),
    entry(b"@ZB+COORDSHORTADDR!", Command::CoordShortAddress),
    entry(b"@ZB+ECHOSDATA=0!", Command::EchoSendOff),
    entry(b"@ZB+ECHOSDATA=1!", Command::EchoSendOn),
    entry(b"@ZB+ECHORDATA=0!", Command::EchoReceiveOff),
    entry(b"@ZB+ECHORDATA=1!", Command::EchoReceiveOn),
    entry(b"@ZB+DATA=", Command::SendFreeData),
    entry(b"@ZB+CONTROL=", Command::SendControl),
];

/// Flags the host toggles over the serial link.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Session {
    /// Echo data this node sends over the air back to the host.
    pub echo_send: bool,
    /// Forward data received over the air to the host.
    pub echo_receive: bool,
    /// Binding (EZ-Mode) is in progress.
    pub binding: bool,
    /// Binding was started from the serial link rather than a key press.
    pub hard_binding: bool,
}

impl Session {
    /// The runtime calls this once EZ-Mode has finished.
    pub fn binding_finished(&mut self) {
        self.binding = false;
        self.hard_binding = false;
    }
}

/// Outcome of one dispatched frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// `None` when the frame was malformed or matched nothing.
    pub command: Option<Command>,
    pub reply: Reply,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    session: Session,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Validate `frame`, run the first matching handler and return its reply.
    pub fn dispatch<H>(&mut self, frame: &[u8], host: &mut H) -> Dispatch
    where
        H: HostRuntime + ?Sized,
    {
        if let Err(e) = frame::validate(frame) {
            debug!("rejected frame: {}", e.as_str());
            return Dispatch {
                command: None,
                reply: text(REPLY_ERROR),
            };
        }

        let Some((entry, at)) = COMMAND_TABLE
            .iter()
            .find_map(|entry| find(frame, entry.pattern).map(|at| (entry, at)))
        else {
            debug!("no command matches frame");
            return Dispatch {
                command: None,
                reply: text(REPLY_ERROR),
            };
        };

        info!("command {:?}", entry.command);
        // Validation guarantees the frame ends with its only end marker.
        let args = frame
            .get(at + entry.pattern.len()..frame.len() - 1)
            .unwrap_or(&[]);
        let reply = self.execute(entry.command, args, host);

        Dispatch {
            command: Some(entry.command),
            reply,
        }
    }

    fn execute<H>(&mut self, command: Command, args: &[u8], host: &mut H) -> Reply
    where
        H: HostRuntime + ?Sized,
    {
        let session = &mut self.session;
        match command {
            Command::CheckAlive => text(REPLY_OK),
            Command::BindingStart => {
                if session.binding {
                    return text("BINDING START ALREADY");
                }
                if host.invoke_binding() {
                    session.binding = true;
                }
                session.hard_binding = true;
                text("BINDING STARTED")
            }
            Command::BindingStop => {
                if !session.binding {
                    return text("BINDING STOP ALREADY");
                }
                if host.invoke_binding() {
                    session.binding = false;
                }
                session.hard_binding = false;
                text("BINDING STOPPED")
            }
            Command::ShortAddress => number(host.short_addr()),
            Command::CoordShortAddress => match host.role() {
                DeviceRole::Coordinator => text("COORDINATOR!"),
                _ => number(host.coord_short_addr()),
            },
            Command::EchoSendOff => {
                session.echo_send = false;
                text(REPLY_OK)
            }
            Command::EchoSendOn => {
                session.echo_send = true;
                text(REPLY_OK)
            }
            Command::EchoReceiveOff => {
                session.echo_receive = false;
                text(REPLY_OK)
            }
            Command::EchoReceiveOn => {
                session.echo_receive = true;
                text(REPLY_OK)
            }
            Command::SendFreeData => {
                if host.role() != DeviceRole::Coordinator {
                    return text("NOT SUPPORT");
                }
                match FreeData::new(args) {
                    Some(data) => {
                        host.send_free_data(&data);
                        text(REPLY_OK)
                    }
                    None => {
                        warn!("free data too long: {} bytes", args.len());
                        text(REPLY_ERROR)
                    }
                }
            }
            Command::SendControl => {
                if host.role() != DeviceRole::Coordinator {
                    return text("ONLY ZBC");
                }
                match (FreeData::new(args), parse_ext_addr(args)) {
                    (Some(data), Some(dst)) => {
                        host.send_control(dst, &data);
                        text("DONE")
                    }
                    _ => text(REPLY_ERROR),
                }
            }
        }
    }
}

/// Decode the 16 hex digits leading a control payload. The text is most
/// significant byte first; the result is in over-air order.
pub fn parse_ext_addr(payload: &[u8]) -> Option<ExtAddr> {
    let digits = payload.get(..EXT_ADDR_DIGITS)?;
    let mut addr = [0u8; 8];
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        let byte = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
        addr[addr.len() - 1 - i] = byte;
    }
    Some(addr)
}

fn hex_value(digit: u8) -> Option<u8> {
    char::from(digit).to_digit(16).map(|v| v as u8)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn text(s: &str) -> Reply {
    let mut reply = Reply::new();
    let pushed = reply.push_str(s);
    debug_assert!(pushed.is_ok(), "reply longer than its buffer");
    reply
}

fn number(n: u16) -> Reply {
    let mut reply = Reply::new();
    let written = write!(reply, "{}", n);
    debug_assert!(written.is_ok(), "reply longer than its buffer");
    reply
}
