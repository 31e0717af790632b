//! One tick of the command task: pull a frame out of the receive ring,
//! dispatch it and answer on the serial port.

use crate::command::{Command, Dispatcher, Session, REPLY_ERROR};
use crate::dht11::Climate;
use crate::frame::FrameError;
use crate::host::HostRuntime;
use crate::report::{self, Notification};
use crate::ring::SharedRing;

const LINE_END: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    #[error("serial write failed")]
    Write(E),
}

/// Command-task state. `C` is the size of the scratch buffer a frame is
/// copied into; it matches the receive ring so every buffered frame fits.
pub struct SerialLink<const C: usize> {
    dispatcher: Dispatcher,
    scratch: [u8; C],
}

impl<const C: usize> Default for SerialLink<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> SerialLink<C> {
    pub fn new() -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            scratch: [0; C],
        }
    }

    pub fn session(&self) -> &Session {
        self.dispatcher.session()
    }

    pub fn session_mut(&mut self) -> &mut Session {
        self.dispatcher.session_mut()
    }

    /// Handle at most one complete frame.
    ///
    /// Returns the command that ran, or `None` if no frame was ready or the
    /// frame was rejected. Every frame that was taken gets a reply.
    pub fn poll<const R: usize, H, W>(
        &mut self,
        rx: &SharedRing<R>,
        host: &mut H,
        tx: &mut W,
    ) -> Result<Option<Command>, LinkError<W::Error>>
    where
        H: HostRuntime + ?Sized,
        W: embedded_io::Write,
    {
        let scratch = &mut self.scratch;
        let taken = rx.with(|ring| {
            ring.try_extract()?;
            Some(ring.take_frame(scratch).map(|frame| frame.len()))
        });

        let len = match taken {
            None => return Ok(None),
            Some(Ok(len)) => len,
            Some(Err(e)) => {
                if let FrameError::TooLong { len, max } = e {
                    warn!("frame of {} bytes dropped, limit {}", len, max);
                }
                write_line(tx, REPLY_ERROR.as_bytes())?;
                return Ok(None);
            }
        };

        let dispatch = self.dispatcher.dispatch(&self.scratch[..len], host);
        write_line(tx, dispatch.reply.as_bytes())?;
        Ok(dispatch.command)
    }

    /// Pass a new local reading to the runtime, echoing it to the serial
    /// port while the host has asked for sent data.
    pub fn publish<H, W>(
        &mut self,
        climate: Climate,
        host: &mut H,
        tx: &mut W,
    ) -> Result<(), LinkError<W::Error>>
    where
        H: HostRuntime + ?Sized,
        W: embedded_io::Write,
    {
        host.report_climate(climate);
        if !self.session().echo_send {
            return Ok(());
        }

        let echo = Notification::SensorValue {
            rssi: 0,
            short_addr: host.short_addr(),
            temperature: climate.temperature,
            humidity: climate.humidity,
            heating: 0,
            cooling: 0,
        };
        write_line(tx, &echo.render())
    }

    /// Forward a notification from the network, subject to the echo flags.
    pub fn notify<W>(
        &self,
        notification: &Notification<'_>,
        tx: &mut W,
    ) -> Result<bool, LinkError<W::Error>>
    where
        W: embedded_io::Write,
    {
        report::notify(self.session(), notification, tx).map_err(LinkError::Write)
    }
}

fn write_line<W>(tx: &mut W, line: &[u8]) -> Result<(), LinkError<W::Error>>
where
    W: embedded_io::Write,
{
    tx.write_all(line).map_err(LinkError::Write)?;
    tx.write_all(LINE_END).map_err(LinkError::Write)?;
    tx.flush().map_err(LinkError::Write)
}
