//! UART receive ring buffer.
//!
//! The receive callback is the only writer of `write` and the command task is
//! the only reader of `read`. `available` is touched by both, so outside a
//! critical section treat it as a hint.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::{OverflowPolicy, RxConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxError {
    #[error("receive buffer full: stored {accepted} bytes, dropped {dropped}")]
    Overflow { accepted: usize, dropped: usize },
}

/// What the UART driver reports alongside a received block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxEvent {
    Full,
    AboutFull,
    /// The line went quiet; the block is complete.
    IdleTimeout,
}

pub struct RingBuffer<const C: usize> {
    buf: [u8; C],
    read: usize,
    write: usize,
    available: usize,
    /// Length of the frame found by the last successful extraction.
    pub(crate) frame_len: Option<usize>,
    overflow: OverflowPolicy,
}

impl<const C: usize> Default for RingBuffer<C> {
    fn default() -> Self {
        Self::new(RxConfig::default())
    }
}

impl<const C: usize> RingBuffer<C> {
    pub const fn new(config: RxConfig) -> Self {
        Self {
            buf: [0; C],
            read: 0,
            write: 0,
            available: 0,
            frame_len: None,
            overflow: config.overflow,
        }
    }

    pub const fn capacity(&self) -> usize {
        C
    }

    pub const fn available(&self) -> usize {
        self.available
    }

    pub const fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn clear(&mut self) {
        self.read = self.write;
        self.available = 0;
        self.frame_len = None;
    }

    /// Entry point for the receive callback. Only an idle timeout carries a
    /// finished block; the other events are ignored.
    pub fn on_rx_event(&mut self, event: RxEvent, block: &[u8]) -> Result<usize, RxError> {
        match event {
            RxEvent::IdleTimeout => self.push(block),
            RxEvent::Full | RxEvent::AboutFull => Ok(0),
        }
    }

    /// Append `bytes` and return how many were stored.
    pub fn push(&mut self, bytes: &[u8]) -> Result<usize, RxError> {
        for (stored, &byte) in bytes.iter().enumerate() {
            if self.overflow == OverflowPolicy::RejectNew && self.available == C {
                let dropped = bytes.len() - stored;
                warn!("rx overflow, dropping {} bytes", dropped);
                return Err(RxError::Overflow {
                    accepted: stored,
                    dropped,
                });
            }

            self.buf[self.write] = byte;
            self.write = (self.write + 1) % C;
            self.available += 1;

            if self.available == C && self.overflow == OverflowPolicy::ResetOnFull {
                warn!("rx buffer full, pending bytes discarded");
                self.available = 0;
            }
        }
        Ok(bytes.len())
    }

    /// Move up to `out.len()` unread bytes into `out` and return the count.
    ///
    /// Stops early once the read cursor reaches the write cursor.
    pub fn pull(&mut self, out: &mut [u8]) -> usize {
        let mut count = 0;
        while count < out.len() && self.available > 0 {
            out[count] = self.buf[self.read];
            count += 1;
            self.discard_one();
            if self.read == self.write {
                self.available = 0;
                break;
            }
        }
        count
    }

    /// Unread byte at `offset` from the read cursor.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        (offset < self.available).then(|| self.buf[(self.read + offset) % C])
    }

    pub(crate) fn discard_one(&mut self) {
        self.read = (self.read + 1) % C;
        self.available = self.available.saturating_sub(1);
    }
}

/// The process-wide receive buffer, shared between the UART receive context
/// and the command task.
pub struct SharedRing<const C: usize> {
    inner: Mutex<RefCell<RingBuffer<C>>>,
}

impl<const C: usize> SharedRing<C> {
    pub const fn new(config: RxConfig) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(RingBuffer::new(config))),
        }
    }

    /// Producer side, called from the receive callback.
    pub fn on_rx_event(&self, event: RxEvent, block: &[u8]) -> Result<usize, RxError> {
        self.with(|ring| ring.on_rx_event(event, block))
    }

    /// Consumer side access.
    pub fn with<R>(&self, f: impl FnOnce(&mut RingBuffer<C>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    pub fn available(&self) -> usize {
        self.with(|ring| ring.available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::vec;

    const C: usize = 128;

    fn ring(overflow: OverflowPolicy) -> RingBuffer<C> {
        RingBuffer::new(RxConfig { overflow })
    }

    #[test]
    fn push_then_pull_preserves_order() {
        for n in [1, 2, 17, 64, C - 1] {
            let mut rb = ring(OverflowPolicy::RejectNew);
            let data: std::vec::Vec<u8> = (0..n).map(|i| (i * 7 + 3) as u8).collect();

            assert_eq!(rb.push(&data), Ok(n));
            assert_eq!(rb.available(), n);

            let mut out = vec![0u8; n];
            assert_eq!(rb.pull(&mut out), n);
            assert_eq!(out, data);
            assert!(rb.is_empty());
        }
    }

    #[test]
    fn wraps_around_the_end() {
        let mut rb = ring(OverflowPolicy::RejectNew);
        let mut scratch = [0u8; 100];
        rb.push(&[0xAA; 100]).unwrap();
        rb.pull(&mut scratch);

        rb.push(b"across the seam of the buffer").unwrap();
        let mut out = [0u8; 29];
        assert_eq!(rb.pull(&mut out), 29);
        assert_eq!(&out, b"across the seam of the buffer");
    }

    #[test]
    fn pull_stops_when_caught_up() {
        let mut rb = ring(OverflowPolicy::RejectNew);
        rb.push(b"abc").unwrap();

        let mut out = [0u8; 8];
        assert_eq!(rb.pull(&mut out), 3);
        assert_eq!(&out[..3], b"abc");
        assert_eq!(rb.pull(&mut out), 0);
    }

    #[test]
    fn reset_on_full_forgets_pending_bytes() {
        let mut rb = ring(OverflowPolicy::ResetOnFull);

        assert_eq!(rb.push(&[b'x'; C]), Ok(C));
        assert_eq!(rb.available(), 0);

        let mut out = [0u8; 4];
        assert_eq!(rb.pull(&mut out), 0);
    }

    #[test]
    fn reject_new_keeps_the_oldest_bytes() {
        let mut rb = ring(OverflowPolicy::RejectNew);
        let data: std::vec::Vec<u8> = (0..C + 5).map(|i| i as u8).collect();

        assert_eq!(
            rb.push(&data),
            Err(RxError::Overflow {
                accepted: C,
                dropped: 5
            })
        );
        assert_eq!(rb.available(), C);

        let mut out = vec![0u8; C];
        assert_eq!(rb.pull(&mut out), C);
        assert_eq!(out, data[..C]);
    }

    #[test]
    fn only_idle_timeout_writes() {
        let mut rb = ring(OverflowPolicy::RejectNew);

        assert_eq!(rb.on_rx_event(RxEvent::Full, b"@ZB!"), Ok(0));
        assert_eq!(rb.on_rx_event(RxEvent::AboutFull, b"@ZB!"), Ok(0));
        assert!(rb.is_empty());

        assert_eq!(rb.on_rx_event(RxEvent::IdleTimeout, b"@ZB!"), Ok(4));
        assert_eq!(rb.available(), 4);
    }

    #[test]
    fn peek_is_bounded_by_unread_bytes() {
        let mut rb = ring(OverflowPolicy::RejectNew);
        rb.push(b"hi").unwrap();

        assert_eq!(rb.peek(0), Some(b'h'));
        assert_eq!(rb.peek(1), Some(b'i'));
        assert_eq!(rb.peek(2), None);
    }

    #[test]
    fn shared_ring_moves_bytes_between_contexts() {
        static RX: SharedRing<C> = SharedRing::new(RxConfig {
            overflow: OverflowPolicy::RejectNew,
        });

        let producer = std::thread::spawn(|| {
            RX.on_rx_event(RxEvent::IdleTimeout, b"@ZB!").unwrap();
        });
        producer.join().unwrap();

        assert_eq!(RX.available(), 4);
        let mut out = [0u8; 4];
        assert_eq!(RX.with(|ring| ring.pull(&mut out)), 4);
        assert_eq!(&out, b"@ZB!");
    }
}
