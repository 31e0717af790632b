//! The network runtime this core runs inside.
//!
//! Routing, attribute reporting and EZ-Mode binding belong to the Zigbee stack;
//! the command handlers only reach it through [`HostRuntime`].

use heapless::Vec;

use crate::config::FREE_DATA_LEN;
use crate::dht11::Climate;

/// Filler the over-air record puts in front of the payload.
const RECORD_LEAD: u8 = b'0';
const RECORD_PAD: u8 = b' ';

/// IEEE address in over-air byte order (least significant byte first).
pub type ExtAddr = [u8; 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceRole {
    Coordinator,
    Router,
    EndDevice,
}

/// Application payload forwarded by `+DATA=` and `+CONTROL=`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FreeData {
    payload: Vec<u8, FREE_DATA_LEN>,
}

impl FreeData {
    /// `None` if the payload is longer than [`FREE_DATA_LEN`].
    pub fn new(payload: &[u8]) -> Option<Self> {
        Vec::from_slice(payload).ok().map(|payload| Self { payload })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The fixed-size record carried in the report attribute: a lead byte,
    /// then the payload padded with spaces.
    pub fn padded(&self) -> [u8; FREE_DATA_LEN + 1] {
        let mut record = [RECORD_PAD; FREE_DATA_LEN + 1];
        record[0] = RECORD_LEAD;
        record[1..=self.payload.len()].copy_from_slice(&self.payload);
        record
    }
}

pub trait HostRuntime {
    fn role(&self) -> DeviceRole;

    /// Network short address of this node.
    fn short_addr(&self) -> u16;

    /// Short address of this node's parent.
    fn coord_short_addr(&self) -> u16;

    /// Kick the binding procedure (EZ-Mode). Returns `false` if the runtime
    /// refused, for instance because the UI is busy.
    fn invoke_binding(&mut self) -> bool;

    /// Broadcast a free-data report.
    fn send_free_data(&mut self, data: &FreeData);

    /// Send a control report to one node.
    fn send_control(&mut self, dst: ExtAddr, data: &FreeData);

    /// Hand a fresh local reading to the attribute-reporting path.
    fn report_climate(&mut self, climate: Climate);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_record_layout() {
        let data = FreeData::new(b"abc").unwrap();
        let record = data.padded();

        assert_eq!(record[0], b'0');
        assert_eq!(&record[1..4], b"abc");
        assert!(record[4..].iter().all(|&b| b == b' '));
        assert_eq!(record.len(), FREE_DATA_LEN + 1);
    }

    #[test]
    fn rejects_oversized_payload() {
        assert!(FreeData::new(&[b'x'; FREE_DATA_LEN]).is_some());
        assert!(FreeData::new(&[b'x'; FREE_DATA_LEN + 1]).is_none());
    }
}
