// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch ports.
//!
//! [`PortDev`] is the seam to the per-NIC glue: a non-blocking
//! receive/transmit pair plus identity. The registry assigns port
//! numbers, keeps insertion order for flooding, and counts traffic.

use crate::engine::ether::EtherAddr;
use crate::SwitchError;
use ofp::PhyPortRaw;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use zerocopy::FromZeroes;

/// One network device attached to the datapath. `recv` and `send`
/// must not block; `recv` returns `None` when nothing is pending.
pub trait PortDev: Send {
    fn name(&self) -> &str;

    fn hw_addr(&self) -> EtherAddr;

    fn recv(&mut self) -> io::Result<Option<Vec<u8>>>;

    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    fn speed_mbps(&self) -> u32 {
        1_000
    }

    fn feature_bits(&self) -> u32 {
        0
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct PortCounters {
    pub rx_count: u64,
    pub tx_count: u64,
    pub drop_count: u64,
}

pub struct SwPort {
    port_no: u16,
    dev: Box<dyn PortDev>,
    flags: u32,
    pub(crate) counters: PortCounters,
}

impl SwPort {
    fn new(port_no: u16, dev: Box<dyn PortDev>) -> Self {
        Self { port_no, dev, flags: 0, counters: PortCounters::default() }
    }

    pub fn port_no(&self) -> u16 {
        self.port_no
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }

    pub fn counters(&self) -> PortCounters {
        self.counters
    }

    pub fn hw_addr(&self) -> EtherAddr {
        self.dev.hw_addr()
    }

    pub(crate) fn recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.dev.recv()
    }

    /// Transmit, charging the appropriate counter.
    pub(crate) fn send(&mut self, frame: &[u8]) {
        match self.dev.send(frame) {
            Ok(()) => self.counters.tx_count += 1,
            Err(err) => {
                self.counters.drop_count += 1;
                tracing::debug!(
                    port = self.port_no,
                    %err,
                    "transmit failed, frame dropped"
                );
            }
        }
    }

    /// The port's wire description.
    pub fn desc(&self) -> PhyPortRaw {
        let mut desc = PhyPortRaw::new_zeroed();
        desc.port_no = self.port_no.to_be_bytes();
        desc.hw_addr = self.dev.hw_addr();

        let name = self.dev.name().as_bytes();
        let n = name.len().min(desc.name.len() - 1);
        desc.name[..n].copy_from_slice(&name[..n]);

        desc.flags = self.flags.to_be_bytes();
        desc.speed = self.dev.speed_mbps().to_be_bytes();
        desc.features = self.dev.feature_bits().to_be_bytes();
        desc
    }
}

/// The registry of physical ports plus the optional local
/// pseudo-port. Physical ports keep insertion order, which is the
/// flood order.
pub struct PortMap {
    ports: Vec<SwPort>,
    local: Option<SwPort>,
}

impl PortMap {
    pub fn new() -> Self {
        Self { ports: Vec::new(), local: None }
    }

    /// Register a device under the lowest free port number.
    pub fn add(&mut self, dev: Box<dyn PortDev>) -> Result<u16, SwitchError> {
        let mut port_no = 0u16;
        while self.ports.iter().any(|p| p.port_no == port_no) {
            port_no += 1;
            if port_no >= ofp::port::MAX {
                return Err(SwitchError::PortsFull);
            }
        }

        self.ports.push(SwPort::new(port_no, dev));
        Ok(port_no)
    }

    pub fn remove(&mut self, port_no: u16) -> Option<SwPort> {
        let idx = self.ports.iter().position(|p| p.port_no == port_no)?;
        Some(self.ports.remove(idx))
    }

    pub fn set_local(&mut self, dev: Box<dyn PortDev>) {
        self.local = Some(SwPort::new(ofp::port::LOCAL, dev));
    }

    pub fn get(&self, port_no: u16) -> Option<&SwPort> {
        self.ports.iter().find(|p| p.port_no == port_no)
    }

    pub fn get_mut(&mut self, port_no: u16) -> Option<&mut SwPort> {
        self.ports.iter_mut().find(|p| p.port_no == port_no)
    }

    pub fn local_mut(&mut self) -> Option<&mut SwPort> {
        self.local.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SwPort> {
        self.ports.iter()
    }

    pub fn numbers(&self) -> Vec<u16> {
        self.ports.iter().map(|p| p.port_no).collect()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl Default for PortMap {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory device for tests and demos: frames injected through
/// the handle appear on the port, frames the switch transmits pile up
/// for the handle to collect.
pub struct SimDev {
    name: String,
    mac: EtherAddr,
    shared: Arc<Mutex<SimQueues>>,
}

#[derive(Default)]
struct SimQueues {
    rx: VecDeque<Vec<u8>>,
    tx: VecDeque<Vec<u8>>,
    fail_tx: bool,
}

#[derive(Clone)]
pub struct SimHandle {
    shared: Arc<Mutex<SimQueues>>,
}

impl SimDev {
    pub fn new(name: &str, mac: EtherAddr) -> (Self, SimHandle) {
        let shared = Arc::new(Mutex::new(SimQueues::default()));
        let dev =
            Self { name: name.to_string(), mac, shared: shared.clone() };
        (dev, SimHandle { shared })
    }
}

impl PortDev for SimDev {
    fn name(&self) -> &str {
        &self.name
    }

    fn hw_addr(&self) -> EtherAddr {
        self.mac
    }

    fn recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.shared.lock().rx.pop_front())
    }

    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let mut q = self.shared.lock();
        if q.fail_tx {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        q.tx.push_back(frame.to_vec());
        Ok(())
    }
}

impl SimHandle {
    /// Queue a frame for the switch to receive.
    pub fn inject(&self, frame: Vec<u8>) {
        self.shared.lock().rx.push_back(frame);
    }

    /// Collect everything the switch transmitted so far.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        self.shared.lock().tx.drain(..).collect()
    }

    /// Make subsequent transmits fail, for drop-count tests.
    pub fn fail_transmits(&self, fail: bool) {
        self.shared.lock().fail_tx = fail;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn port_numbers_fill_lowest_free() {
        let mut map = PortMap::new();
        let (a, _) = SimDev::new("sim0", [2, 0, 0, 0, 0, 1]);
        let (b, _) = SimDev::new("sim1", [2, 0, 0, 0, 0, 2]);
        let (c, _) = SimDev::new("sim2", [2, 0, 0, 0, 0, 3]);

        assert_eq!(map.add(Box::new(a)).unwrap(), 0);
        assert_eq!(map.add(Box::new(b)).unwrap(), 1);
        map.remove(0).unwrap();
        assert_eq!(map.add(Box::new(c)).unwrap(), 0);
    }

    #[test]
    fn desc_is_null_terminated() {
        let (dev, _) = SimDev::new("a-port-name-way-too-long-to-fit", [2; 6]);
        let mut map = PortMap::new();
        let no = map.add(Box::new(dev)).unwrap();
        let desc = map.get(no).unwrap().desc();
        assert_eq!(desc.name[15], 0);
    }

    #[test]
    fn failed_transmit_counts_as_drop() {
        let (dev, handle) = SimDev::new("sim0", [2; 6]);
        let mut map = PortMap::new();
        let no = map.add(Box::new(dev)).unwrap();

        handle.fail_transmits(true);
        map.get_mut(no).unwrap().send(&[0u8; 60]);
        let counters = map.get(no).unwrap().counters();
        assert_eq!(counters.tx_count, 0);
        assert_eq!(counters.drop_count, 1);
    }
}
