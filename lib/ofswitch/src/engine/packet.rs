// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Owned frame handles.
//!
//! A `Frame` is one Ethernet frame plus the L3/L4 offsets the parser
//! discovered. Cloning produces an independently owned copy (one per
//! output leg); the action executor requires `&mut` before any header
//! rewrite, so a shared frame is never modified.

use crate::engine::ether::ETHER_TYPE_VLAN;
use crate::engine::ether::VLAN_HDR_LEN;

/// Offset of the EtherType within the Ethernet header, which is also
/// where a VLAN tag is inserted or removed.
const ETHER_TYPE_OFFSET: usize = 12;

#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    l3: Option<usize>,
    l4: Option<usize>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, l3: None, l4: None }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Offset of the network header, when the parser found one.
    pub fn l3(&self) -> Option<usize> {
        self.l3
    }

    /// Offset of the transport header, when the parser found one.
    pub fn l4(&self) -> Option<usize> {
        self.l4
    }

    pub(crate) fn set_l3(&mut self, off: Option<usize>) {
        self.l3 = off;
    }

    pub(crate) fn set_l4(&mut self, off: Option<usize>) {
        self.l4 = off;
    }

    /// Is a VLAN tag present right after the MACs?
    pub fn has_vlan(&self) -> bool {
        self.data.len() >= ETHER_TYPE_OFFSET + 2
            && self.data[ETHER_TYPE_OFFSET..ETHER_TYPE_OFFSET + 2]
                == ETHER_TYPE_VLAN.to_be_bytes()
    }

    /// The TCI of a present VLAN tag.
    pub fn vlan_tci(&self) -> Option<u16> {
        if !self.has_vlan() || self.data.len() < ETHER_TYPE_OFFSET + 4 {
            return None;
        }

        Some(u16::from_be_bytes([
            self.data[ETHER_TYPE_OFFSET + 2],
            self.data[ETHER_TYPE_OFFSET + 3],
        ]))
    }

    /// Overwrite the TCI of a present tag.
    pub(crate) fn set_vlan_tci(&mut self, tci: u16) {
        self.data[ETHER_TYPE_OFFSET + 2..ETHER_TYPE_OFFSET + 4]
            .copy_from_slice(&tci.to_be_bytes());
    }

    /// Insert a new 802.1Q tag after the MACs; the previous EtherType
    /// becomes the encapsulated type. Layer offsets shift right.
    pub(crate) fn push_vlan(&mut self, tci: u16) {
        let mut tag = [0u8; VLAN_HDR_LEN];
        tag[0..2].copy_from_slice(&ETHER_TYPE_VLAN.to_be_bytes());
        tag[2..4].copy_from_slice(&tci.to_be_bytes());

        let insert_at = ETHER_TYPE_OFFSET.min(self.data.len());
        self.data.splice(insert_at..insert_at, tag);
        self.l3 = self.l3.map(|off| off + VLAN_HDR_LEN);
        self.l4 = self.l4.map(|off| off + VLAN_HDR_LEN);
    }

    /// Remove a present 802.1Q tag. Layer offsets shift left.
    pub(crate) fn strip_vlan(&mut self) {
        if !self.has_vlan() || self.data.len() < ETHER_TYPE_OFFSET + 4 {
            return;
        }

        self.data.drain(ETHER_TYPE_OFFSET..ETHER_TYPE_OFFSET + VLAN_HDR_LEN);
        self.l3 = self.l3.map(|off| off - VLAN_HDR_LEN);
        self.l4 = self.l4.map(|off| off - VLAN_HDR_LEN);
    }
}
