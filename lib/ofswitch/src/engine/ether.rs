// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ethernet, 802.1Q, and 802.2 LLC/SNAP headers.

use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::FromZeroes;
use zerocopy::Ref;
use zerocopy::Unaligned;

pub use ofp::EtherAddr;
pub use ofp::ETHER_ADDR_LEN;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_ARP: u16 = 0x0806;
pub const ETHER_TYPE_VLAN: u16 = 0x8100;

pub const ETHER_HDR_LEN: usize = 14;
pub const VLAN_HDR_LEN: usize = 4;

/// Low 12 bits of the TCI carry the VLAN id.
pub const VLAN_VID_MASK: u16 = 0x0fff;
/// The PCP lives in the top 3 TCI bits.
pub const VLAN_PCP_SHIFT: u16 = 13;

/// 802.1D bridge group address; spanning-tree BPDUs are sent here.
pub const STP_MULTICAST: EtherAddr = [0x01, 0x80, 0xc2, 0x00, 0x00, 0x00];

pub const LLC_DSAP_SNAP: u8 = 0xaa;
pub const LLC_SSAP_SNAP: u8 = 0xaa;
pub const LLC_CNTL_SNAP: u8 = 0x03;
pub const LLC_HDR_LEN: usize = 3;

#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct EtherHdrRaw {
    pub dst: EtherAddr,
    pub src: EtherAddr,
    pub ether_type: [u8; 2],
}

impl EtherHdrRaw {
    pub fn parse(bytes: &[u8]) -> Option<Ref<&[u8], Self>> {
        Some(Ref::new_unaligned_from_prefix(bytes)?.0)
    }

    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes(self.ether_type)
    }
}

/// The 4 bytes following the MACs on a tagged frame: TCI plus the
/// encapsulated EtherType.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct VlanHdrRaw {
    pub tci: [u8; 2],
    pub ether_type: [u8; 2],
}

impl VlanHdrRaw {
    pub fn parse(bytes: &[u8]) -> Option<Ref<&[u8], Self>> {
        Some(Ref::new_unaligned_from_prefix(bytes)?.0)
    }

    pub fn tci(&self) -> u16 {
        u16::from_be_bytes(self.tci)
    }

    pub fn vid(&self) -> u16 {
        self.tci() & VLAN_VID_MASK
    }

    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes(self.ether_type)
    }
}

/// 802.2 LLC followed by a SNAP extension. Only the SNAP form with a
/// zero OUI carries a real EtherType.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct LlcSnapHdrRaw {
    pub dsap: u8,
    pub ssap: u8,
    pub cntl: u8,
    pub oui: [u8; 3],
    pub snap_type: [u8; 2],
}

impl LlcSnapHdrRaw {
    pub fn parse(bytes: &[u8]) -> Option<Ref<&[u8], Self>> {
        Some(Ref::new_unaligned_from_prefix(bytes)?.0)
    }

    pub fn is_snap(&self) -> bool {
        self.dsap == LLC_DSAP_SNAP
            && self.ssap == LLC_SSAP_SNAP
            && self.cntl == LLC_CNTL_SNAP
            && self.oui == [0; 3]
    }

    pub fn snap_type(&self) -> u16 {
        u16::from_be_bytes(self.snap_type)
    }
}
