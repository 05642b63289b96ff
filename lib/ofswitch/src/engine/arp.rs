// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ARP over Ethernet/IPv4.

use crate::engine::ether::EtherAddr;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::FromZeroes;
use zerocopy::Ref;
use zerocopy::Unaligned;

pub const ARP_HTYPE_ETHERNET: u16 = 1;
pub const ARP_PTYPE_IPV4: u16 = 0x0800;

pub const ARP_ETH_IPV4_LEN: usize = 28;

#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct ArpEthIpv4Raw {
    pub htype: [u8; 2],
    pub ptype: [u8; 2],
    pub hlen: u8,
    pub plen: u8,
    pub op: [u8; 2],
    pub sha: EtherAddr,
    pub spa: [u8; 4],
    pub tha: EtherAddr,
    pub tpa: [u8; 4],
}

impl ArpEthIpv4Raw {
    pub fn parse(bytes: &[u8]) -> Option<Ref<&[u8], Self>> {
        Some(Ref::new_unaligned_from_prefix(bytes)?.0)
    }

    /// Is this the Ethernet/IPv4 flavor whose sender/target addresses
    /// the flow key can carry?
    pub fn is_eth_ipv4(&self) -> bool {
        u16::from_be_bytes(self.htype) == ARP_HTYPE_ETHERNET
            && u16::from_be_bytes(self.ptype) == ARP_PTYPE_IPV4
            && usize::from(self.hlen) == crate::engine::ether::ETHER_ADDR_LEN
            && self.plen == 4
    }

    pub fn spa(&self) -> u32 {
        u32::from_be_bytes(self.spa)
    }

    pub fn tpa(&self) -> u32 {
        u32::from_be_bytes(self.tpa)
    }
}
