// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The IPv4 header.

use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::FromZeroes;
use zerocopy::Ref;
use zerocopy::Unaligned;

pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

pub const IPV4_HDR_LEN: usize = 20;

/// More-fragments flag plus the 13-bit fragment offset; any set bit
/// means the frame is one piece of a fragmented datagram.
pub const IPV4_FRAG_BITS: u16 = 0x3fff;

#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct Ipv4HdrRaw {
    pub ver_ihl: u8,
    pub tos: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl Ipv4HdrRaw {
    pub fn parse(bytes: &[u8]) -> Option<Ref<&[u8], Self>> {
        Some(Ref::new_unaligned_from_prefix(bytes)?.0)
    }

    /// Header length in bytes, from the IHL nibble.
    pub fn hdr_len(&self) -> usize {
        usize::from(self.ver_ihl & 0x0f) * 4
    }

    pub fn is_fragment(&self) -> bool {
        u16::from_be_bytes(self.frag_and_flags) & IPV4_FRAG_BITS != 0
    }

    pub fn src(&self) -> u32 {
        u32::from_be_bytes(self.src)
    }

    pub fn dst(&self) -> u32 {
        u32::from_be_bytes(self.dst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::mem::size_of;

    #[test]
    fn header_size() {
        assert_eq!(size_of::<Ipv4HdrRaw>(), IPV4_HDR_LEN);
    }

    #[test]
    fn fragment_bits() {
        let mut hdr = Ipv4HdrRaw::new_zeroed();
        assert!(!hdr.is_fragment());

        // More-fragments flag.
        hdr.frag_and_flags = 0x2000u16.to_be_bytes();
        assert!(hdr.is_fragment());

        // Non-zero offset, no MF.
        hdr.frag_and_flags = 0x0001u16.to_be_bytes();
        assert!(hdr.is_fragment());

        // Don't-fragment alone is not a fragment.
        hdr.frag_and_flags = 0x4000u16.to_be_bytes();
        assert!(!hdr.is_fragment());
    }

    #[test]
    fn ihl_nibble() {
        let mut hdr = Ipv4HdrRaw::new_zeroed();
        hdr.ver_ihl = 0x45;
        assert_eq!(hdr.hdr_len(), 20);
        hdr.ver_ihl = 0x46;
        assert_eq!(hdr.hdr_len(), 24);
    }
}
