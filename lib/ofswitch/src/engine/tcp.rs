// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The TCP header.

use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::FromZeroes;
use zerocopy::Ref;
use zerocopy::Unaligned;

pub const TCP_HDR_LEN: usize = 20;

#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct TcpHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub seq: [u8; 4],
    pub ack: [u8; 4],
    pub offset_flags: [u8; 2],
    pub window: [u8; 2],
    pub csum: [u8; 2],
    pub urg: [u8; 2],
}

impl TcpHdrRaw {
    pub fn parse(bytes: &[u8]) -> Option<Ref<&[u8], Self>> {
        Some(Ref::new_unaligned_from_prefix(bytes)?.0)
    }

    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes(self.src_port)
    }

    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes(self.dst_port)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::mem::size_of;

    #[test]
    fn header_size() {
        assert_eq!(size_of::<TcpHdrRaw>(), TCP_HDR_LEN);
    }
}
