// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw message layouts.
//!
//! Each struct mirrors a wire structure byte for byte. Multi-byte
//! fields are `[u8; N]` in network order so every struct is
//! `Unaligned` and can be read at any offset; the accessors convert.

use core::mem::size_of;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::FromZeroes;
use zerocopy::Unaligned;

/// The 8-byte header prefixing every message.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct HeaderRaw {
    pub version: u8,
    pub msg_type: u8,
    pub length: [u8; 2],
    pub xid: [u8; 4],
}

impl HeaderRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn length(&self) -> u16 {
        u16::from_be_bytes(self.length)
    }

    pub fn xid(&self) -> u32 {
        u32::from_be_bytes(self.xid)
    }
}

/// The 40-byte flow match. The listed fields occupy 38 bytes; the
/// trailing pad keeps the wire size at 40.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MatchRaw {
    pub wildcards: [u8; 4],
    pub in_port: [u8; 2],
    pub dl_src: [u8; 6],
    pub dl_dst: [u8; 6],
    pub dl_vlan: [u8; 2],
    pub dl_type: [u8; 2],
    pub nw_src: [u8; 4],
    pub nw_dst: [u8; 4],
    pub nw_proto: u8,
    pub pad: [u8; 3],
    pub tp_src: [u8; 2],
    pub tp_dst: [u8; 2],
    pub pad2: [u8; 2],
}

impl MatchRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn wildcards(&self) -> u32 {
        u32::from_be_bytes(self.wildcards)
    }

    pub fn in_port(&self) -> u16 {
        u16::from_be_bytes(self.in_port)
    }

    pub fn dl_vlan(&self) -> u16 {
        u16::from_be_bytes(self.dl_vlan)
    }

    pub fn dl_type(&self) -> u16 {
        u16::from_be_bytes(self.dl_type)
    }

    pub fn nw_src(&self) -> u32 {
        u32::from_be_bytes(self.nw_src)
    }

    pub fn nw_dst(&self) -> u32 {
        u32::from_be_bytes(self.nw_dst)
    }

    pub fn tp_src(&self) -> u16 {
        u16::from_be_bytes(self.tp_src)
    }

    pub fn tp_dst(&self) -> u16 {
        u16::from_be_bytes(self.tp_dst)
    }
}

/// Description of a physical port.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct PhyPortRaw {
    pub port_no: [u8; 2],
    pub hw_addr: [u8; 6],
    pub name: [u8; 16],
    pub flags: [u8; 4],
    pub speed: [u8; 4],
    pub features: [u8; 4],
}

impl PhyPortRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn port_no(&self) -> u16 {
        u16::from_be_bytes(self.port_no)
    }

    pub fn flags(&self) -> u32 {
        u32::from_be_bytes(self.flags)
    }
}

/// An 8-byte action: a type code followed by a 6-byte argument area
/// whose interpretation depends on the type.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct ActionRaw {
    pub action_type: [u8; 2],
    pub arg: [u8; 6],
}

impl ActionRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn action_type(&self) -> u16 {
        u16::from_be_bytes(self.action_type)
    }
}

/// Fixed part of an ERROR body; the offending bytes follow.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct ErrorRaw {
    pub error_type: [u8; 2],
    pub error_code: [u8; 2],
}

impl ErrorRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn error_type(&self) -> u16 {
        u16::from_be_bytes(self.error_type)
    }

    pub fn error_code(&self) -> u16 {
        u16::from_be_bytes(self.error_code)
    }
}

/// GET_CONFIG_REPLY / SET_CONFIG body.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct SwitchConfigRaw {
    pub flags: [u8; 2],
    pub miss_send_len: [u8; 2],
}

impl SwitchConfigRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn flags(&self) -> u16 {
        u16::from_be_bytes(self.flags)
    }

    pub fn miss_send_len(&self) -> u16 {
        u16::from_be_bytes(self.miss_send_len)
    }
}

/// Fixed part of a FEATURES_REPLY body; phy_port entries follow.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct FeaturesReplyRaw {
    pub datapath_id: [u8; 8],
    pub n_exact: [u8; 4],
    pub n_compression: [u8; 4],
    pub n_general: [u8; 4],
    pub buffer_mb: [u8; 4],
    pub n_buffers: [u8; 4],
    pub capabilities: [u8; 4],
    pub actions: [u8; 4],
}

impl FeaturesReplyRaw {
    pub const SIZE: usize = size_of::<Self>();
}

/// Fixed part of a PACKET_IN body; the frame data follows.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct PacketInRaw {
    pub buffer_id: [u8; 4],
    pub total_len: [u8; 2],
    pub in_port: [u8; 2],
    pub reason: u8,
    pub pad: u8,
}

impl PacketInRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn buffer_id(&self) -> u32 {
        u32::from_be_bytes(self.buffer_id)
    }

    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes(self.total_len)
    }

    pub fn in_port(&self) -> u16 {
        u16::from_be_bytes(self.in_port)
    }
}

/// FLOW_EXPIRED body.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct FlowExpiredRaw {
    pub match_: MatchRaw,
    pub priority: [u8; 2],
    pub pad: [u8; 2],
    pub duration: [u8; 4],
    pub packet_count: [u8; 8],
    pub byte_count: [u8; 8],
}

impl FlowExpiredRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn duration(&self) -> u32 {
        u32::from_be_bytes(self.duration)
    }

    pub fn packet_count(&self) -> u64 {
        u64::from_be_bytes(self.packet_count)
    }

    pub fn byte_count(&self) -> u64 {
        u64::from_be_bytes(self.byte_count)
    }
}

/// PORT_STATUS body.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct PortStatusRaw {
    pub reason: u8,
    pub pad: [u8; 3],
    pub desc: PhyPortRaw,
}

impl PortStatusRaw {
    pub const SIZE: usize = size_of::<Self>();
}

/// Fixed part of a PACKET_OUT body. When `buffer_id` is the no-buffer
/// sentinel the rest of the message is an inline frame emitted to
/// `out_port`; otherwise it is an array of 8-byte actions applied to
/// the buffered packet.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct PacketOutRaw {
    pub buffer_id: [u8; 4],
    pub in_port: [u8; 2],
    pub out_port: [u8; 2],
}

impl PacketOutRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn buffer_id(&self) -> u32 {
        u32::from_be_bytes(self.buffer_id)
    }

    pub fn in_port(&self) -> u16 {
        u16::from_be_bytes(self.in_port)
    }

    pub fn out_port(&self) -> u16 {
        u16::from_be_bytes(self.out_port)
    }
}

/// Fixed part of a FLOW_MOD body; an array of 8-byte actions follows.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct FlowModRaw {
    pub match_: MatchRaw,
    pub command: [u8; 2],
    pub max_idle: [u8; 2],
    pub buffer_id: [u8; 4],
    pub priority: [u8; 2],
    pub pad: [u8; 2],
    pub reserved: [u8; 4],
}

impl FlowModRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn command(&self) -> u16 {
        u16::from_be_bytes(self.command)
    }

    pub fn max_idle(&self) -> u16 {
        u16::from_be_bytes(self.max_idle)
    }

    pub fn buffer_id(&self) -> u32 {
        u32::from_be_bytes(self.buffer_id)
    }

    pub fn priority(&self) -> u16 {
        u16::from_be_bytes(self.priority)
    }
}

/// STATS_REQUEST / STATS_REPLY fixed part; the per-type body follows.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct StatsHeaderRaw {
    pub stats_type: [u8; 2],
    pub flags: [u8; 2],
}

impl StatsHeaderRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn stats_type(&self) -> u16 {
        u16::from_be_bytes(self.stats_type)
    }

    pub fn flags(&self) -> u16 {
        u16::from_be_bytes(self.flags)
    }
}

/// Body of a flow stats request. A `table_id` of 0xff asks for every
/// table.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct FlowStatsRequestRaw {
    pub match_: MatchRaw,
    pub table_id: u8,
    pub pad: [u8; 3],
}

impl FlowStatsRequestRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub const ALL_TABLES: u8 = 0xff;
}

/// One flow entry in a flow stats reply.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct FlowStatsEntryRaw {
    pub match_: MatchRaw,
    pub duration: [u8; 4],
    pub priority: [u8; 2],
    pub table_id: u8,
    pub pad: u8,
    pub packet_count: [u8; 8],
    pub byte_count: [u8; 8],
}

impl FlowStatsEntryRaw {
    pub const SIZE: usize = size_of::<Self>();
}

/// One table entry in a table stats reply.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct TableStatsEntryRaw {
    pub table_id: u8,
    pub pad: [u8; 3],
    pub name: [u8; 16],
    pub max_entries: [u8; 4],
    pub active_count: [u8; 4],
    pub matched_count: [u8; 8],
}

impl TableStatsEntryRaw {
    pub const SIZE: usize = size_of::<Self>();
}

/// One port entry in a port stats reply.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct PortStatsEntryRaw {
    pub port_no: [u8; 2],
    pub pad: [u8; 6],
    pub rx_count: [u8; 8],
    pub tx_count: [u8; 8],
    pub drop_count: [u8; 8],
}

impl PortStatsEntryRaw {
    pub const SIZE: usize = size_of::<Self>();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_sizes() {
        assert_eq!(HeaderRaw::SIZE, 8);
        assert_eq!(MatchRaw::SIZE, 40);
        assert_eq!(PhyPortRaw::SIZE, 36);
        assert_eq!(ActionRaw::SIZE, 8);
        assert_eq!(ErrorRaw::SIZE, 4);
        assert_eq!(SwitchConfigRaw::SIZE, 4);
        assert_eq!(FeaturesReplyRaw::SIZE, 36);
        assert_eq!(PacketInRaw::SIZE, 10);
        assert_eq!(FlowExpiredRaw::SIZE, 64);
        assert_eq!(PortStatusRaw::SIZE, 40);
        assert_eq!(PacketOutRaw::SIZE, 8);
        assert_eq!(FlowModRaw::SIZE, 56);
        assert_eq!(StatsHeaderRaw::SIZE, 4);
        assert_eq!(FlowStatsRequestRaw::SIZE, 44);
        assert_eq!(FlowStatsEntryRaw::SIZE, 64);
        assert_eq!(TableStatsEntryRaw::SIZE, 36);
        assert_eq!(PortStatsEntryRaw::SIZE, 32);
    }

    #[test]
    fn header_accessors() {
        let hdr = HeaderRaw {
            version: crate::OFP_VERSION,
            msg_type: crate::MessageType::FlowMod as u8,
            length: 72u16.to_be_bytes(),
            xid: 0xdead_beefu32.to_be_bytes(),
        };
        assert_eq!(hdr.length(), 72);
        assert_eq!(hdr.xid(), 0xdead_beef);
    }

    #[test]
    fn match_read_back() {
        let mut m = MatchRaw::new_zeroed();
        m.wildcards = crate::wildcard::DL_SRC.to_be_bytes();
        m.in_port = 7u16.to_be_bytes();
        m.nw_src = [10, 0, 0, 1];
        assert_eq!(m.wildcards(), crate::wildcard::DL_SRC);
        assert_eq!(m.in_port(), 7);
        assert_eq!(m.nw_src(), 0x0a00_0001);
    }
}
