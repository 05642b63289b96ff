// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The OpenFlow 0x83 wire protocol.
//!
//! This crate defines the byte-level layout of every message exchanged
//! between a datapath and its controller: the fixed 8-byte header, the
//! 40-byte flow match, the 8-byte action, the per-type message bodies,
//! and the protocol's many constants and sentinels. It performs no I/O
//! and holds no state; the engine crate interprets these types.
//!
//! All multi-byte integers on the wire are network byte order. Raw
//! structs store them as `[u8; N]` so the types stay `Unaligned` and
//! can be overlaid on arbitrary buffer offsets; accessors perform the
//! byte-order conversion.

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod action;
pub mod message;
pub mod wire;

pub use action::*;
pub use message::*;
pub use wire::*;

/// The protocol version this crate speaks.
pub const OFP_VERSION: u8 = 0x83;

/// Length of the fixed header that prefixes every message.
pub const OFP_HEADER_LEN: usize = 8;

/// Bytes of a miss punted to the controller when the datapath has not
/// been configured otherwise.
pub const DEFAULT_MISS_SEND_LEN: u16 = 128;

/// Buffer id meaning "no packet buffered".
pub const NO_BUFFER: u32 = 0xffff_ffff;

/// `dl_vlan` value meaning the frame carries no 802.1Q tag.
pub const VLAN_NONE: u16 = 0xffff;

/// Timeout value disabling idle or hard expiration.
pub const FLOW_PERMANENT: u16 = 0;

/// EtherTypes below this cutoff are 802.3 lengths, not types.
pub const DL_TYPE_ETH2_CUTOFF: u16 = 0x0600;

/// `dl_type` sentinel for 802.2 frames with no SNAP EtherType.
pub const DL_TYPE_NOT_ETH_TYPE: u16 = 0x05ff;

/// Port numbers. Physical ports count up from 0; the values at the top
/// of the range name pseudo-ports.
pub mod port {
    /// Ceiling (exclusive) on physical port numbers.
    pub const MAX: u16 = 0xff00;
    /// Perform actions in the flow table (packet-out only).
    pub const TABLE: u16 = 0xfff9;
    /// Process with normal L2/L3 switching.
    pub const NORMAL: u16 = 0xfffa;
    /// All physical ports except ingress and those marked no-flood.
    pub const FLOOD: u16 = 0xfffb;
    /// All physical ports except ingress.
    pub const ALL: u16 = 0xfffc;
    /// Punt to the controller.
    pub const CONTROLLER: u16 = 0xfffd;
    /// The local host-stack pseudo-port.
    pub const LOCAL: u16 = 0xfffe;
    /// Not associated with any port.
    pub const NONE: u16 = 0xffff;
}

/// Flow wildcard bits. Ten single-field flags occupy the low bits; two
/// 6-bit counts give the number of low-order IP address bits to ignore.
pub mod wildcard {
    pub const IN_PORT: u32 = 1 << 0;
    pub const DL_VLAN: u32 = 1 << 1;
    pub const DL_SRC: u32 = 1 << 2;
    pub const DL_DST: u32 = 1 << 3;
    pub const DL_TYPE: u32 = 1 << 4;
    pub const NW_SRC: u32 = 1 << 5;
    pub const NW_DST: u32 = 1 << 6;
    pub const NW_PROTO: u32 = 1 << 7;
    pub const TP_SRC: u32 = 1 << 8;
    pub const TP_DST: u32 = 1 << 9;

    pub const NW_SRC_SHIFT: u32 = 10;
    pub const NW_DST_SHIFT: u32 = 16;
    pub const NW_BITS_MASK: u32 = 0x3f;
    pub const NW_SRC_BITS: u32 = NW_BITS_MASK << NW_SRC_SHIFT;
    pub const NW_DST_BITS: u32 = NW_BITS_MASK << NW_DST_SHIFT;

    /// Every network-layer wildcard: both full-field flags, the
    /// protocol flag, and both prefix counts saturated.
    pub const NW: u32 = NW_SRC | NW_DST | NW_PROTO | NW_SRC_BITS | NW_DST_BITS;
    /// Both transport-port wildcards.
    pub const TP: u32 = TP_SRC | TP_DST;

    pub const ALL: u32 = (1 << 22) - 1;

    /// Number of low-order source-address bits to ignore.
    pub fn nw_src_bits(wildcards: u32) -> u32 {
        (wildcards >> NW_SRC_SHIFT) & NW_BITS_MASK
    }

    /// Number of low-order destination-address bits to ignore.
    pub fn nw_dst_bits(wildcards: u32) -> u32 {
        (wildcards >> NW_DST_SHIFT) & NW_BITS_MASK
    }
}

/// Per-port behavior flags carried in `phy_port.flags`.
pub mod port_flags {
    /// Exclude this port when flooding.
    pub const NO_FLOOD: u32 = 1 << 0;
    /// Drop every frame received on this port.
    pub const NO_RECV: u32 = 1 << 1;
    /// Drop 802.1D spanning-tree frames received on this port.
    pub const NO_RECV_STP: u32 = 1 << 2;
    /// Drop frames output to this port.
    pub const NO_FWD: u32 = 1 << 3;
}

/// Datapath configuration flags.
pub mod config {
    /// Notify the controller of expired flow entries.
    pub const SEND_FLOW_EXP: u16 = 1 << 0;

    pub const FRAG_SHIFT: u16 = 1;
    pub const FRAG_MASK: u16 = 0x3 << FRAG_SHIFT;
    /// Fragments pass through table lookup like any other frame.
    pub const FRAG_NORMAL: u16 = 0;
    /// Fragments are discarded before lookup.
    pub const FRAG_DROP: u16 = 1;
}

/// Capability bits advertised in the features reply.
pub mod capability {
    pub const FLOW_STATS: u32 = 1 << 0;
    pub const TABLE_STATS: u32 = 1 << 1;
    pub const PORT_STATS: u32 = 1 << 2;
    pub const STP: u32 = 1 << 3;
    pub const MULTI_PHY_TX: u32 = 1 << 4;
}

/// Message type codes. Code 12 is reserved.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum MessageType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    Vendor = 4,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    GetConfigRequest = 7,
    GetConfigReply = 8,
    SetConfig = 9,
    PacketIn = 10,
    FlowExpired = 11,
    PortMod = 13,
    PortStatus = 14,
    PacketOut = 15,
    FlowMod = 16,
    StatsRequest = 17,
    StatsReply = 18,
}

impl MessageType {
    pub fn from_u8(code: u8) -> Option<Self> {
        use MessageType::*;

        let t = match code {
            0 => Hello,
            1 => Error,
            2 => EchoRequest,
            3 => EchoReply,
            4 => Vendor,
            5 => FeaturesRequest,
            6 => FeaturesReply,
            7 => GetConfigRequest,
            8 => GetConfigReply,
            9 => SetConfig,
            10 => PacketIn,
            11 => FlowExpired,
            13 => PortMod,
            14 => PortStatus,
            15 => PacketOut,
            16 => FlowMod,
            17 => StatsRequest,
            18 => StatsReply,
            _ => return None,
        };

        Some(t)
    }

    /// Minimum body length (bytes beyond the fixed header) a message of
    /// this type must carry to be well-formed.
    pub fn min_body_len(&self) -> usize {
        use MessageType::*;

        match self {
            Hello | EchoRequest | EchoReply | Vendor => 0,
            Error => wire::ErrorRaw::SIZE,
            FeaturesRequest | GetConfigRequest => 0,
            FeaturesReply => wire::FeaturesReplyRaw::SIZE,
            GetConfigReply | SetConfig => wire::SwitchConfigRaw::SIZE,
            PacketIn => wire::PacketInRaw::SIZE,
            FlowExpired => wire::FlowExpiredRaw::SIZE,
            PortMod => wire::PhyPortRaw::SIZE,
            PortStatus => wire::PortStatusRaw::SIZE,
            PacketOut => wire::PacketOutRaw::SIZE,
            FlowMod => wire::FlowModRaw::SIZE,
            StatsRequest | StatsReply => wire::StatsHeaderRaw::SIZE,
        }
    }

    /// Types exempt from the version check: connection setup and
    /// liveness must interoperate across versions.
    pub fn version_exempt(&self) -> bool {
        use MessageType::*;

        matches!(self, Hello | Error | EchoRequest | EchoReply | Vendor)
    }
}

/// Flow-mod commands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum FlowModCommand {
    Add = 0,
    Modify = 1,
    ModifyStrict = 2,
    Delete = 3,
    DeleteStrict = 4,
}

impl FlowModCommand {
    pub fn from_u16(code: u16) -> Option<Self> {
        let c = match code {
            0 => Self::Add,
            1 => Self::Modify,
            2 => Self::ModifyStrict,
            3 => Self::Delete,
            4 => Self::DeleteStrict,
            _ => return None,
        };

        Some(c)
    }
}

/// Statistics request/reply types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum StatsType {
    Flow = 0,
    Table = 1,
    Port = 2,
}

impl StatsType {
    pub fn from_u16(code: u16) -> Option<Self> {
        let t = match code {
            0 => Self::Flow,
            1 => Self::Table,
            2 => Self::Port,
            _ => return None,
        };

        Some(t)
    }
}

/// The MORE bit in a stats reply's flags word.
pub const STATS_REPLY_MORE: u16 = 1 << 0;

/// Why a packet was punted to the controller.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[repr(u8)]
pub enum PacketInReason {
    NoMatch = 0,
    Action = 1,
}

/// What changed about a physical port.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PortStatusReason {
    Add = 0,
    Delete = 1,
    Modify = 2,
}

/// Error kinds reported to the controller, carried in the
/// `error_type` field of an ERROR message.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[repr(u16)]
pub enum ErrorKind {
    BadVersion = 0,
    BadType = 1,
    BadLength = 2,
    BadAction = 3,
    BufferUnknown = 4,
    FlowTableFull = 5,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::BadVersion => "bad version",
            Self::BadType => "bad type",
            Self::BadLength => "bad length",
            Self::BadAction => "bad action",
            Self::BufferUnknown => "buffer unknown",
            Self::FlowTableFull => "flow table full",
        };

        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn message_type_codes() {
        for code in 0..=18u8 {
            match MessageType::from_u8(code) {
                Some(t) => assert_eq!(t as u8, code),
                None => assert_eq!(code, 12),
            }
        }
        assert!(MessageType::from_u8(19).is_none());
    }

    #[test]
    fn wildcard_bit_fields() {
        let w = wildcard::ALL;
        assert_eq!(wildcard::nw_src_bits(w), 63);
        assert_eq!(wildcard::nw_dst_bits(w), 63);

        let w = 24 << wildcard::NW_SRC_SHIFT;
        assert_eq!(wildcard::nw_src_bits(w), 24);
        assert_eq!(wildcard::nw_dst_bits(w), 0);
    }
}
