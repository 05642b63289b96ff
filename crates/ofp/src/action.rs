// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded actions and their 8-byte wire form.

use crate::wire::ActionRaw;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;

pub const ETHER_ADDR_LEN: usize = 6;

pub type EtherAddr = [u8; ETHER_ADDR_LEN];

/// Upper bound on the length of a flow's action program.
pub const MAX_ACTIONS: usize = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum ActionType {
    Output = 0,
    SetVlanVid = 1,
    SetVlanPcp = 2,
    StripVlan = 3,
    SetDlSrc = 4,
    SetDlDst = 5,
    SetNwSrc = 6,
    SetNwDst = 7,
    SetTpSrc = 8,
    SetTpDst = 9,
}

/// Bitmask of every action type this protocol version defines,
/// advertised in the features reply.
pub const ALL_ACTIONS_MASK: u32 = (1 << 10) - 1;

/// A single decoded action. IPv4 addresses are host order; the wire
/// codec converts.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Action {
    Output { port: u16, max_len: u16 },
    SetVlanVid(u16),
    SetVlanPcp(u8),
    StripVlan,
    SetDlSrc(EtherAddr),
    SetDlDst(EtherAddr),
    SetNwSrc(u32),
    SetNwDst(u32),
    SetTpSrc(u16),
    SetTpDst(u16),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownActionType(pub u16);

impl Display for UnknownActionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown action type {}", self.0)
    }
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Output { .. } => ActionType::Output,
            Self::SetVlanVid(_) => ActionType::SetVlanVid,
            Self::SetVlanPcp(_) => ActionType::SetVlanPcp,
            Self::StripVlan => ActionType::StripVlan,
            Self::SetDlSrc(_) => ActionType::SetDlSrc,
            Self::SetDlDst(_) => ActionType::SetDlDst,
            Self::SetNwSrc(_) => ActionType::SetNwSrc,
            Self::SetNwDst(_) => ActionType::SetNwDst,
            Self::SetTpSrc(_) => ActionType::SetTpSrc,
            Self::SetTpDst(_) => ActionType::SetTpDst,
        }
    }

    pub fn from_wire(raw: &ActionRaw) -> Result<Self, UnknownActionType> {
        let arg = &raw.arg;

        let action = match raw.action_type() {
            0 => Self::Output {
                max_len: u16::from_be_bytes([arg[0], arg[1]]),
                port: u16::from_be_bytes([arg[2], arg[3]]),
            },
            1 => Self::SetVlanVid(u16::from_be_bytes([arg[0], arg[1]])),
            2 => Self::SetVlanPcp(arg[0]),
            3 => Self::StripVlan,
            4 => Self::SetDlSrc(*arg),
            5 => Self::SetDlDst(*arg),
            6 => Self::SetNwSrc(u32::from_be_bytes([
                arg[2], arg[3], arg[4], arg[5],
            ])),
            7 => Self::SetNwDst(u32::from_be_bytes([
                arg[2], arg[3], arg[4], arg[5],
            ])),
            8 => Self::SetTpSrc(u16::from_be_bytes([arg[0], arg[1]])),
            9 => Self::SetTpDst(u16::from_be_bytes([arg[0], arg[1]])),
            other => return Err(UnknownActionType(other)),
        };

        Ok(action)
    }

    pub fn to_wire(&self) -> ActionRaw {
        let mut arg = [0u8; 6];

        match self {
            Self::Output { port, max_len } => {
                arg[0..2].copy_from_slice(&max_len.to_be_bytes());
                arg[2..4].copy_from_slice(&port.to_be_bytes());
            }

            Self::SetVlanVid(vid) => {
                arg[0..2].copy_from_slice(&vid.to_be_bytes());
            }

            Self::SetVlanPcp(pcp) => {
                arg[0] = *pcp;
            }

            Self::StripVlan => (),

            Self::SetDlSrc(mac) | Self::SetDlDst(mac) => {
                arg.copy_from_slice(mac);
            }

            Self::SetNwSrc(ip) | Self::SetNwDst(ip) => {
                arg[2..6].copy_from_slice(&ip.to_be_bytes());
            }

            Self::SetTpSrc(tp) | Self::SetTpDst(tp) => {
                arg[0..2].copy_from_slice(&tp.to_be_bytes());
            }
        }

        ActionRaw {
            action_type: (self.action_type() as u16).to_be_bytes(),
            arg,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Output { port, max_len } => {
                write!(f, "output(port={}, max_len={})", port, max_len)
            }
            Self::SetVlanVid(vid) => write!(f, "set_vlan_vid({})", vid),
            Self::SetVlanPcp(pcp) => write!(f, "set_vlan_pcp({})", pcp),
            Self::StripVlan => write!(f, "strip_vlan"),
            Self::SetDlSrc(m) => write!(
                f,
                "set_dl_src({:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x})",
                m[0], m[1], m[2], m[3], m[4], m[5]
            ),
            Self::SetDlDst(m) => write!(
                f,
                "set_dl_dst({:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x})",
                m[0], m[1], m[2], m[3], m[4], m[5]
            ),
            Self::SetNwSrc(ip) => {
                let b = ip.to_be_bytes();
                write!(f, "set_nw_src({}.{}.{}.{})", b[0], b[1], b[2], b[3])
            }
            Self::SetNwDst(ip) => {
                let b = ip.to_be_bytes();
                write!(f, "set_nw_dst({}.{}.{}.{})", b[0], b[1], b[2], b[3])
            }
            Self::SetTpSrc(tp) => write!(f, "set_tp_src({})", tp),
            Self::SetTpDst(tp) => write!(f, "set_tp_dst({})", tp),
        }
    }
}

/// Decode a packed action array. The slice length must be a multiple
/// of the 8-byte action size.
pub fn decode_actions(
    bytes: &[u8],
) -> Result<Vec<Action>, ActionDecodeError> {
    if bytes.len() % ActionRaw::SIZE != 0 {
        return Err(ActionDecodeError::BadLength(bytes.len()));
    }

    let mut actions = Vec::with_capacity(bytes.len() / ActionRaw::SIZE);
    for chunk in bytes.chunks_exact(ActionRaw::SIZE) {
        let raw = ActionRaw::read_from(chunk)
            .ok_or(ActionDecodeError::BadLength(bytes.len()))?;
        actions
            .push(Action::from_wire(&raw).map_err(ActionDecodeError::Unknown)?);
    }

    Ok(actions)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActionDecodeError {
    BadLength(usize),
    Unknown(UnknownActionType),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn action_codec_round_trip() {
        let actions = [
            Action::Output { port: 3, max_len: 0 },
            Action::Output { port: crate::port::CONTROLLER, max_len: 128 },
            Action::SetVlanVid(0x123),
            Action::SetVlanPcp(5),
            Action::StripVlan,
            Action::SetDlSrc([0x02, 0x08, 0x20, 0xaa, 0xbb, 0xcc]),
            Action::SetDlDst([0xff; 6]),
            Action::SetNwSrc(0x0a000001),
            Action::SetNwDst(0x02020202),
            Action::SetTpSrc(4021),
            Action::SetTpDst(443),
        ];

        for a in actions {
            let raw = a.to_wire();
            assert_eq!(Action::from_wire(&raw), Ok(a));
        }
    }

    #[test]
    fn unknown_type_rejected() {
        let raw = ActionRaw { action_type: 10u16.to_be_bytes(), arg: [0; 6] };
        assert_eq!(Action::from_wire(&raw), Err(UnknownActionType(10)));
    }

    #[test]
    fn decode_packed_array() {
        let a = Action::Output { port: 5, max_len: 0 };
        let b = Action::SetNwDst(0x0a000002);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(zerocopy::AsBytes::as_bytes(&a.to_wire()));
        bytes.extend_from_slice(zerocopy::AsBytes::as_bytes(&b.to_wire()));

        assert_eq!(decode_actions(&bytes).unwrap(), vec![a, b]);

        bytes.push(0);
        assert!(matches!(
            decode_actions(&bytes),
            Err(ActionDecodeError::BadLength(_))
        ));
    }
}
