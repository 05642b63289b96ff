// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The action executor.
//!
//! Actions run left to right against a uniquely owned frame. Every
//! output leg needs its own copy, but the common case is a single
//! output at the end of the list, so the executor holds each output
//! pending until it knows whether another follows: only then does it
//! clone.

use crate::engine::checksum::recalc16;
use crate::engine::checksum::recalc32;
use crate::engine::datapath::Datapath;
use crate::engine::ether::ETHER_TYPE_IPV4;
use crate::engine::ether::VLAN_PCP_SHIFT;
use crate::engine::ether::VLAN_VID_MASK;
use crate::engine::flow::FlowKey;
use crate::engine::flow::MatchSpec;
use crate::engine::ip4::IPPROTO_TCP;
use crate::engine::ip4::IPPROTO_UDP;
use crate::engine::packet::Frame;
use crate::time::Moment;
use crate::SwitchError;
use ofp::port;
use ofp::wildcard;
use ofp::Action;
use ofp::PacketInReason;
use ofp::MAX_ACTIONS;
use ofp::VLAN_NONE;

/// Offsets within the IPv4 header.
const IP_CSUM_OFF: usize = 10;
const IP_SRC_OFF: usize = 12;
const IP_DST_OFF: usize = 16;

/// Checksum offsets within the transport headers.
const TCP_CSUM_OFF: usize = 16;
const UDP_CSUM_OFF: usize = 6;

/// Admission check for an action program. An output that would send
/// the frame back through the table, to nowhere, or straight out the
/// ingress port loops or blackholes; such programs are refused before
/// the flow enters the chain.
pub fn check_actions(
    actions: &[Action],
    spec: &MatchSpec,
) -> Result<(), SwitchError> {
    if actions.len() > MAX_ACTIONS {
        return Err(SwitchError::BadAction("more actions than supported"));
    }

    for action in actions {
        if let Action::Output { port: out_port, .. } = action {
            if *out_port == port::TABLE || *out_port == port::NONE {
                return Err(SwitchError::BadAction("output to TABLE or NONE"));
            }

            if spec.wildcards & wildcard::IN_PORT == 0
                && *out_port == spec.key.in_port
            {
                return Err(SwitchError::BadAction("output to ingress port"));
            }
        }
    }

    Ok(())
}

/// Run `actions` against `frame`. The key tracks header rewrites so
/// later actions (and the caller) observe the frame's current shape.
pub(crate) fn execute_actions(
    dp: &mut Datapath,
    now: Moment,
    mut frame: Frame,
    in_port: u16,
    key: &mut FlowKey,
    actions: &[Action],
    ignore_no_fwd: bool,
) {
    let mut pending: Option<(u16, u16)> = None;

    for action in actions {
        if let Some((out_port, max_len)) = pending.take() {
            do_output(
                dp,
                now,
                frame.clone(),
                in_port,
                out_port,
                max_len,
                ignore_no_fwd,
            );
        }

        match action {
            Action::Output { port: out_port, max_len } => {
                pending = Some((*out_port, *max_len));
            }
            _ => apply_setter(&mut frame, key, action),
        }
    }

    if let Some((out_port, max_len)) = pending {
        do_output(dp, now, frame, in_port, out_port, max_len, ignore_no_fwd);
    }
    // With no trailing output the frame is consumed here.
}

fn do_output(
    dp: &mut Datapath,
    now: Moment,
    frame: Frame,
    in_port: u16,
    out_port: u16,
    max_len: u16,
    ignore_no_fwd: bool,
) {
    if out_port == port::CONTROLLER {
        let buffer_id = dp.buffers.save(frame.clone(), now);
        dp.output_control(
            frame,
            in_port,
            buffer_id,
            usize::from(max_len),
            PacketInReason::Action,
        );
    } else {
        dp.output_port(now, frame, in_port, out_port, ignore_no_fwd);
    }
}

fn apply_setter(frame: &mut Frame, key: &mut FlowKey, action: &Action) {
    match action {
        Action::SetVlanVid(vid) => {
            if *vid == VLAN_NONE {
                // The all-ones vid doubles as "untag".
                frame.strip_vlan();
                key.dl_vlan = VLAN_NONE;
            } else {
                let vid = vid & VLAN_VID_MASK;
                match frame.vlan_tci() {
                    Some(tci) => {
                        frame.set_vlan_tci(tci & !VLAN_VID_MASK | vid)
                    }
                    None => frame.push_vlan(vid),
                }
                key.dl_vlan = vid;
            }
        }

        Action::SetVlanPcp(pcp) => {
            let pcp_bits = u16::from(pcp & 0x7) << VLAN_PCP_SHIFT;
            match frame.vlan_tci() {
                Some(tci) => {
                    frame.set_vlan_tci(tci & VLAN_VID_MASK | pcp_bits)
                }
                None => frame.push_vlan(pcp_bits),
            }
        }

        Action::StripVlan => {
            frame.strip_vlan();
            key.dl_vlan = VLAN_NONE;
        }

        Action::SetDlSrc(mac) => {
            let bytes = frame.bytes_mut();
            if bytes.len() >= 12 {
                bytes[6..12].copy_from_slice(mac);
                key.dl_src = *mac;
            }
        }

        Action::SetDlDst(mac) => {
            let bytes = frame.bytes_mut();
            if bytes.len() >= 6 {
                bytes[0..6].copy_from_slice(mac);
                key.dl_dst = *mac;
            }
        }

        Action::SetNwSrc(ip) => modify_nw(frame, key, IP_SRC_OFF, *ip),
        Action::SetNwDst(ip) => modify_nw(frame, key, IP_DST_OFF, *ip),

        Action::SetTpSrc(tp) => modify_tp(frame, key, 0, *tp),
        Action::SetTpDst(tp) => modify_tp(frame, key, 2, *tp),

        Action::Output { .. } => unreachable!("outputs handled by caller"),
    }
}

/// Rewrite an IPv4 address, keeping the IP checksum and the
/// transport checksum (whose pseudo-header covers the address)
/// consistent via incremental update.
fn modify_nw(frame: &mut Frame, key: &mut FlowKey, field_off: usize, ip: u32) {
    if key.dl_type != ETHER_TYPE_IPV4 {
        return;
    }

    let Some(l3) = frame.l3() else {
        return;
    };
    let l4 = frame.l4();
    let nw_proto = key.nw_proto;
    let bytes = frame.bytes_mut();

    if bytes.len() < l3 + IP_DST_OFF + 4 {
        return;
    }

    let old: [u8; 4] = [
        bytes[l3 + field_off],
        bytes[l3 + field_off + 1],
        bytes[l3 + field_off + 2],
        bytes[l3 + field_off + 3],
    ];
    let new = ip.to_be_bytes();

    if let Some(l4) = l4 {
        match nw_proto {
            IPPROTO_TCP if bytes.len() >= l4 + TCP_CSUM_OFF + 2 => {
                let csum = get2(bytes, l4 + TCP_CSUM_OFF);
                put2(bytes, l4 + TCP_CSUM_OFF, recalc32(csum, old, new));
            }

            IPPROTO_UDP if bytes.len() >= l4 + UDP_CSUM_OFF + 2 => {
                let csum = get2(bytes, l4 + UDP_CSUM_OFF);
                // An absent UDP checksum stays absent.
                if csum != [0, 0] {
                    let mut updated = recalc32(csum, old, new);
                    if updated == [0, 0] {
                        updated = [0xff, 0xff];
                    }
                    put2(bytes, l4 + UDP_CSUM_OFF, updated);
                }
            }

            _ => (),
        }
    }

    let ip_csum = get2(bytes, l3 + IP_CSUM_OFF);
    put2(bytes, l3 + IP_CSUM_OFF, recalc32(ip_csum, old, new));
    bytes[l3 + field_off..l3 + field_off + 4].copy_from_slice(&new);

    if field_off == IP_SRC_OFF {
        key.nw_src = ip;
    } else {
        key.nw_dst = ip;
    }
}

/// Rewrite a transport port with its checksum.
fn modify_tp(frame: &mut Frame, key: &mut FlowKey, field_off: usize, tp: u16) {
    if key.dl_type != ETHER_TYPE_IPV4 {
        return;
    }

    let Some(l4) = frame.l4() else {
        return;
    };
    let nw_proto = key.nw_proto;
    let bytes = frame.bytes_mut();

    let csum_off = match nw_proto {
        IPPROTO_TCP => TCP_CSUM_OFF,
        IPPROTO_UDP => UDP_CSUM_OFF,
        _ => return,
    };

    if bytes.len() < l4 + csum_off.max(field_off) + 2 {
        return;
    }

    let old = get2(bytes, l4 + field_off);
    let new = tp.to_be_bytes();

    let csum = get2(bytes, l4 + csum_off);
    if nw_proto == IPPROTO_UDP {
        if csum != [0, 0] {
            let mut updated = recalc16(csum, old, new);
            if updated == [0, 0] {
                updated = [0xff, 0xff];
            }
            put2(bytes, l4 + csum_off, updated);
        }
    } else {
        put2(bytes, l4 + csum_off, recalc16(csum, old, new));
    }

    bytes[l4 + field_off..l4 + field_off + 2].copy_from_slice(&new);

    if field_off == 0 {
        key.tp_src = tp;
    } else {
        key.tp_dst = tp;
    }
}

fn get2(bytes: &[u8], off: usize) -> [u8; 2] {
    [bytes[off], bytes[off + 1]]
}

fn put2(bytes: &mut [u8], off: usize, val: [u8; 2]) {
    bytes[off..off + 2].copy_from_slice(&val);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn loop_targets_rejected() {
        let key = FlowKey { in_port: 2, ..Default::default() };
        let spec = MatchSpec::exact(key);

        let to_table = [Action::Output { port: port::TABLE, max_len: 0 }];
        assert!(check_actions(&to_table, &spec).is_err());

        let to_none = [Action::Output { port: port::NONE, max_len: 0 }];
        assert!(check_actions(&to_none, &spec).is_err());

        let to_ingress = [Action::Output { port: 2, max_len: 0 }];
        assert!(check_actions(&to_ingress, &spec).is_err());

        let fine = [Action::Output { port: 3, max_len: 0 }];
        assert!(check_actions(&fine, &spec).is_ok());
    }

    #[test]
    fn wildcarded_ingress_is_not_a_loop() {
        let mut raw = MatchSpec::exact(FlowKey::default()).to_wire();
        raw.wildcards = wildcard::IN_PORT.to_be_bytes();
        let spec = MatchSpec::from_wire(&raw);

        let actions = [Action::Output { port: 0, max_len: 0 }];
        assert!(check_actions(&actions, &spec).is_ok());
    }

    #[test]
    fn program_length_bounded() {
        let spec = MatchSpec::exact(FlowKey::default());
        let actions =
            vec![Action::StripVlan; MAX_ACTIONS + 1];
        assert!(check_actions(&actions, &spec).is_err());
    }
}
