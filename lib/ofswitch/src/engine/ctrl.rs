// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control-message dispatch.
//!
//! Every inbound message passes the same gate: a readable header, a
//! known type, the right version (liveness and setup types excepted),
//! a self-consistent length, and the type's minimum body. A failure
//! produces a typed error reply and no state change; a handler that
//! fails partway commits nothing.

use crate::engine::action::check_actions;
use crate::engine::action::execute_actions;
use crate::engine::datapath::Datapath;
use crate::engine::flow::Flow;
use crate::engine::flow::MatchSpec;
use crate::engine::packet::Frame;
use crate::engine::parse::flow_extract;
use crate::time::Moment;
use ofp::config;
use ofp::decode_actions;
use ofp::ActionDecodeError;
use ofp::ErrorKind;
use ofp::FlowModCommand;
use ofp::FlowModRaw;
use ofp::FlowStatsEntryRaw;
use ofp::FlowStatsRequestRaw;
use ofp::HeaderRaw;
use ofp::MessageBuilder;
use ofp::MessageType;
use ofp::PacketOutRaw;
use ofp::PhyPortRaw;
use ofp::PortStatsEntryRaw;
use ofp::StatsHeaderRaw;
use ofp::StatsType;
use ofp::SwitchConfigRaw;
use ofp::TableStatsEntryRaw;
use ofp::FLOW_PERMANENT;
use ofp::NO_BUFFER;
use ofp::OFP_HEADER_LEN;
use ofp::OFP_VERSION;
use ofp::STATS_REPLY_MORE;
use std::sync::Arc;
use tracing::debug;
use tracing::warn;
use zerocopy::FromBytes;
use zerocopy::FromZeroes;

/// Flow entries per stats reply part.
const FLOW_STATS_PER_REPLY: usize = 32;

/// Validate and dispatch one control message.
pub fn control_input(dp: &mut Datapath, msg: &[u8], now: Moment) {
    let Some(hdr) = HeaderRaw::read_from_prefix(msg) else {
        dp.send_error(ErrorKind::BadLength, 0, 0, msg);
        return;
    };
    let xid = hdr.xid();

    let Some(msg_type) = MessageType::from_u8(hdr.msg_type) else {
        dp.send_error(ErrorKind::BadType, u16::from(hdr.msg_type), xid, msg);
        return;
    };

    if hdr.version != OFP_VERSION && !msg_type.version_exempt() {
        dp.send_error(ErrorKind::BadVersion, u16::from(hdr.version), xid, msg);
        return;
    }

    let declared = usize::from(hdr.length());
    if declared < OFP_HEADER_LEN || declared > msg.len() {
        dp.send_error(ErrorKind::BadLength, 0, xid, msg);
        return;
    }
    let msg = &msg[..declared];
    let body = &msg[OFP_HEADER_LEN..];

    if body.len() < msg_type.min_body_len() {
        dp.send_error(ErrorKind::BadLength, 0, xid, msg);
        return;
    }

    match msg_type {
        MessageType::Hello => (),

        MessageType::EchoRequest => {
            let mut reply = MessageBuilder::new(MessageType::EchoReply, xid);
            reply.push_bytes(body);
            dp.remote.send(reply.finish());
        }

        MessageType::EchoReply => (),

        MessageType::Error => {
            // The peer is complaining; nothing to change, and
            // replying with another error would only echo back and
            // forth.
            warn!(xid, "controller reported an error");
        }

        MessageType::FeaturesRequest => dp.send_features_reply(xid),

        MessageType::GetConfigRequest => {
            let body = SwitchConfigRaw {
                flags: dp.config.flags.to_be_bytes(),
                miss_send_len: dp.config.miss_send_len.to_be_bytes(),
            };
            let mut reply =
                MessageBuilder::new(MessageType::GetConfigReply, xid);
            reply.push(&body);
            dp.remote.send(reply.finish());
        }

        MessageType::SetConfig => recv_set_config(dp, body),

        MessageType::PacketOut => recv_packet_out(dp, msg, body, xid, now),

        MessageType::FlowMod => recv_flow_mod(dp, msg, body, xid, now),

        MessageType::PortMod => {
            if let Some(desc) = PhyPortRaw::read_from_prefix(body) {
                dp.update_port_flags(&desc);
            }
        }

        MessageType::StatsRequest => {
            recv_stats_request(dp, msg, body, xid, now)
        }

        // Datapath-to-controller types and vendor extensions have no
        // handler here.
        MessageType::Vendor
        | MessageType::FeaturesReply
        | MessageType::GetConfigReply
        | MessageType::PacketIn
        | MessageType::FlowExpired
        | MessageType::PortStatus
        | MessageType::StatsReply => {
            dp.send_error(
                ErrorKind::BadType,
                u16::from(hdr.msg_type),
                xid,
                msg,
            );
        }
    }
}

fn recv_set_config(dp: &mut Datapath, body: &[u8]) {
    let Some(raw) = SwitchConfigRaw::read_from_prefix(body) else {
        return;
    };

    let mut flags = raw.flags();
    let frag = (flags & config::FRAG_MASK) >> config::FRAG_SHIFT;
    if frag != config::FRAG_NORMAL && frag != config::FRAG_DROP {
        // Unknown fragment handling coerces to the safe choice.
        flags = (flags & !config::FRAG_MASK)
            | (config::FRAG_DROP << config::FRAG_SHIFT);
    }

    dp.config.flags = flags;
    dp.config.miss_send_len = raw.miss_send_len();
}

/// Map an action-array decode failure onto the wire error it earns.
fn action_decode_error(
    dp: &mut Datapath,
    err: ActionDecodeError,
    xid: u32,
    msg: &[u8],
) {
    match err {
        ActionDecodeError::BadLength(_) => {
            dp.send_error(ErrorKind::BadLength, 0, xid, msg)
        }
        ActionDecodeError::Unknown(t) => {
            dp.send_error(ErrorKind::BadAction, t.0, xid, msg)
        }
    }
}

fn recv_packet_out(
    dp: &mut Datapath,
    msg: &[u8],
    body: &[u8],
    xid: u32,
    now: Moment,
) {
    let Some(raw) = PacketOutRaw::read_from_prefix(body) else {
        return;
    };
    let rest = &body[PacketOutRaw::SIZE..];
    let in_port = raw.in_port();

    if raw.buffer_id() == NO_BUFFER {
        // Inline frame, emitted as-is toward out_port.
        let frame = Frame::new(rest.to_vec());
        dp.output_port(now, frame, in_port, raw.out_port(), true);
        return;
    }

    let actions = match decode_actions(rest) {
        Ok(actions) => actions,
        Err(err) => return action_decode_error(dp, err, xid, msg),
    };

    let mut frame = match dp.buffers.retrieve(raw.buffer_id()) {
        Ok(frame) => frame,
        Err(_) => {
            dp.send_error(ErrorKind::BufferUnknown, 0, xid, msg);
            return;
        }
    };

    let (mut key, _) = flow_extract(&mut frame, in_port);
    execute_actions(dp, now, frame, in_port, &mut key, &actions, true);
}

fn recv_flow_mod(
    dp: &mut Datapath,
    msg: &[u8],
    body: &[u8],
    xid: u32,
    now: Moment,
) {
    let Some(raw) = FlowModRaw::read_from_prefix(body) else {
        return;
    };
    let rest = &body[FlowModRaw::SIZE..];

    let Some(command) = FlowModCommand::from_u16(raw.command()) else {
        dp.send_error(ErrorKind::BadType, raw.command(), xid, msg);
        return;
    };

    let spec = MatchSpec::from_wire(&raw.match_);

    match command {
        FlowModCommand::Add => add_flow(dp, &raw, spec, rest, xid, msg, now),

        FlowModCommand::Modify | FlowModCommand::ModifyStrict => {
            let actions = match decode_actions(rest) {
                Ok(actions) => actions,
                Err(err) => return action_decode_error(dp, err, xid, msg),
            };

            if check_actions(&actions, &spec).is_err() {
                dp.send_error(ErrorKind::BadAction, 0, xid, msg);
                return;
            }

            let strict = command == FlowModCommand::ModifyStrict;
            let n = dp.chain.replace_actions(
                &spec,
                raw.priority(),
                strict,
                &actions,
            );
            debug!(n, strict, "flow action programs replaced");
        }

        FlowModCommand::Delete | FlowModCommand::DeleteStrict => {
            let strict = command == FlowModCommand::DeleteStrict;
            let n = dp.chain.delete(&spec, raw.priority(), strict);
            debug!(n, strict, "flows deleted");
        }
    }
}

fn add_flow(
    dp: &mut Datapath,
    raw: &FlowModRaw,
    spec: MatchSpec,
    actions_bytes: &[u8],
    xid: u32,
    msg: &[u8],
    now: Moment,
) {
    let discard_buffer = |dp: &mut Datapath| {
        if raw.buffer_id() != NO_BUFFER {
            dp.buffers.discard(raw.buffer_id());
        }
    };

    let actions = match decode_actions(actions_bytes) {
        Ok(actions) => actions,
        Err(err) => {
            discard_buffer(dp);
            return action_decode_error(dp, err, xid, msg);
        }
    };

    if let Err(err) = check_actions(&actions, &spec) {
        debug!(%err, "flow add refused");
        discard_buffer(dp);
        dp.send_error(ErrorKind::BadAction, 0, xid, msg);
        return;
    }

    let flow = Arc::new(Flow::new(
        spec,
        raw.priority(),
        raw.max_idle(),
        FLOW_PERMANENT,
        actions.clone(),
        now,
    ));

    match dp.chain.insert(flow.clone()) {
        Ok(table) => {
            debug!(key = %flow.key(), table, "flow installed");
        }
        Err(_) => {
            discard_buffer(dp);
            dp.send_error(ErrorKind::FlowTableFull, 0, xid, msg);
            return;
        }
    }

    // The add may carry a parked packet to run through the new flow.
    if raw.buffer_id() != NO_BUFFER {
        match dp.buffers.retrieve(raw.buffer_id()) {
            Ok(mut frame) => {
                flow.used(now, frame.len());
                let in_port = raw.match_.in_port();
                let (mut key, _) = flow_extract(&mut frame, in_port);
                execute_actions(
                    dp, now, frame, in_port, &mut key, &actions, false,
                );
            }
            Err(_) => dp.send_error(ErrorKind::BufferUnknown, 0, xid, msg),
        }
    }
}

fn recv_stats_request(
    dp: &mut Datapath,
    msg: &[u8],
    body: &[u8],
    xid: u32,
    now: Moment,
) {
    let Some(raw) = StatsHeaderRaw::read_from_prefix(body) else {
        return;
    };
    let rest = &body[StatsHeaderRaw::SIZE..];

    let Some(stats_type) = StatsType::from_u16(raw.stats_type()) else {
        dp.send_error(ErrorKind::BadType, raw.stats_type(), xid, msg);
        return;
    };

    match stats_type {
        StatsType::Flow => {
            let Some(req) = FlowStatsRequestRaw::read_from_prefix(rest) else {
                dp.send_error(ErrorKind::BadLength, 0, xid, msg);
                return;
            };
            flow_stats_reply(dp, xid, &req, now);
        }

        StatsType::Table => {
            let mut reply = stats_reply(xid, StatsType::Table, 0);
            for (table_id, stats) in dp.chain.stats().iter().enumerate() {
                let mut entry = TableStatsEntryRaw::new_zeroed();
                entry.table_id = table_id as u8;
                let n = stats.name.len().min(entry.name.len() - 1);
                entry.name[..n]
                    .copy_from_slice(&stats.name.as_bytes()[..n]);
                entry.max_entries = stats.max_flows.to_be_bytes();
                entry.active_count = stats.n_flows.to_be_bytes();
                entry.matched_count = stats.matched.to_be_bytes();
                reply.push(&entry);
            }
            dp.remote.send(reply.finish());
        }

        StatsType::Port => {
            let mut reply = stats_reply(xid, StatsType::Port, 0);
            for port in dp.ports.iter() {
                let counters = port.counters();
                let entry = PortStatsEntryRaw {
                    port_no: port.port_no().to_be_bytes(),
                    pad: [0; 6],
                    rx_count: counters.rx_count.to_be_bytes(),
                    tx_count: counters.tx_count.to_be_bytes(),
                    drop_count: counters.drop_count.to_be_bytes(),
                };
                reply.push(&entry);
            }
            dp.remote.send(reply.finish());
        }
    }
}

fn stats_reply(xid: u32, stats_type: StatsType, flags: u16) -> MessageBuilder {
    let mut reply = MessageBuilder::new(MessageType::StatsReply, xid);
    reply.push(&StatsHeaderRaw {
        stats_type: (stats_type as u16).to_be_bytes(),
        flags: flags.to_be_bytes(),
    });
    reply
}

/// Flow stats may outgrow one message; parts carry the MORE flag on
/// every reply but the last.
fn flow_stats_reply(
    dp: &mut Datapath,
    xid: u32,
    req: &FlowStatsRequestRaw,
    now: Moment,
) {
    let tmpl = MatchSpec::from_wire(&req.match_);

    let entries: Vec<FlowStatsEntryRaw> = dp
        .chain
        .matching(&tmpl, 0, false)
        .into_iter()
        .filter(|(table_id, _)| {
            req.table_id == FlowStatsRequestRaw::ALL_TABLES
                || *table_id == req.table_id
        })
        .map(|(table_id, flow)| FlowStatsEntryRaw {
            match_: flow.spec().to_wire(),
            duration: flow.duration_secs(now).to_be_bytes(),
            priority: flow.priority().to_be_bytes(),
            table_id,
            pad: 0,
            packet_count: flow.packet_count().to_be_bytes(),
            byte_count: flow.byte_count().to_be_bytes(),
        })
        .collect();

    if entries.is_empty() {
        dp.remote.send(stats_reply(xid, StatsType::Flow, 0).finish());
        return;
    }

    let mut chunks = entries.chunks(FLOW_STATS_PER_REPLY).peekable();
    while let Some(chunk) = chunks.next() {
        let flags =
            if chunks.peek().is_some() { STATS_REPLY_MORE } else { 0 };
        let mut reply = stats_reply(xid, StatsType::Flow, flags);
        for entry in chunk {
            reply.push(entry);
        }
        dp.remote.send(reply.finish());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ofp::Action;
    use ofp::ActionRaw;
    use ofp::MatchRaw;
    use zerocopy::AsBytes;

    fn dp() -> Datapath {
        Datapath::new(Some(0x42))
    }

    fn first_reply(dp: &mut Datapath) -> Vec<u8> {
        let mut out = dp.remote.drain_outbound();
        assert!(!out.is_empty(), "expected a reply");
        out.remove(0)
    }

    fn reply_header(reply: &[u8]) -> HeaderRaw {
        HeaderRaw::read_from_prefix(reply).unwrap()
    }

    fn flow_mod_msg(
        command: FlowModCommand,
        match_: MatchRaw,
        priority: u16,
        actions: &[Action],
    ) -> Vec<u8> {
        let mut body = FlowModRaw::new_zeroed();
        body.match_ = match_;
        body.command = (command as u16).to_be_bytes();
        body.buffer_id = NO_BUFFER.to_be_bytes();
        body.priority = priority.to_be_bytes();

        let mut msg = MessageBuilder::new(MessageType::FlowMod, 1);
        msg.push(&body);
        for a in actions {
            msg.push(&a.to_wire());
        }
        msg.finish()
    }

    fn exact_udp_match() -> MatchRaw {
        let mut m = MatchRaw::new_zeroed();
        m.in_port = 1u16.to_be_bytes();
        m.dl_vlan = ofp::VLAN_NONE.to_be_bytes();
        m.dl_type = 0x0800u16.to_be_bytes();
        m.nw_src = [10, 0, 0, 1];
        m.nw_dst = [10, 0, 0, 2];
        m.nw_proto = 17;
        m.tp_src = 1u16.to_be_bytes();
        m
    }

    #[test]
    fn bad_version_refused() {
        let mut dp = dp();
        let mut msg =
            MessageBuilder::new(MessageType::FeaturesRequest, 9).finish();
        msg[0] = 0x01;

        control_input(&mut dp, &msg, Moment::now());

        let reply = first_reply(&mut dp);
        let hdr = reply_header(&reply);
        assert_eq!(hdr.msg_type, MessageType::Error as u8);
        let err = ofp::ErrorRaw::read_from_prefix(&reply[8..]).unwrap();
        assert_eq!(err.error_type(), ErrorKind::BadVersion as u16);
        assert_eq!(hdr.xid(), 9);
    }

    #[test]
    fn hello_is_version_exempt() {
        let mut dp = dp();
        let mut msg = MessageBuilder::new(MessageType::Hello, 0).finish();
        msg[0] = 0x01;

        control_input(&mut dp, &msg, Moment::now());
        assert!(dp.remote.drain_outbound().is_empty());
    }

    #[test]
    fn declared_length_cannot_exceed_buffer() {
        let mut dp = dp();
        let mut msg =
            MessageBuilder::new(MessageType::FeaturesRequest, 3).finish();
        msg[2..4].copy_from_slice(&100u16.to_be_bytes());

        control_input(&mut dp, &msg, Moment::now());
        let reply = first_reply(&mut dp);
        let err = ofp::ErrorRaw::read_from_prefix(&reply[8..]).unwrap();
        assert_eq!(err.error_type(), ErrorKind::BadLength as u16);
    }

    #[test]
    fn echo_reflects_payload() {
        let mut dp = dp();
        let mut msg = MessageBuilder::new(MessageType::EchoRequest, 5);
        msg.push_bytes(b"ping!");

        control_input(&mut dp, &msg.finish(), Moment::now());

        let reply = first_reply(&mut dp);
        let hdr = reply_header(&reply);
        assert_eq!(hdr.msg_type, MessageType::EchoReply as u8);
        assert_eq!(hdr.xid(), 5);
        assert_eq!(&reply[8..], b"ping!");
    }

    #[test]
    fn set_config_coerces_unknown_frag_mode() {
        let mut dp = dp();
        let body = SwitchConfigRaw {
            // Frag value 3 is undefined.
            flags: (3u16 << config::FRAG_SHIFT).to_be_bytes(),
            miss_send_len: 256u16.to_be_bytes(),
        };
        let mut msg = MessageBuilder::new(MessageType::SetConfig, 0);
        msg.push(&body);

        control_input(&mut dp, &msg.finish(), Moment::now());
        assert_eq!(dp.config().frag_mode(), config::FRAG_DROP);
        assert_eq!(dp.config().miss_send_len, 256);
    }

    #[test]
    fn flow_mod_add_then_strict_delete() {
        let mut dp = dp();
        let now = Moment::now();

        let add = flow_mod_msg(
            FlowModCommand::Add,
            exact_udp_match(),
            0,
            &[Action::Output { port: 3, max_len: 0 }],
        );
        control_input(&mut dp, &add, now);
        assert!(dp.remote.drain_outbound().is_empty());
        assert_eq!(dp.chain().n_flows(), 1);

        let del = flow_mod_msg(
            FlowModCommand::DeleteStrict,
            exact_udp_match(),
            0,
            &[],
        );
        control_input(&mut dp, &del, now);
        assert_eq!(dp.chain().n_flows(), 0);
    }

    #[test]
    fn flow_mod_rejects_loop_output() {
        let mut dp = dp();

        let add = flow_mod_msg(
            FlowModCommand::Add,
            exact_udp_match(),
            0,
            &[Action::Output { port: 1, max_len: 0 }],
        );
        control_input(&mut dp, &add, Moment::now());

        let reply = first_reply(&mut dp);
        let err = ofp::ErrorRaw::read_from_prefix(&reply[8..]).unwrap();
        assert_eq!(err.error_type(), ErrorKind::BadAction as u16);
        assert_eq!(dp.chain().n_flows(), 0);
    }

    #[test]
    fn flow_mod_modify_swaps_actions() {
        let mut dp = dp();
        let now = Moment::now();

        let add = flow_mod_msg(
            FlowModCommand::Add,
            exact_udp_match(),
            0,
            &[Action::Output { port: 3, max_len: 0 }],
        );
        control_input(&mut dp, &add, now);

        let modify = flow_mod_msg(
            FlowModCommand::Modify,
            exact_udp_match(),
            0,
            &[Action::Output { port: 5, max_len: 0 }],
        );
        control_input(&mut dp, &modify, now);

        let spec = MatchSpec::from_wire(&exact_udp_match());
        let flow = dp.chain().lookup(&spec.key).unwrap();
        assert_eq!(flow.actions()[0], Action::Output { port: 5, max_len: 0 });
    }

    #[test]
    fn modify_without_matches_is_not_an_error() {
        let mut dp = dp();
        let modify = flow_mod_msg(
            FlowModCommand::Modify,
            exact_udp_match(),
            0,
            &[Action::Output { port: 5, max_len: 0 }],
        );
        control_input(&mut dp, &modify, Moment::now());
        assert!(dp.remote.drain_outbound().is_empty());
    }

    #[test]
    fn truncated_action_array_is_bad_length() {
        let mut dp = dp();

        let mut body = FlowModRaw::new_zeroed();
        body.match_ = exact_udp_match();
        body.command = (FlowModCommand::Add as u16).to_be_bytes();
        body.buffer_id = NO_BUFFER.to_be_bytes();

        let mut msg = MessageBuilder::new(MessageType::FlowMod, 2);
        msg.push(&body);
        let action = Action::Output { port: 3, max_len: 0 }.to_wire();
        msg.push_bytes(&action.as_bytes()[..ActionRaw::SIZE - 3]);

        control_input(&mut dp, &msg.finish(), Moment::now());
        let reply = first_reply(&mut dp);
        let err = ofp::ErrorRaw::read_from_prefix(&reply[8..]).unwrap();
        assert_eq!(err.error_type(), ErrorKind::BadLength as u16);
    }

    #[test]
    fn stats_flow_empty_reply_has_no_more_flag() {
        let mut dp = dp();

        let mut msg = MessageBuilder::new(MessageType::StatsRequest, 4);
        msg.push(&StatsHeaderRaw {
            stats_type: (StatsType::Flow as u16).to_be_bytes(),
            flags: 0u16.to_be_bytes(),
        });
        let mut req = FlowStatsRequestRaw::new_zeroed();
        req.match_.wildcards = ofp::wildcard::ALL.to_be_bytes();
        req.table_id = FlowStatsRequestRaw::ALL_TABLES;
        msg.push(&req);

        control_input(&mut dp, &msg.finish(), Moment::now());

        let reply = first_reply(&mut dp);
        let sh = StatsHeaderRaw::read_from_prefix(&reply[8..]).unwrap();
        assert_eq!(sh.flags() & STATS_REPLY_MORE, 0);
        assert_eq!(reply.len(), 8 + StatsHeaderRaw::SIZE);
    }

    #[test]
    fn stats_flow_chunks_set_more_flag() {
        let mut dp = dp();
        let now = Moment::now();

        // Install more flows than fit in one reply part.
        for i in 0..(FLOW_STATS_PER_REPLY as u16 + 5) {
            let mut m = exact_udp_match();
            m.tp_dst = i.to_be_bytes();
            let add = flow_mod_msg(
                FlowModCommand::Add,
                m,
                0,
                &[Action::Output { port: 3, max_len: 0 }],
            );
            control_input(&mut dp, &add, now);
        }
        dp.remote.drain_outbound();

        let mut msg = MessageBuilder::new(MessageType::StatsRequest, 4);
        msg.push(&StatsHeaderRaw {
            stats_type: (StatsType::Flow as u16).to_be_bytes(),
            flags: 0u16.to_be_bytes(),
        });
        let mut req = FlowStatsRequestRaw::new_zeroed();
        req.match_.wildcards = ofp::wildcard::ALL.to_be_bytes();
        req.table_id = FlowStatsRequestRaw::ALL_TABLES;
        msg.push(&req);

        control_input(&mut dp, &msg.finish(), now);

        let replies = dp.remote.drain_outbound();
        assert_eq!(replies.len(), 2);

        let first = StatsHeaderRaw::read_from_prefix(&replies[0][8..]).unwrap();
        let last = StatsHeaderRaw::read_from_prefix(&replies[1][8..]).unwrap();
        assert_eq!(first.flags() & STATS_REPLY_MORE, STATS_REPLY_MORE);
        assert_eq!(last.flags() & STATS_REPLY_MORE, 0);
    }

    #[test]
    fn packet_out_with_unknown_buffer() {
        let mut dp = dp();

        let body = PacketOutRaw {
            buffer_id: 0x0000_1234u32.to_be_bytes(),
            in_port: 1u16.to_be_bytes(),
            out_port: 0u16.to_be_bytes(),
        };
        let mut msg = MessageBuilder::new(MessageType::PacketOut, 6);
        msg.push(&body);
        msg.push(&Action::Output { port: 2, max_len: 0 }.to_wire());

        control_input(&mut dp, &msg.finish(), Moment::now());

        let reply = first_reply(&mut dp);
        let err = ofp::ErrorRaw::read_from_prefix(&reply[8..]).unwrap();
        assert_eq!(err.error_type(), ErrorKind::BufferUnknown as u16);
    }
}
