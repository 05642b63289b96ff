// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-packet forwarding path.

use crate::engine::action::execute_actions;
use crate::engine::datapath::Datapath;
use crate::engine::ether::STP_MULTICAST;
use crate::engine::packet::Frame;
use crate::engine::parse::flow_extract;
use crate::time::Moment;
use ofp::config;
use ofp::port_flags;
use ofp::PacketInReason;
use tracing::trace;

/// Process one frame received on a physical port: extract the key,
/// apply the receive gates, then match-and-execute or punt.
pub fn port_input(
    dp: &mut Datapath,
    mut frame: Frame,
    in_port: u16,
    now: Moment,
) {
    let (mut key, is_fragment) = flow_extract(&mut frame, in_port);

    if is_fragment && dp.config.frag_mode() == config::FRAG_DROP {
        trace!(port = in_port, "fragment dropped before lookup");
        return;
    }

    if let Some(port) = dp.ports.get_mut(in_port) {
        port.counters.rx_count += 1;
        let flags = port.flags();

        if flags & port_flags::NO_RECV != 0 {
            return;
        }
        if flags & port_flags::NO_RECV_STP != 0 && key.dl_dst == STP_MULTICAST
        {
            return;
        }
    }

    match dp.chain.lookup(&key) {
        Some(flow) => {
            flow.used(now, frame.len());
            let actions = flow.actions();
            execute_actions(dp, now, frame, in_port, &mut key, &actions, false);
        }

        None => {
            trace!(key = %key, "no match, punting");
            let buffer_id = dp.buffers.save(frame.clone(), now);
            let miss_len = usize::from(dp.config.miss_send_len);
            dp.output_control(
                frame,
                in_port,
                buffer_id,
                miss_len,
                PacketInReason::NoMatch,
            );
        }
    }
}
