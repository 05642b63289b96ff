// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The datapath: the switch instance that owns everything.
//!
//! One `Datapath` owns the flow-table chain, the port registry, the
//! packet-buffer pool, the configuration, and the controller
//! channel. `run_once` is the poll loop body: a timeout sweep at
//! most once per second, a turn of the controller channel, then one
//! receive attempt per port. Nothing here persists; a restarted
//! datapath waits for the controller to reinstall its flows.

use crate::engine::buffer_pool::PacketBufferPool;
use crate::engine::chain::Chain;
use crate::engine::ctrl;
use crate::engine::forward;
use crate::engine::packet::Frame;
use crate::engine::port::PortDev;
use crate::engine::port::PortMap;
use crate::engine::remote::Connector;
use crate::engine::remote::Reliability;
use crate::engine::remote::RemoteChannel;
use crate::engine::table::ExpiredFlow;
use crate::time::Moment;
use crate::SwitchError;
use ofp::capability;
use ofp::config;
use ofp::port;
use ofp::port_flags;
use ofp::ErrorKind;
use ofp::ErrorRaw;
use ofp::FeaturesReplyRaw;
use ofp::FlowExpiredRaw;
use ofp::MessageBuilder;
use ofp::MessageType;
use ofp::PacketInRaw;
use ofp::PacketInReason;
use ofp::PhyPortRaw;
use ofp::PortStatusReason;
use ofp::PortStatusRaw;
use ofp::ALL_ACTIONS_MASK;
use ofp::DEFAULT_MISS_SEND_LEN;
use ofp::NO_BUFFER;
use tracing::debug;
use tracing::warn;
use zerocopy::FromZeroes;

/// What this datapath can do, advertised in the features reply.
const SUPPORTED_CAPABILITIES: u32 = capability::FLOW_STATS
    | capability::TABLE_STATS
    | capability::PORT_STATS
    | capability::MULTI_PHY_TX;

/// Bytes of an offending message echoed back in an error reply.
const ERROR_DATA_MAX: usize = 64;

/// Datapath ids carry 48 significant bits.
const DPID_MASK: u64 = 0xffff_ffff_ffff;

#[derive(Clone, Copy, Debug)]
pub struct SwitchConfig {
    pub flags: u16,
    pub miss_send_len: u16,
}

impl SwitchConfig {
    pub fn frag_mode(&self) -> u16 {
        (self.flags & config::FRAG_MASK) >> config::FRAG_SHIFT
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self { flags: 0, miss_send_len: DEFAULT_MISS_SEND_LEN }
    }
}

pub struct Datapath {
    id: u64,
    pub(crate) chain: Chain,
    pub(crate) ports: PortMap,
    pub(crate) buffers: PacketBufferPool,
    pub(crate) config: SwitchConfig,
    pub(crate) remote: RemoteChannel,
    last_sweep: Option<Moment>,
}

impl Datapath {
    /// Create a datapath. Without an explicit id a random 48-bit one
    /// is generated, as a physical switch would derive one from a
    /// MAC it owns.
    pub fn new(dpid: Option<u64>) -> Self {
        let id = match dpid {
            Some(id) if id <= DPID_MASK => id,
            _ => rand::random::<u64>() & DPID_MASK,
        };

        Self {
            id,
            chain: Chain::new(),
            ports: PortMap::new(),
            buffers: PacketBufferPool::new(),
            config: SwitchConfig::default(),
            remote: RemoteChannel::detached(),
            last_sweep: None,
        }
    }

    /// Attach a controller transport.
    pub fn set_connector(
        &mut self,
        connector: Box<dyn Connector>,
        reliability: Reliability,
    ) {
        self.remote = RemoteChannel::new(connector, reliability);
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> SwitchConfig {
        self.config
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn ports(&self) -> &PortMap {
        &self.ports
    }

    pub fn remote_mut(&mut self) -> &mut RemoteChannel {
        &mut self.remote
    }

    /// Register a device; the controller hears about the new port.
    pub fn add_port(
        &mut self,
        dev: Box<dyn PortDev>,
    ) -> Result<u16, SwitchError> {
        let port_no = self.ports.add(dev)?;
        let desc = match self.ports.get(port_no) {
            Some(p) => p.desc(),
            None => PhyPortRaw::new_zeroed(),
        };
        self.send_port_status(desc, PortStatusReason::Add);
        Ok(port_no)
    }

    pub fn set_local_port(&mut self, dev: Box<dyn PortDev>) {
        self.ports.set_local(dev);
    }

    pub fn remove_port(&mut self, port_no: u16) {
        if let Some(p) = self.ports.remove(port_no) {
            self.send_port_status(p.desc(), PortStatusReason::Delete);
        }
    }

    /// One turn of the poll loop at the current time.
    pub fn run_once(&mut self) -> Result<(), SwitchError> {
        self.run_at(Moment::now())
    }

    /// One turn of the poll loop at `now`: sweep, control, ports.
    pub fn run_at(&mut self, now: Moment) -> Result<(), SwitchError> {
        let sweep_due = match self.last_sweep {
            Some(last) => now.delta_as_millis(last) >= 1_000,
            None => true,
        };
        if sweep_due {
            self.sweep_flows(now);
            self.last_sweep = Some(now);
        }

        for msg in self.remote.run(now)? {
            ctrl::control_input(self, &msg, now);
        }

        for port_no in self.ports.numbers() {
            let recv = match self.ports.get_mut(port_no) {
                Some(p) => p.recv(),
                None => continue,
            };

            match recv {
                Ok(Some(frame)) => {
                    forward::port_input(self, Frame::new(frame), port_no, now)
                }
                Ok(None) => (),
                Err(err) => {
                    warn!(port = port_no, %err, "receive failed, dropping port");
                    self.remove_port(port_no);
                }
            }
        }

        Ok(())
    }

    /// Expire flows, notifying the controller when configured to.
    pub fn sweep_flows(&mut self, now: Moment) {
        for expired in self.chain.expire(now) {
            debug!(
                key = %expired.flow.key(),
                reason = ?expired.reason,
                "flow expired"
            );
            if self.config.flags & config::SEND_FLOW_EXP != 0 {
                self.send_flow_expired(&expired, now);
            }
        }
    }

    /// Emit a frame toward `out_port`, resolving pseudo-ports.
    pub(crate) fn output_port(
        &mut self,
        now: Moment,
        frame: Frame,
        in_port: u16,
        out_port: u16,
        ignore_no_fwd: bool,
    ) {
        match out_port {
            port::FLOOD => self.flood(frame, in_port, true, ignore_no_fwd),
            port::ALL => self.flood(frame, in_port, false, ignore_no_fwd),

            port::CONTROLLER => {
                let buffer_id = self.buffers.save(frame.clone(), now);
                self.output_control(
                    frame,
                    in_port,
                    buffer_id,
                    0,
                    PacketInReason::Action,
                );
            }

            port::LOCAL => {
                if let Some(local) = self.ports.local_mut() {
                    local.send(frame.bytes());
                } else {
                    debug!("no local port, frame dropped");
                }
            }

            n if n < port::MAX => self.send_to_phys(frame, n, ignore_no_fwd),

            other => {
                debug!(port = other, "can't forward to bad port");
            }
        }
    }

    /// Send on every physical port except the ingress, honoring
    /// no-flood flags for a true flood.
    fn flood(
        &mut self,
        frame: Frame,
        in_port: u16,
        respect_no_flood: bool,
        ignore_no_fwd: bool,
    ) {
        let targets: Vec<u16> = self
            .ports
            .iter()
            .filter(|p| {
                p.port_no() != in_port
                    && !(respect_no_flood
                        && p.flags() & port_flags::NO_FLOOD != 0)
            })
            .map(|p| p.port_no())
            .collect();

        // Clone for every leg but the last.
        let mut targets = targets.into_iter().peekable();
        while let Some(out_port) = targets.next() {
            if targets.peek().is_some() {
                self.send_to_phys(frame.clone(), out_port, ignore_no_fwd);
            } else {
                self.send_to_phys(frame, out_port, ignore_no_fwd);
                return;
            }
        }
        // No targets: the frame is consumed.
    }

    fn send_to_phys(
        &mut self,
        frame: Frame,
        out_port: u16,
        ignore_no_fwd: bool,
    ) {
        match self.ports.get_mut(out_port) {
            Some(p) => {
                if p.flags() & port_flags::NO_FWD != 0 && !ignore_no_fwd {
                    p.counters.drop_count += 1;
                    return;
                }
                p.send(frame.bytes());
            }
            None => {
                debug!(port = out_port, "can't forward to unknown port");
            }
        }
    }

    /// Punt a frame to the controller. A buffered frame is truncated
    /// to `max_len` (0 means whole); an unbuffered one goes whole so
    /// the controller retains the only copy.
    pub(crate) fn output_control(
        &mut self,
        mut frame: Frame,
        in_port: u16,
        buffer_id: Option<u32>,
        max_len: usize,
        reason: PacketInReason,
    ) {
        let total_len = frame.len() as u16;
        if buffer_id.is_some() && max_len > 0 && frame.len() > max_len {
            frame.truncate(max_len);
        }

        let body = PacketInRaw {
            buffer_id: buffer_id.unwrap_or(NO_BUFFER).to_be_bytes(),
            total_len: total_len.to_be_bytes(),
            in_port: in_port.to_be_bytes(),
            reason: reason as u8,
            pad: 0,
        };

        let mut msg = MessageBuilder::new(MessageType::PacketIn, 0);
        msg.push(&body).push_bytes(frame.bytes());
        self.remote.send(msg.finish());
    }

    pub(crate) fn send_flow_expired(
        &mut self,
        expired: &ExpiredFlow,
        now: Moment,
    ) {
        let flow = &expired.flow;
        let body = FlowExpiredRaw {
            match_: flow.spec().to_wire(),
            priority: flow.priority().to_be_bytes(),
            pad: [0; 2],
            duration: flow.duration_secs(now).to_be_bytes(),
            packet_count: flow.packet_count().to_be_bytes(),
            byte_count: flow.byte_count().to_be_bytes(),
        };

        let mut msg = MessageBuilder::new(MessageType::FlowExpired, 0);
        msg.push(&body);
        self.remote.send(msg.finish());
    }

    pub(crate) fn send_port_status(
        &mut self,
        desc: PhyPortRaw,
        reason: PortStatusReason,
    ) {
        let body = PortStatusRaw { reason: reason as u8, pad: [0; 3], desc };
        let mut msg = MessageBuilder::new(MessageType::PortStatus, 0);
        msg.push(&body);
        self.remote.send(msg.finish());
    }

    pub(crate) fn send_features_reply(&mut self, xid: u32) {
        let body = FeaturesReplyRaw {
            datapath_id: self.id.to_be_bytes(),
            n_exact: self.chain.exact_capacity().to_be_bytes(),
            n_compression: 0u32.to_be_bytes(),
            n_general: self.chain.wildcard_capacity().to_be_bytes(),
            buffer_mb: 1u32.to_be_bytes(),
            n_buffers: (crate::engine::buffer_pool::N_PKT_BUFFERS as u32)
                .to_be_bytes(),
            capabilities: SUPPORTED_CAPABILITIES.to_be_bytes(),
            actions: ALL_ACTIONS_MASK.to_be_bytes(),
        };

        let mut msg = MessageBuilder::new(MessageType::FeaturesReply, xid);
        msg.push(&body);
        for p in self.ports.iter() {
            msg.push(&p.desc());
        }
        self.remote.send(msg.finish());
    }

    pub(crate) fn send_error(
        &mut self,
        kind: ErrorKind,
        code: u16,
        xid: u32,
        offending: &[u8],
    ) {
        debug!(%kind, code, "control message refused");

        let body = ErrorRaw {
            error_type: (kind as u16).to_be_bytes(),
            error_code: code.to_be_bytes(),
        };

        let data_len = offending.len().min(ERROR_DATA_MAX);
        let mut msg = MessageBuilder::new(MessageType::Error, xid);
        msg.push(&body).push_bytes(&offending[..data_len]);
        self.remote.send(msg.finish());
    }

    /// Apply a port-mod: flags only, and only when the request names
    /// the hardware address the port actually has.
    pub(crate) fn update_port_flags(&mut self, desc: &PhyPortRaw) {
        let Some(p) = self.ports.get_mut(desc.port_no()) else {
            return;
        };

        if p.hw_addr() != desc.hw_addr {
            debug!(
                port = desc.port_no(),
                "port-mod hardware address mismatch, ignored"
            );
            return;
        }

        p.set_flags(desc.flags());
    }
}
