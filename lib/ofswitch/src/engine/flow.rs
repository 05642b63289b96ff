// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flow keys, match templates, and flow entries.

use crate::engine::ether::EtherAddr;
use crate::engine::ether::ETHER_TYPE_IPV4;
use crate::engine::ip4::IPPROTO_TCP;
use crate::engine::ip4::IPPROTO_UDP;
use crate::time::Moment;
use core::fmt;
use core::fmt::Display;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering::Relaxed;
use ofp::wildcard;
use ofp::Action;
use ofp::MatchRaw;
use ofp::FLOW_PERMANENT;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use zerocopy::AsBytes;
use zerocopy::FromZeroes;

/// The canonical flow key extracted from every frame. Integer fields
/// are host order; the struct is laid out without padding so the hash
/// tables can digest its raw bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, AsBytes)]
pub struct FlowKey {
    pub nw_src: u32,
    pub nw_dst: u32,
    pub in_port: u16,
    pub dl_vlan: u16,
    pub dl_type: u16,
    pub tp_src: u16,
    pub tp_dst: u16,
    pub dl_src: EtherAddr,
    pub dl_dst: EtherAddr,
    pub nw_proto: u8,
    pub pad: u8,
}

impl Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = self.nw_src.to_be_bytes();
        let d = self.nw_dst.to_be_bytes();
        write!(
            f,
            "port{:04x}:vlan{:04x} \
             {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}->\
             {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x} \
             type{:04x} proto{} {}.{}.{}.{}->{}.{}.{}.{} port{}->{}",
            self.in_port,
            self.dl_vlan,
            self.dl_src[0],
            self.dl_src[1],
            self.dl_src[2],
            self.dl_src[3],
            self.dl_src[4],
            self.dl_src[5],
            self.dl_dst[0],
            self.dl_dst[1],
            self.dl_dst[2],
            self.dl_dst[3],
            self.dl_dst[4],
            self.dl_dst[5],
            self.dl_type,
            self.nw_proto,
            s[0],
            s[1],
            s[2],
            s[3],
            d[0],
            d[1],
            d[2],
            d[3],
            self.tp_src,
            self.tp_dst,
        )
    }
}

/// Field-by-field comparison of two keys under a wildcard set and a
/// pair of IP masks. The single-bit flags gate their fields; the IP
/// addresses compare under the masks alone.
fn fields_match(
    a: &FlowKey,
    b: &FlowKey,
    w: u32,
    src_mask: u32,
    dst_mask: u32,
) -> bool {
    (w & wildcard::IN_PORT != 0 || a.in_port == b.in_port)
        && (w & wildcard::DL_VLAN != 0 || a.dl_vlan == b.dl_vlan)
        && (w & wildcard::DL_SRC != 0 || a.dl_src == b.dl_src)
        && (w & wildcard::DL_DST != 0 || a.dl_dst == b.dl_dst)
        && (w & wildcard::DL_TYPE != 0 || a.dl_type == b.dl_type)
        && (a.nw_src ^ b.nw_src) & src_mask == 0
        && (a.nw_dst ^ b.nw_dst) & dst_mask == 0
        && (w & wildcard::NW_PROTO != 0 || a.nw_proto == b.nw_proto)
        && (w & wildcard::TP_SRC != 0 || a.tp_src == b.tp_src)
        && (w & wildcard::TP_DST != 0 || a.tp_dst == b.tp_dst)
}

/// Mask over a host-order IPv4 address given the wildcard state of
/// that address: the full-field flag or a saturated bit count clears
/// the whole mask.
fn make_nw_mask(full_wild: bool, bits: u32) -> u32 {
    if full_wild || bits >= 32 {
        0
    } else {
        !((1u32 << bits) - 1)
    }
}

/// A key plus the wildcard set and derived IP masks: what a table
/// entry matches, and what an administrative command selects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MatchSpec {
    pub key: FlowKey,
    pub wildcards: u32,
    nw_src_mask: u32,
    nw_dst_mask: u32,
}

impl MatchSpec {
    /// An exact match on `key`: no wildcards, full masks.
    pub fn exact(key: FlowKey) -> Self {
        Self { key, wildcards: 0, nw_src_mask: !0, nw_dst_mask: !0 }
    }

    /// Decode a wire match. Wildcard implications are applied here so
    /// the exact/wildcard classification is stable from then on: an
    /// unknown data-link type wildcards every network and transport
    /// field, an unknown IP protocol wildcards the ports, and a
    /// non-TCP/UDP protocol *clears* the port wildcards so such flows
    /// stay eligible for the exact-match tables.
    pub fn from_wire(raw: &MatchRaw) -> Self {
        let mut w = raw.wildcards() & wildcard::ALL;
        let mut key = FlowKey {
            in_port: raw.in_port(),
            dl_vlan: raw.dl_vlan(),
            dl_src: raw.dl_src,
            dl_dst: raw.dl_dst,
            dl_type: raw.dl_type(),
            ..Default::default()
        };

        if w & wildcard::DL_TYPE != 0 {
            w |= wildcard::NW | wildcard::TP;
        } else if key.dl_type == ETHER_TYPE_IPV4 {
            key.nw_src = raw.nw_src();
            key.nw_dst = raw.nw_dst();
            key.nw_proto = raw.nw_proto;

            if w & wildcard::NW_PROTO != 0 {
                w |= wildcard::TP;
            } else if key.nw_proto == IPPROTO_TCP || key.nw_proto == IPPROTO_UDP
            {
                key.tp_src = raw.tp_src();
                key.tp_dst = raw.tp_dst();
            } else {
                w &= !wildcard::TP;
            }
        } else {
            w &= !(wildcard::NW | wildcard::TP);
        }

        // Masks derive last, after the adjustments above.
        let nw_src_mask =
            make_nw_mask(w & wildcard::NW_SRC != 0, wildcard::nw_src_bits(w));
        let nw_dst_mask =
            make_nw_mask(w & wildcard::NW_DST != 0, wildcard::nw_dst_bits(w));

        Self { key, wildcards: w, nw_src_mask, nw_dst_mask }
    }

    pub fn to_wire(&self) -> MatchRaw {
        let mut raw = MatchRaw::new_zeroed();
        raw.wildcards = self.wildcards.to_be_bytes();
        raw.in_port = self.key.in_port.to_be_bytes();
        raw.dl_src = self.key.dl_src;
        raw.dl_dst = self.key.dl_dst;
        raw.dl_vlan = self.key.dl_vlan.to_be_bytes();
        raw.dl_type = self.key.dl_type.to_be_bytes();
        raw.nw_src = self.key.nw_src.to_be_bytes();
        raw.nw_dst = self.key.nw_dst.to_be_bytes();
        raw.nw_proto = self.key.nw_proto;
        raw.tp_src = self.key.tp_src.to_be_bytes();
        raw.tp_dst = self.key.tp_dst.to_be_bytes();
        raw
    }

    /// Eligible for the exact-match tables?
    pub fn is_exact(&self) -> bool {
        self.wildcards == 0
    }

    /// Does a packet with key `key` match this entry?
    pub fn matches_key(&self, key: &FlowKey) -> bool {
        fields_match(
            key,
            &self.key,
            self.wildcards,
            self.nw_src_mask,
            self.nw_dst_mask,
        )
    }

    /// Does this entry overlap the template `tmpl`, with fields
    /// compared modulo the wildcards of either side? This is the
    /// non-strict administrative selector.
    pub fn overlaps(&self, tmpl: &MatchSpec) -> bool {
        fields_match(
            &self.key,
            &tmpl.key,
            self.wildcards | tmpl.wildcards,
            self.nw_src_mask & tmpl.nw_src_mask,
            self.nw_dst_mask & tmpl.nw_dst_mask,
        )
    }

    /// Does the administrative template `tmpl` select this entry for
    /// deletion or modification? Strict selection requires wildcard
    /// equality and compares the non-wildcarded fields; non-strict
    /// selection is the overlap test.
    pub fn selected_by(&self, tmpl: &MatchSpec, strict: bool) -> bool {
        if strict {
            self.wildcards == tmpl.wildcards && tmpl.matches_key(&self.key)
        } else {
            self.overlaps(tmpl)
        }
    }
}

/// Why a flow left the table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExpiredReason {
    IdleTimeout,
    HardTimeout,
}

/// One installed flow. Counters and the last-used stamp move on the
/// packet path without a lock; the action program swaps atomically
/// behind its own lock so a reader holds a consistent `Arc` snapshot.
#[derive(Debug)]
pub struct Flow {
    spec: MatchSpec,
    priority: u16,
    idle_timeout: u16,
    hard_timeout: u16,
    created_at: Moment,
    used_at: AtomicU64,
    packet_count: AtomicU64,
    byte_count: AtomicU64,
    actions: RwLock<Arc<[Action]>>,
}

impl Flow {
    pub fn new(
        spec: MatchSpec,
        priority: u16,
        idle_timeout: u16,
        hard_timeout: u16,
        actions: Vec<Action>,
        now: Moment,
    ) -> Self {
        Self {
            spec,
            priority,
            idle_timeout,
            hard_timeout,
            created_at: now,
            used_at: AtomicU64::new(now.raw_millis()),
            packet_count: AtomicU64::new(0),
            byte_count: AtomicU64::new(0),
            actions: RwLock::new(actions.into()),
        }
    }

    pub fn spec(&self) -> &MatchSpec {
        &self.spec
    }

    pub fn key(&self) -> &FlowKey {
        &self.spec.key
    }

    /// Priority for wildcard ordering. Exact flows ignore it: the
    /// hash stages sit ahead of the linear stage in the chain.
    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn idle_timeout(&self) -> u16 {
        self.idle_timeout
    }

    pub fn hard_timeout(&self) -> u16 {
        self.hard_timeout
    }

    /// Snapshot of the action program.
    pub fn actions(&self) -> Arc<[Action]> {
        self.actions.read().clone()
    }

    /// Swap in a new action program. The old program is freed when
    /// the last executor holding its snapshot finishes.
    pub fn replace_actions(&self, actions: Vec<Action>) {
        *self.actions.write() = actions.into();
    }

    /// Account one forwarded frame.
    pub fn used(&self, now: Moment, frame_len: usize) {
        self.used_at.store(now.raw_millis(), Relaxed);
        self.packet_count.fetch_add(1, Relaxed);
        self.byte_count.fetch_add(frame_len as u64, Relaxed);
    }

    /// The idle test runs first; a flow both idle and past its hard
    /// limit reports idleness.
    pub fn expired(&self, now: Moment) -> Option<ExpiredReason> {
        if self.idle_timeout != FLOW_PERMANENT {
            let used = Moment::from_raw_millis(self.used_at.load(Relaxed));
            if now.delta_as_millis(used) > u64::from(self.idle_timeout) * 1_000
            {
                return Some(ExpiredReason::IdleTimeout);
            }
        }

        if self.hard_timeout != FLOW_PERMANENT
            && now.delta_as_millis(self.created_at)
                > u64::from(self.hard_timeout) * 1_000
        {
            return Some(ExpiredReason::HardTimeout);
        }

        None
    }

    /// Whole seconds this flow has been installed.
    pub fn duration_secs(&self, now: Moment) -> u32 {
        now.delta_as_secs(self.created_at) as u32
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count.load(Relaxed)
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count.load(Relaxed)
    }

    pub fn dump(&self, now: Moment) -> FlowDump {
        FlowDump {
            wildcards: self.spec.wildcards,
            in_port: self.spec.key.in_port,
            dl_type: self.spec.key.dl_type,
            priority: self.priority,
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            duration_secs: self.duration_secs(now),
            packet_count: self.packet_count(),
            byte_count: self.byte_count(),
        }
    }
}

/// External view of a flow's bookkeeping.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FlowDump {
    pub wildcards: u32,
    pub in_port: u16,
    pub dl_type: u16,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub duration_secs: u32,
    pub packet_count: u64,
    pub byte_count: u64,
}

#[cfg(test)]
mod test {
    use super::*;
    use core::mem::size_of;
    use std::time::Duration;

    fn udp_key() -> FlowKey {
        FlowKey {
            in_port: 1,
            dl_vlan: ofp::VLAN_NONE,
            dl_src: [2, 0, 0, 0, 0, 1],
            dl_dst: [2, 0, 0, 0, 0, 2],
            dl_type: ETHER_TYPE_IPV4,
            nw_src: 0x0a00_0001,
            nw_dst: 0x0a00_0002,
            nw_proto: IPPROTO_UDP,
            tp_src: 1,
            tp_dst: 0,
            ..Default::default()
        }
    }

    #[test]
    fn key_is_padding_free() {
        assert_eq!(size_of::<FlowKey>(), 32);
    }

    #[test]
    fn exact_spec_matches_only_equal_key() {
        let spec = MatchSpec::exact(udp_key());
        assert!(spec.is_exact());
        assert!(spec.matches_key(&udp_key()));

        let mut other = udp_key();
        other.tp_src = 2;
        assert!(!spec.matches_key(&other));
    }

    #[test]
    fn dl_type_wildcard_implies_nw_and_tp() {
        let mut raw = MatchRaw::new_zeroed();
        raw.wildcards = wildcard::DL_TYPE.to_be_bytes();
        raw.dl_type = ETHER_TYPE_IPV4.to_be_bytes();
        raw.nw_src = [10, 0, 0, 1];
        raw.nw_proto = IPPROTO_TCP;
        raw.tp_dst = 443u16.to_be_bytes();

        let spec = MatchSpec::from_wire(&raw);
        assert_eq!(
            spec.wildcards,
            wildcard::DL_TYPE | wildcard::NW | wildcard::TP
        );
        // Implied-wildcard fields never make it into the key.
        assert_eq!(spec.key.nw_src, 0);
        assert_eq!(spec.key.tp_dst, 0);
    }

    #[test]
    fn non_ulp_protocol_stays_exact() {
        // ICMP has no ports; the template must stay hash-eligible.
        let mut raw = MatchRaw::new_zeroed();
        raw.dl_type = ETHER_TYPE_IPV4.to_be_bytes();
        raw.nw_proto = 1;
        let spec = MatchSpec::from_wire(&raw);
        assert!(spec.is_exact());
    }

    #[test]
    fn prefix_masks_apply_to_low_bits() {
        let mut raw = MatchRaw::new_zeroed();
        raw.wildcards = (wildcard::IN_PORT
            | wildcard::DL_VLAN
            | wildcard::DL_SRC
            | wildcard::DL_DST
            | (8 << wildcard::NW_SRC_SHIFT))
            .to_be_bytes();
        raw.dl_type = ETHER_TYPE_IPV4.to_be_bytes();
        raw.nw_src = [10, 0, 0, 0];
        raw.nw_proto = IPPROTO_UDP;

        let spec = MatchSpec::from_wire(&raw);

        let mut key = FlowKey {
            dl_type: ETHER_TYPE_IPV4,
            nw_src: 0x0a00_0005,
            nw_proto: IPPROTO_UDP,
            ..Default::default()
        };
        assert!(spec.matches_key(&key));

        key.nw_src = 0x0a00_0105;
        assert!(!spec.matches_key(&key));
    }

    #[test]
    fn match_codec_is_idempotent() {
        let mut raw = MatchRaw::new_zeroed();
        raw.wildcards =
            (wildcard::DL_SRC | (24 << wildcard::NW_DST_SHIFT)).to_be_bytes();
        raw.dl_type = ETHER_TYPE_IPV4.to_be_bytes();
        raw.nw_dst = [10, 1, 2, 0];
        raw.nw_proto = IPPROTO_TCP;
        raw.tp_src = 80u16.to_be_bytes();

        let once = MatchSpec::from_wire(&raw).to_wire();
        let twice = MatchSpec::from_wire(&once).to_wire();
        assert_eq!(once, twice);
    }

    #[test]
    fn strict_selection_requires_wildcard_equality() {
        let mut raw = MatchRaw::new_zeroed();
        raw.wildcards = wildcard::IN_PORT.to_be_bytes();
        raw.dl_type = 0x0806u16.to_be_bytes();
        let entry = MatchSpec::from_wire(&raw);

        let tmpl_loose = MatchSpec::from_wire(&{
            let mut r = raw;
            r.wildcards = (wildcard::IN_PORT | wildcard::DL_SRC).to_be_bytes();
            r
        });

        assert!(entry.selected_by(&tmpl_loose, false));
        assert!(!entry.selected_by(&tmpl_loose, true));
        assert!(entry.selected_by(&entry.clone(), true));
    }

    #[test]
    fn counters_and_expiry() {
        let t0 = Moment::now();
        let flow = Flow::new(
            MatchSpec::exact(udp_key()),
            0,
            1,
            FLOW_PERMANENT,
            vec![Action::Output { port: 3, max_len: 0 }],
            t0,
        );

        flow.used(t0, 60);
        flow.used(t0, 40);
        assert_eq!(flow.packet_count(), 2);
        assert_eq!(flow.byte_count(), 100);

        assert_eq!(flow.expired(t0 + Duration::from_millis(900)), None);
        assert_eq!(
            flow.expired(t0 + Duration::from_millis(1_100)),
            Some(ExpiredReason::IdleTimeout)
        );

        // Fresh use pushes the idle horizon out.
        flow.used(t0 + Duration::from_millis(1_000), 60);
        assert_eq!(flow.expired(t0 + Duration::from_millis(1_100)), None);
    }

    #[test]
    fn hard_timeout_counts_from_creation() {
        let t0 = Moment::now();
        let flow = Flow::new(
            MatchSpec::exact(udp_key()),
            0,
            FLOW_PERMANENT,
            2,
            vec![],
            t0,
        );

        flow.used(t0 + Duration::from_secs(2), 60);
        assert_eq!(
            flow.expired(t0 + Duration::from_millis(2_100)),
            Some(ExpiredReason::HardTimeout)
        );
    }

    #[test]
    fn action_swap_preserves_reader_snapshot() {
        let t0 = Moment::now();
        let flow = Flow::new(
            MatchSpec::exact(udp_key()),
            0,
            FLOW_PERMANENT,
            FLOW_PERMANENT,
            vec![Action::Output { port: 3, max_len: 0 }],
            t0,
        );

        let snapshot = flow.actions();
        flow.replace_actions(vec![Action::Output { port: 9, max_len: 0 }]);
        assert_eq!(snapshot[0], Action::Output { port: 3, max_len: 0 });
        assert_eq!(flow.actions()[0], Action::Output { port: 9, max_len: 0 });
    }
}
