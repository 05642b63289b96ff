// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The wildcard stage: a priority-ordered scan.
//!
//! Flows are kept in non-increasing priority order, ties behind their
//! elders, so lookup can stop at the first match. The table is small
//! by construction; the chain consults it only after both hash
//! stages miss.

use super::ExpiredFlow;
use super::Table;
use super::TableStats;
use crate::engine::flow::Flow;
use crate::engine::flow::FlowKey;
use crate::engine::flow::MatchSpec;
use crate::time::Moment;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

pub struct LinearTable {
    max_flows: usize,
    flows: Vec<Arc<Flow>>,
    matched: AtomicU64,
}

impl LinearTable {
    pub fn new(max_flows: usize) -> Self {
        Self { max_flows, flows: Vec::new(), matched: AtomicU64::new(0) }
    }

    fn selects(flow: &Flow, tmpl: &MatchSpec, priority: u16, strict: bool) -> bool {
        flow.spec().selected_by(tmpl, strict)
            && (!strict || flow.priority() == priority)
    }
}

impl Table for LinearTable {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn lookup(&self, key: &FlowKey) -> Option<Arc<Flow>> {
        for flow in &self.flows {
            if flow.spec().matches_key(key) {
                self.matched.fetch_add(1, Relaxed);
                return Some(flow.clone());
            }
        }
        None
    }

    fn insert(&mut self, flow: Arc<Flow>) -> bool {
        if flow.spec().is_exact() {
            return false;
        }

        // An entry with the same match and priority is replaced in
        // place, keeping its position in the order.
        for slot in &mut self.flows {
            if slot.spec().selected_by(flow.spec(), true)
                && slot.priority() == flow.priority()
            {
                *slot = flow;
                return true;
            }
        }

        if self.flows.len() >= self.max_flows {
            return false;
        }

        let pos = self
            .flows
            .iter()
            .position(|f| f.priority() < flow.priority())
            .unwrap_or(self.flows.len());
        self.flows.insert(pos, flow);
        true
    }

    fn delete(
        &mut self,
        tmpl: &MatchSpec,
        priority: u16,
        strict: bool,
    ) -> usize {
        let before = self.flows.len();
        self.flows.retain(|f| !Self::selects(f, tmpl, priority, strict));
        before - self.flows.len()
    }

    fn matching(
        &self,
        tmpl: &MatchSpec,
        priority: u16,
        strict: bool,
    ) -> Vec<Arc<Flow>> {
        self.flows
            .iter()
            .filter(|f| Self::selects(f, tmpl, priority, strict))
            .cloned()
            .collect()
    }

    fn expire(&mut self, now: Moment) -> Vec<ExpiredFlow> {
        let mut expired = Vec::new();

        self.flows.retain(|flow| match flow.expired(now) {
            Some(reason) => {
                expired.push(ExpiredFlow { flow: flow.clone(), reason });
                false
            }
            None => true,
        });

        expired
    }

    fn stats(&self) -> TableStats {
        TableStats {
            name: self.name(),
            n_flows: self.flows.len() as u32,
            max_flows: self.max_flows as u32,
            matched: self.matched.load(Relaxed),
        }
    }

    fn dump(&self) -> Vec<Arc<Flow>> {
        self.flows.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::ether::ETHER_TYPE_IPV4;
    use crate::engine::ip4::IPPROTO_UDP;
    use ofp::wildcard;
    use ofp::Action;
    use ofp::MatchRaw;
    use ofp::FLOW_PERMANENT;
    use zerocopy::FromZeroes;

    /// A template matching `nw_dst` in 10.0.0.0/24, all else wild.
    fn prefix_spec(last_octet: u8) -> MatchSpec {
        let mut raw = MatchRaw::new_zeroed();
        raw.wildcards = ((wildcard::ALL
            & !(wildcard::DL_TYPE | wildcard::NW_DST | wildcard::NW_DST_BITS))
            | (8 << wildcard::NW_DST_SHIFT))
            .to_be_bytes();
        raw.dl_type = ETHER_TYPE_IPV4.to_be_bytes();
        raw.nw_dst = [10, 0, 0, last_octet];
        MatchSpec::from_wire(&raw)
    }

    fn wild_flow(priority: u16, out_port: u16) -> Arc<Flow> {
        Arc::new(Flow::new(
            prefix_spec(0),
            priority,
            FLOW_PERMANENT,
            FLOW_PERMANENT,
            vec![Action::Output { port: out_port, max_len: 0 }],
            Moment::now(),
        ))
    }

    fn packet_key(nw_dst: u32) -> FlowKey {
        FlowKey {
            in_port: 1,
            dl_vlan: ofp::VLAN_NONE,
            dl_type: ETHER_TYPE_IPV4,
            nw_src: 0x0a00_0063,
            nw_dst,
            nw_proto: IPPROTO_UDP,
            ..Default::default()
        }
    }

    #[test]
    fn exact_flow_not_admitted() {
        let mut t = LinearTable::new(4);
        let flow = Arc::new(Flow::new(
            MatchSpec::exact(packet_key(0x0a00_0005)),
            0,
            FLOW_PERMANENT,
            FLOW_PERMANENT,
            vec![],
            Moment::now(),
        ));
        assert!(!t.insert(flow));
    }

    #[test]
    fn highest_priority_wins() {
        let mut t = LinearTable::new(4);
        assert!(t.insert(wild_flow(100, 7)));
        assert!(t.insert(wild_flow(200, 4)));

        let hit = t.lookup(&packet_key(0x0a00_0005)).unwrap();
        assert_eq!(hit.priority(), 200);
        assert_eq!(hit.actions()[0], Action::Output { port: 4, max_len: 0 });
    }

    #[test]
    fn equal_priority_ties_go_to_the_elder() {
        // Two rules distinguishable only by action.
        let mut t = LinearTable::new(4);
        let older = Arc::new(Flow::new(
            prefix_spec(0),
            50,
            FLOW_PERMANENT,
            FLOW_PERMANENT,
            vec![Action::Output { port: 1, max_len: 0 }],
            Moment::now(),
        ));
        let mut raw = prefix_spec(0).to_wire();
        raw.wildcards =
            (u32::from_be_bytes(raw.wildcards) & !wildcard::NW_PROTO)
                .to_be_bytes();
        raw.nw_proto = IPPROTO_UDP;
        let newer = Arc::new(Flow::new(
            MatchSpec::from_wire(&raw),
            50,
            FLOW_PERMANENT,
            FLOW_PERMANENT,
            vec![Action::Output { port: 2, max_len: 0 }],
            Moment::now(),
        ));

        assert!(t.insert(older));
        assert!(t.insert(newer));
        let hit = t.lookup(&packet_key(0x0a00_0005)).unwrap();
        assert_eq!(hit.actions()[0], Action::Output { port: 1, max_len: 0 });
    }

    #[test]
    fn same_match_and_priority_replaces_in_place() {
        let mut t = LinearTable::new(4);
        assert!(t.insert(wild_flow(100, 7)));
        assert!(t.insert(wild_flow(100, 9)));
        assert_eq!(t.stats().n_flows, 1);

        let hit = t.lookup(&packet_key(0x0a00_0005)).unwrap();
        assert_eq!(hit.actions()[0], Action::Output { port: 9, max_len: 0 });
    }

    #[test]
    fn capacity_bound_refuses_new_matches() {
        let mut t = LinearTable::new(1);
        assert!(t.insert(wild_flow(100, 7)));

        let mut raw = prefix_spec(0).to_wire();
        raw.nw_dst = [10, 0, 1, 0];
        let other = Arc::new(Flow::new(
            MatchSpec::from_wire(&raw),
            100,
            FLOW_PERMANENT,
            FLOW_PERMANENT,
            vec![],
            Moment::now(),
        ));
        assert!(!t.insert(other));
    }

    #[test]
    fn strict_delete_requires_priority() {
        let mut t = LinearTable::new(4);
        t.insert(wild_flow(100, 7));

        assert_eq!(t.delete(&prefix_spec(0), 99, true), 0);
        assert_eq!(t.delete(&prefix_spec(0), 100, true), 1);
    }

    #[test]
    fn nonstrict_delete_uses_overlap() {
        let mut t = LinearTable::new(4);
        t.insert(wild_flow(100, 7));

        // A narrower template (exact nw_dst host) still overlaps the
        // /24 rule.
        let mut raw = MatchRaw::new_zeroed();
        raw.wildcards = (wildcard::ALL
            & !(wildcard::DL_TYPE | wildcard::NW_DST | wildcard::NW_DST_BITS))
            .to_be_bytes();
        raw.dl_type = ETHER_TYPE_IPV4.to_be_bytes();
        raw.nw_dst = [10, 0, 0, 5];
        let tmpl = MatchSpec::from_wire(&raw);

        assert_eq!(t.delete(&tmpl, 0, false), 1);
        assert_eq!(t.stats().n_flows, 0);
    }
}
