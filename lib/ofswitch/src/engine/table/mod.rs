// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Individual flow tables. Tables are composed into a chain (see
//! [`crate::engine::chain`]); each accepts only the flows it can
//! store and reports "not placed" otherwise so the chain can try the
//! next stage.

pub mod hash;
pub mod linear;

pub use hash::DoubleHash;
pub use hash::HashTable;
pub use linear::LinearTable;

use crate::engine::flow::ExpiredReason;
use crate::engine::flow::Flow;
use crate::engine::flow::FlowKey;
use crate::engine::flow::MatchSpec;
use crate::time::Moment;
use serde::Serialize;
use std::sync::Arc;

/// Buckets per exact-hash stage.
pub const TABLE_HASH_BUCKETS: usize = 1024;

/// Bound on the wildcard stage, whose lookup is a linear scan.
pub const TABLE_LINEAR_MAX_FLOWS: usize = 100;

/// A flow removed by the timeout sweep, with the rule that fired.
#[derive(Debug)]
pub struct ExpiredFlow {
    pub flow: Arc<Flow>,
    pub reason: ExpiredReason,
}

/// Occupancy snapshot of one table.
#[derive(Clone, Debug, Serialize)]
pub struct TableStats {
    pub name: &'static str,
    pub n_flows: u32,
    pub max_flows: u32,
    pub matched: u64,
}

/// One stage of the lookup chain.
pub trait Table: Send {
    fn name(&self) -> &'static str;

    /// Find the flow matching a packet key (all wildcard bits clear).
    fn lookup(&self, key: &FlowKey) -> Option<Arc<Flow>>;

    /// Take ownership of `flow`, replacing any duplicate. `false`
    /// means the flow was not placed — wrong kind or no room — and
    /// the caller keeps going.
    fn insert(&mut self, flow: Arc<Flow>) -> bool;

    /// Remove every flow the template selects; returns how many.
    fn delete(&mut self, tmpl: &MatchSpec, priority: u16, strict: bool)
        -> usize;

    /// The flows the template selects, for action-program replacement
    /// and stats enumeration.
    fn matching(
        &self,
        tmpl: &MatchSpec,
        priority: u16,
        strict: bool,
    ) -> Vec<Arc<Flow>>;

    /// Remove and report every flow past a timeout.
    fn expire(&mut self, now: Moment) -> Vec<ExpiredFlow>;

    fn stats(&self) -> TableStats;

    /// Every resident flow, in table order.
    fn dump(&self) -> Vec<Arc<Flow>>;
}
