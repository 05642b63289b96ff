// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The ordered composition of flow tables.
//!
//! Lookups and inserts try the stages in order and stop at the first
//! hit or acceptance; the table order is what gives exact matches
//! their implicit priority over wildcard rules.

use crate::engine::flow::Flow;
use crate::engine::flow::FlowKey;
use crate::engine::flow::MatchSpec;
use crate::engine::table::DoubleHash;
use crate::engine::table::ExpiredFlow;
use crate::engine::table::HashTable;
use crate::engine::table::LinearTable;
use crate::engine::table::Table;
use crate::engine::table::TableStats;
use crate::engine::table::TABLE_HASH_BUCKETS;
use crate::engine::table::TABLE_LINEAR_MAX_FLOWS;
use crate::time::Moment;
use crate::SwitchError;
use ofp::Action;
use std::sync::Arc;

/// CRC polynomials for the three exact-hash stages. Distinct
/// polynomials keep one adversarial key set from colliding in every
/// stage at once.
const CRC_POLY_HASH: u32 = 0x04c1_1db7;
const CRC_POLY_HASH2A: u32 = 0x1edc_6f41;
const CRC_POLY_HASH2B: u32 = 0x741b_8cd7;

pub struct Chain {
    tables: Vec<Box<dyn Table>>,
}

impl Chain {
    pub fn new() -> Self {
        let tables: Vec<Box<dyn Table>> = vec![
            Box::new(HashTable::new(
                "hash",
                CRC_POLY_HASH,
                TABLE_HASH_BUCKETS,
            )),
            Box::new(DoubleHash::new(
                CRC_POLY_HASH2A,
                TABLE_HASH_BUCKETS,
                CRC_POLY_HASH2B,
                TABLE_HASH_BUCKETS,
            )),
            Box::new(LinearTable::new(TABLE_LINEAR_MAX_FLOWS)),
        ];

        Self { tables }
    }

    /// First matching flow in table order.
    pub fn lookup(&self, key: &FlowKey) -> Option<Arc<Flow>> {
        self.tables.iter().find_map(|t| t.lookup(key))
    }

    /// Offer `flow` to each table in order; the first to accept takes
    /// ownership. Returns the accepting table's index.
    pub fn insert(&mut self, flow: Arc<Flow>) -> Result<usize, SwitchError> {
        for (i, table) in self.tables.iter_mut().enumerate() {
            if table.insert(flow.clone()) {
                return Ok(i);
            }
        }

        Err(SwitchError::TableFull)
    }

    /// Remove every selected flow across all tables.
    pub fn delete(
        &mut self,
        tmpl: &MatchSpec,
        priority: u16,
        strict: bool,
    ) -> usize {
        self.tables
            .iter_mut()
            .map(|t| t.delete(tmpl, priority, strict))
            .sum()
    }

    /// Swap the action program of every selected flow; the displaced
    /// programs are freed as their readers finish. Returns how many
    /// flows changed.
    pub fn replace_actions(
        &mut self,
        tmpl: &MatchSpec,
        priority: u16,
        strict: bool,
        actions: &[Action],
    ) -> usize {
        let mut count = 0;

        for table in &self.tables {
            for flow in table.matching(tmpl, priority, strict) {
                flow.replace_actions(actions.to_vec());
                count += 1;
            }
        }

        count
    }

    /// Flows the template selects, tagged with their table index.
    pub fn matching(
        &self,
        tmpl: &MatchSpec,
        priority: u16,
        strict: bool,
    ) -> Vec<(u8, Arc<Flow>)> {
        let mut out = Vec::new();
        for (i, table) in self.tables.iter().enumerate() {
            for flow in table.matching(tmpl, priority, strict) {
                out.push((i as u8, flow));
            }
        }
        out
    }

    /// Remove and report every expired flow.
    pub fn expire(&mut self, now: Moment) -> Vec<ExpiredFlow> {
        let mut expired = Vec::new();
        for table in &mut self.tables {
            expired.extend(table.expire(now));
        }
        expired
    }

    pub fn stats(&self) -> Vec<TableStats> {
        self.tables.iter().map(|t| t.stats()).collect()
    }

    pub fn n_flows(&self) -> u32 {
        self.tables.iter().map(|t| t.stats().n_flows).sum()
    }

    /// Capacity of the exact-match stages, for the features reply.
    pub fn exact_capacity(&self) -> u32 {
        (3 * TABLE_HASH_BUCKETS) as u32
    }

    /// Capacity of the wildcard stage, for the features reply.
    pub fn wildcard_capacity(&self) -> u32 {
        TABLE_LINEAR_MAX_FLOWS as u32
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
