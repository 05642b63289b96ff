// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exact-match hash tables.
//!
//! Single-entry buckets keep the hot-path probe to one hash, one
//! compare. A collision between distinct keys is not chained; the
//! insert reports "not placed" and the chain's next stage takes the
//! flow. The double table composes two such stages under different
//! CRC polynomials.

use super::ExpiredFlow;
use super::Table;
use super::TableStats;
use crate::engine::crc32::Crc32;
use crate::engine::flow::Flow;
use crate::engine::flow::FlowKey;
use crate::engine::flow::MatchSpec;
use crate::time::Moment;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use zerocopy::AsBytes;

pub struct HashTable {
    name: &'static str,
    crc: Crc32,
    buckets: Vec<Option<Arc<Flow>>>,
    n_flows: u32,
    matched: AtomicU64,
}

impl HashTable {
    /// `n_buckets` must be a power of two.
    pub fn new(name: &'static str, polynomial: u32, n_buckets: usize) -> Self {
        assert!(n_buckets.is_power_of_two());

        Self {
            name,
            crc: Crc32::new(polynomial),
            buckets: vec![None; n_buckets],
            n_flows: 0,
            matched: AtomicU64::new(0),
        }
    }

    fn bucket_of(&self, key: &FlowKey) -> usize {
        self.crc.compute(key.as_bytes()) as usize & (self.buckets.len() - 1)
    }
}

impl Table for HashTable {
    fn name(&self) -> &'static str {
        self.name
    }

    fn lookup(&self, key: &FlowKey) -> Option<Arc<Flow>> {
        match &self.buckets[self.bucket_of(key)] {
            Some(flow) if flow.key() == key => {
                self.matched.fetch_add(1, Relaxed);
                Some(flow.clone())
            }
            _ => None,
        }
    }

    fn insert(&mut self, flow: Arc<Flow>) -> bool {
        if !flow.spec().is_exact() {
            return false;
        }

        let idx = self.bucket_of(flow.key());
        match &self.buckets[idx] {
            None => {
                self.buckets[idx] = Some(flow);
                self.n_flows += 1;
                true
            }

            // A duplicate key is replaced; the old entry lives on
            // until its last in-flight reference drops.
            Some(old) if old.key() == flow.key() => {
                self.buckets[idx] = Some(flow);
                true
            }

            Some(_) => false,
        }
    }

    fn delete(
        &mut self,
        tmpl: &MatchSpec,
        _priority: u16,
        strict: bool,
    ) -> usize {
        if tmpl.is_exact() {
            let idx = self.bucket_of(&tmpl.key);
            match &self.buckets[idx] {
                Some(flow) if flow.key() == &tmpl.key => {
                    self.buckets[idx] = None;
                    self.n_flows -= 1;
                    1
                }
                _ => 0,
            }
        } else {
            let mut count = 0;
            for bucket in &mut self.buckets {
                let matches = match bucket {
                    Some(flow) => flow.spec().selected_by(tmpl, strict),
                    None => false,
                };
                if matches {
                    *bucket = None;
                    count += 1;
                }
            }
            self.n_flows -= count as u32;
            count
        }
    }

    fn matching(
        &self,
        tmpl: &MatchSpec,
        _priority: u16,
        strict: bool,
    ) -> Vec<Arc<Flow>> {
        self.buckets
            .iter()
            .flatten()
            .filter(|f| f.spec().selected_by(tmpl, strict))
            .cloned()
            .collect()
    }

    fn expire(&mut self, now: Moment) -> Vec<ExpiredFlow> {
        let mut expired = Vec::new();

        for bucket in &mut self.buckets {
            let reason = match bucket {
                Some(flow) => flow.expired(now),
                None => None,
            };
            if let Some(reason) = reason {
                // The take cannot miss: the bucket was Some above.
                if let Some(flow) = bucket.take() {
                    expired.push(ExpiredFlow { flow, reason });
                    self.n_flows -= 1;
                }
            }
        }

        expired
    }

    fn stats(&self) -> TableStats {
        TableStats {
            name: self.name,
            n_flows: self.n_flows,
            max_flows: self.buckets.len() as u32,
            matched: self.matched.load(Relaxed),
        }
    }

    fn dump(&self) -> Vec<Arc<Flow>> {
        self.buckets.iter().flatten().cloned().collect()
    }
}

/// Two hash stages with independent polynomials presented as one
/// table: insertion tries the first, then the second.
pub struct DoubleHash {
    sub: [HashTable; 2],
}

impl DoubleHash {
    pub fn new(
        poly0: u32,
        buckets0: usize,
        poly1: u32,
        buckets1: usize,
    ) -> Self {
        Self {
            sub: [
                HashTable::new("hash2a", poly0, buckets0),
                HashTable::new("hash2b", poly1, buckets1),
            ],
        }
    }
}

impl Table for DoubleHash {
    fn name(&self) -> &'static str {
        "hash2"
    }

    fn lookup(&self, key: &FlowKey) -> Option<Arc<Flow>> {
        self.sub.iter().find_map(|t| t.lookup(key))
    }

    fn insert(&mut self, flow: Arc<Flow>) -> bool {
        if self.sub[0].insert(flow.clone()) {
            return true;
        }
        self.sub[1].insert(flow)
    }

    fn delete(
        &mut self,
        tmpl: &MatchSpec,
        priority: u16,
        strict: bool,
    ) -> usize {
        self.sub.iter_mut().map(|t| t.delete(tmpl, priority, strict)).sum()
    }

    fn matching(
        &self,
        tmpl: &MatchSpec,
        priority: u16,
        strict: bool,
    ) -> Vec<Arc<Flow>> {
        let mut out = self.sub[0].matching(tmpl, priority, strict);
        out.extend(self.sub[1].matching(tmpl, priority, strict));
        out
    }

    fn expire(&mut self, now: Moment) -> Vec<ExpiredFlow> {
        let mut out = self.sub[0].expire(now);
        out.extend(self.sub[1].expire(now));
        out
    }

    fn stats(&self) -> TableStats {
        let a = self.sub[0].stats();
        let b = self.sub[1].stats();
        TableStats {
            name: self.name(),
            n_flows: a.n_flows + b.n_flows,
            max_flows: a.max_flows + b.max_flows,
            matched: a.matched + b.matched,
        }
    }

    fn dump(&self) -> Vec<Arc<Flow>> {
        let mut out = self.sub[0].dump();
        out.extend(self.sub[1].dump());
        out
    }
}
