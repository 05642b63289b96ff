// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An OpenFlow 0x83 switch datapath.
//!
//! The engine forwards Ethernet frames at a packet-per-poll cadence:
//! each frame is reduced to a canonical flow key, matched against a
//! three-table chain (two exact-hash stages and a priority-ordered
//! wildcard stage), and either rewritten/forwarded by the matching
//! flow's action program or punted to the controller through a
//! short-lived packet buffer. The controller installs and removes
//! flows over the 0x83 control protocol (see the `ofp` crate) while
//! packets continue to move.
//!
//! The reference deployment is a cooperative single-threaded poll
//! loop: [`engine::datapath::Datapath::run_once`] drives flow
//! expiration, the controller channel, and per-port receive in turn,
//! and every handler runs to completion. Shared pieces that outlive a
//! single handler (flow entries, action programs, buffered packets)
//! are reference counted so a replaced entry's storage survives until
//! the last in-flight user drops it.

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

use thiserror::Error;

pub mod engine;
pub mod time;

/// Errors surfaced by the engine. The control-path variants map onto
/// the wire error kinds; the rest stay internal.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("action program rejected: {0}")]
    BadAction(&'static str),

    #[error("no flow table accepted the entry")]
    TableFull,

    #[error("unknown or expired buffer id {0:#010x}")]
    BufferUnknown(u32),

    #[error("port {0} is already registered")]
    PortInUse(u16),

    #[error("no physical port numbers left")]
    PortsFull,

    #[error("controller connection closed")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SwitchError {
    /// The wire error kind for this failure, if it is one the
    /// controller should hear about.
    pub fn error_kind(&self) -> Option<ofp::ErrorKind> {
        match self {
            Self::BadAction(_) => Some(ofp::ErrorKind::BadAction),
            Self::TableFull => Some(ofp::ErrorKind::FlowTableFull),
            Self::BufferUnknown(_) => Some(ofp::ErrorKind::BufferUnknown),
            _ => None,
        }
    }
}
