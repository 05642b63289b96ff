// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The controller channel.
//!
//! The channel owns a byte stream to the controller, frames messages
//! by the length in the fixed header, and queues outbound messages
//! while the stream is down. A reliable channel reconnects with
//! exponential backoff; an unreliable one surfaces the drop and the
//! datapath terminates.

use crate::time::Moment;
use crate::SwitchError;
use ofp::HeaderRaw;
use ofp::OFP_HEADER_LEN;
use std::collections::VecDeque;
use std::io;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::time::Duration;
use zerocopy::FromBytes;

const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// A non-blocking byte stream to the controller. `recv` returning
/// zero means the peer closed; `WouldBlock` means nothing pending.
pub trait ControlStream: Send {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Produces fresh streams for each (re)connection attempt.
pub trait Connector: Send {
    fn connect(&mut self) -> io::Result<Box<dyn ControlStream>>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reliability {
    /// Reconnect forever, backing off exponentially.
    Reliable,
    /// A dropped connection takes the datapath down with it.
    Unreliable,
}

pub struct RemoteChannel {
    connector: Option<Box<dyn Connector>>,
    reliability: Reliability,
    stream: Option<Box<dyn ControlStream>>,
    inbuf: Vec<u8>,
    outq: VecDeque<Vec<u8>>,
    out_pos: usize,
    backoff: Duration,
    retry_at: Option<Moment>,
}

impl RemoteChannel {
    /// A channel with no transport: outbound messages accumulate
    /// until drained. Used standalone and by tests that drive the
    /// dispatch layer directly.
    pub fn detached() -> Self {
        Self {
            connector: None,
            reliability: Reliability::Reliable,
            stream: None,
            inbuf: Vec::new(),
            outq: VecDeque::new(),
            out_pos: 0,
            backoff: BACKOFF_START,
            retry_at: None,
        }
    }

    pub fn new(
        connector: Box<dyn Connector>,
        reliability: Reliability,
    ) -> Self {
        let mut ch = Self::detached();
        ch.connector = Some(connector);
        ch.reliability = reliability;
        ch
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Queue one outbound message.
    pub fn send(&mut self, msg: Vec<u8>) {
        self.outq.push_back(msg);
    }

    /// Pull every queued-but-unsent outbound message. Diagnostic
    /// surface; the poll loop normally flushes the queue itself.
    pub fn drain_outbound(&mut self) -> Vec<Vec<u8>> {
        self.out_pos = 0;
        self.outq.drain(..).collect()
    }

    /// Drive the channel: connect when due, flush the outbound
    /// queue, and collect complete inbound messages.
    pub fn run(&mut self, now: Moment) -> Result<Vec<Vec<u8>>, SwitchError> {
        if self.stream.is_none() {
            self.try_connect(now);
        }

        let Some(mut stream) = self.stream.take() else {
            return Ok(Vec::new());
        };

        match self.pump(stream.as_mut()) {
            Ok(msgs) => {
                self.stream = Some(stream);
                Ok(msgs)
            }
            Err(err) => {
                tracing::warn!(%err, "controller connection lost");
                self.inbuf.clear();
                self.out_pos = 0;

                match self.reliability {
                    Reliability::Unreliable => Err(SwitchError::Disconnected),
                    Reliability::Reliable => {
                        self.retry_at = Some(now + self.backoff);
                        self.backoff = (self.backoff * 2).min(BACKOFF_MAX);
                        Ok(Vec::new())
                    }
                }
            }
        }
    }

    fn try_connect(&mut self, now: Moment) {
        let due = match self.retry_at {
            Some(at) => now >= at,
            None => true,
        };
        let Some(connector) = self.connector.as_mut() else {
            return;
        };
        if !due {
            return;
        }

        match connector.connect() {
            Ok(stream) => {
                tracing::info!("controller connected");
                self.stream = Some(stream);
                self.backoff = BACKOFF_START;
                self.retry_at = None;
            }
            Err(err) => {
                tracing::debug!(%err, backoff = ?self.backoff, "connect failed");
                self.retry_at = Some(now + self.backoff);
                self.backoff = (self.backoff * 2).min(BACKOFF_MAX);
            }
        }
    }

    /// Flush and read on the live stream. Any hard error or close
    /// tears the connection down.
    fn pump(
        &mut self,
        stream: &mut dyn ControlStream,
    ) -> io::Result<Vec<Vec<u8>>> {
        // Flush as much of the queue as the stream will take.
        while let Some(front) = self.outq.front() {
            match stream.send(&front[self.out_pos..]) {
                Ok(0) => {
                    return Err(io::Error::from(io::ErrorKind::WriteZero))
                }
                Ok(n) => {
                    self.out_pos += n;
                    if self.out_pos == front.len() {
                        self.outq.pop_front();
                        self.out_pos = 0;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(err),
            }
        }

        // Accumulate inbound bytes.
        let mut buf = [0u8; 4096];
        loop {
            match stream.recv(&mut buf) {
                Ok(0) => {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof))
                }
                Ok(n) => self.inbuf.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(err),
            }
        }

        // Split complete messages out by the header length.
        let mut msgs = Vec::new();
        while self.inbuf.len() >= OFP_HEADER_LEN {
            let Some(hdr) = HeaderRaw::read_from_prefix(&self.inbuf[..]) else {
                break;
            };
            let msg_len = usize::from(hdr.length());

            if msg_len < OFP_HEADER_LEN {
                // A length shorter than its own header can never
                // frame correctly again; drop the connection.
                return Err(io::Error::from(io::ErrorKind::InvalidData));
            }
            if self.inbuf.len() < msg_len {
                break;
            }

            msgs.push(self.inbuf.drain(..msg_len).collect());
        }

        Ok(msgs)
    }
}

impl ControlStream for TcpStream {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

/// Connects to a controller's listening TCP address.
pub struct TcpConnector {
    addr: SocketAddr,
}

impl TcpConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl Connector for TcpConnector {
    fn connect(&mut self) -> io::Result<Box<dyn ControlStream>> {
        let stream = TcpStream::connect(self.addr)?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
