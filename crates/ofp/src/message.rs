// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound message assembly.

use crate::wire::HeaderRaw;
use crate::MessageType;
use crate::OFP_HEADER_LEN;
use crate::OFP_VERSION;
use zerocopy::AsBytes;

/// Builds one outbound message: reserves the fixed header, accumulates
/// body bytes, and patches the length on `finish`.
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    pub fn new(msg_type: MessageType, xid: u32) -> Self {
        let hdr = HeaderRaw {
            version: OFP_VERSION,
            msg_type: msg_type as u8,
            length: [0; 2],
            xid: xid.to_be_bytes(),
        };

        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(hdr.as_bytes());
        Self { buf }
    }

    /// Append a raw wire struct.
    pub fn push<T: AsBytes>(&mut self, value: &T) -> &mut Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Bytes accumulated so far, header included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Patch the header length and return the encoded message. A body
    /// that has outgrown the 16-bit length field is truncated to the
    /// header alone; callers bound their bodies well below this.
    pub fn finish(mut self) -> Vec<u8> {
        if self.buf.len() > u16::MAX as usize {
            self.buf.truncate(OFP_HEADER_LEN);
        }

        let len = (self.buf.len() as u16).to_be_bytes();
        self.buf[2..4].copy_from_slice(&len);
        self.buf
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::SwitchConfigRaw;
    use zerocopy::FromBytes;

    #[test]
    fn builder_patches_length() {
        let mut b = MessageBuilder::new(MessageType::GetConfigReply, 77);
        b.push(&SwitchConfigRaw {
            flags: 0u16.to_be_bytes(),
            miss_send_len: 128u16.to_be_bytes(),
        });
        let msg = b.finish();

        let hdr = HeaderRaw::read_from_prefix(&msg[..]).unwrap();
        assert_eq!(hdr.version, OFP_VERSION);
        assert_eq!(hdr.msg_type, MessageType::GetConfigReply as u8);
        assert_eq!(hdr.length() as usize, msg.len());
        assert_eq!(hdr.xid(), 77);
        assert_eq!(msg.len(), OFP_HEADER_LEN + SwitchConfigRaw::SIZE);
    }

    #[test]
    fn header_only_message() {
        let msg = MessageBuilder::new(MessageType::Hello, 0).finish();
        assert_eq!(msg.len(), OFP_HEADER_LEN);
        let hdr = HeaderRaw::read_from_prefix(&msg[..]).unwrap();
        assert_eq!(hdr.length(), OFP_HEADER_LEN as u16);
    }
}
