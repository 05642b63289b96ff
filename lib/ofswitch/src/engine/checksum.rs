// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Internet checksums.
//!
//! Checksum bytes are never byte-swapped: both the field and the data
//! being summed are treated as native 16-bit words, which is correct
//! on either endianness because the inputs are all in network order
//! (RFC 1071 §1.B). Header rewrites use the incremental update of
//! RFC 1624 so only the changed words are revisited.

/// New checksum for a header in which a 16-bit field changed from
/// `old` to `new` (RFC 1624 equation 3).
pub fn recalc16(old_csum: [u8; 2], old: [u8; 2], new: [u8; 2]) -> [u8; 2] {
    let hc_complement = !u16::from_ne_bytes(old_csum);
    let m_complement = !u16::from_ne_bytes(old);
    let m_prime = u16::from_ne_bytes(new);

    let sum =
        u32::from(hc_complement) + u32::from(m_complement) + u32::from(m_prime);
    let hc_prime_complement = sum.wrapping_add(sum >> 16) as u16;
    (!hc_prime_complement).to_ne_bytes()
}

/// New checksum for a header in which a 32-bit field changed from
/// `old` to `new`.
pub fn recalc32(old_csum: [u8; 2], old: [u8; 4], new: [u8; 4]) -> [u8; 2] {
    let csum = recalc16(old_csum, [old[0], old[1]], [new[0], new[1]]);
    recalc16(csum, [old[2], old[3]], [new[2], new[3]])
}

/// A ones-complement sum accumulated from byte slices; used where a
/// checksum must be computed from scratch (validation in tests, and
/// pseudo-header sums).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    sum: u32,
}

impl Checksum {
    pub fn compute(bytes: &[u8]) -> Self {
        let mut csum = Self::default();
        csum.add(bytes);
        csum
    }

    pub fn add(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(2);
        for pair in &mut chunks {
            self.sum += u32::from(u16::from_ne_bytes([pair[0], pair[1]]));
        }
        if let [odd] = chunks.remainder() {
            self.sum += u32::from(u16::from_ne_bytes([*odd, 0]));
        }
    }

    /// Fold the carries and return the header form (the complement of
    /// the sum), as bytes.
    pub fn finalize(mut self) -> [u8; 2] {
        while self.sum >> 16 != 0 {
            self.sum = (self.sum >> 16) + (self.sum & 0xffff);
        }
        (!(self.sum as u16)).to_ne_bytes()
    }
}
