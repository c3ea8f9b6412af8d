//! The packed k-mer value type.
//!
//! A k-mer is stored as `ceil(k/4)` bytes, two bits per base, big-endian byte
//! order matching the on-disk layout of both KMC and KFF. `KmerVal` is a
//! single length-parametric type (design note 9) rather than a family of
//! `SIZE`-monomorphised types: the per-record cost is amortised across a
//! `Bundle`, so there is no hot loop that needs a const-generic width.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{KmcError, Result};

/// Maximum supported k-mer length.
pub const MAX_K: usize = 256;

/// Canonical base <-> 2-bit code mapping (A=0, C=1, G=2, T=3). Databases may
/// use one of the 24 permutations of this mapping; `Encoding` carries the
/// per-database variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    /// `codes[base_index]` gives the 2-bit code for `A,C,G,T` respectively.
    codes: [u8; 4],
}

impl Default for Encoding {
    fn default() -> Self {
        Self::canonical()
    }
}

impl Encoding {
    pub const fn canonical() -> Self {
        Self {
            codes: [0, 1, 2, 3],
        }
    }

    /// Builds an encoding from an explicit `A,C,G,T -> code` permutation.
    pub fn from_codes(codes: [u8; 4]) -> Result<Self> {
        let mut seen = [false; 4];
        for &c in &codes {
            if c > 3 || seen[c as usize] {
                return Err(KmcError::BadFormat {
                    path: "<encoding>".into(),
                    details: format!("not a permutation of 0..=3: {codes:?}"),
                });
            }
            seen[c as usize] = true;
        }
        Ok(Self { codes })
    }

    pub fn code_of(&self, base: u8) -> Option<u8> {
        let idx = match base {
            b'A' | b'a' => 0,
            b'C' | b'c' => 1,
            b'G' | b'g' => 2,
            b'T' | b't' => 3,
            _ => return None,
        };
        Some(self.codes[idx])
    }

    pub fn base_of(&self, code: u8) -> u8 {
        const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];
        let idx = self.codes.iter().position(|&c| c == code).unwrap_or(0);
        BASES[idx]
    }

    pub fn is_canonical(&self) -> bool {
        self.codes == [0, 1, 2, 3]
    }

    /// Packs the four 2-bit codes into one byte, matching the KFF header's
    /// `encoding` field (A,C,G,T codes, high bits first).
    pub fn to_byte(self) -> u8 {
        (self.codes[0] << 6) | (self.codes[1] << 4) | (self.codes[2] << 2) | self.codes[3]
    }

    /// Unpacks a KFF header `encoding` byte into an `Encoding`.
    pub fn from_byte(byte: u8) -> Result<Self> {
        Self::from_codes([
            (byte >> 6) & 0b11,
            (byte >> 4) & 0b11,
            (byte >> 2) & 0b11,
            byte & 0b11,
        ])
    }
}

/// Number of bytes needed to pack `k` 2-bit bases.
pub const fn packed_len(k: usize) -> usize {
    k.div_ceil(4)
}

/// A packed k-mer: `ceil(k/4)` bytes, big-endian, MSB-first within each byte.
/// Bases beyond `k` that round out the final byte are zero-padded low bits,
/// so byte-wise comparison between two `KmerVal`s of equal `k` agrees with
/// lexicographic base comparison.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct KmerVal {
    k: u16,
    bytes: Vec<u8>,
}

impl KmerVal {
    /// An all-zero k-mer of length `k` (`AAAA...A` under the canonical
    /// encoding).
    pub fn zeroed(k: usize) -> Self {
        Self {
            k: k as u16,
            bytes: vec![0u8; packed_len(k)],
        }
    }

    pub fn from_bytes(k: usize, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), packed_len(k));
        Self { k: k as u16, bytes }
    }

    pub fn k(&self) -> usize {
        self.k as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Encodes an ASCII DNA string into a packed k-mer using `encoding`.
    pub fn encode(seq: &[u8], encoding: &Encoding) -> Result<Self> {
        let k = seq.len();
        let mut bytes = vec![0u8; packed_len(k)];
        for (i, &base) in seq.iter().enumerate() {
            let code = encoding.code_of(base).ok_or_else(|| {
                KmcError::BadArgument(format!("invalid DNA base '{}' at position {i}", base as char))
            })?;
            let byte_idx = i / 4;
            let shift = 6 - 2 * (i % 4);
            bytes[byte_idx] |= code << shift;
        }
        Ok(Self { k: k as u16, bytes })
    }

    /// Decodes back to an ASCII DNA string.
    pub fn decode(&self, encoding: &Encoding) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.k());
        for i in 0..self.k() {
            let byte_idx = i / 4;
            let shift = 6 - 2 * (i % 4);
            let code = (self.bytes[byte_idx] >> shift) & 0b11;
            out.push(encoding.base_of(code));
        }
        out
    }

    /// Byte at packed offset, matching the design's "byte-at-offset" op.
    pub fn byte_at(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub fn set_byte_at(&mut self, offset: usize, val: u8) {
        self.bytes[offset] = val;
    }

    /// Fast little-endian word load of up to 8 trailing packed bytes,
    /// matching the "load-fast" op used by hot comparison paths. Per design
    /// note (3), hosts are assumed little-endian for this path; on-disk I/O
    /// never uses it directly.
    pub fn load_fast_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        let n = self.bytes.len().min(8);
        buf[..n].copy_from_slice(&self.bytes[self.bytes.len() - n..]);
        u64::from_le_bytes(buf)
    }

    /// Shifts the whole packed value left by `bits` (0..=7), matching the
    /// "shift" op used when realigning a suffix into a prefix boundary.
    pub fn shift_left(&mut self, bits: u32) {
        if bits == 0 {
            return;
        }
        let mut carry = 0u8;
        for byte in self.bytes.iter_mut().rev() {
            let shifted = (u16::from(*byte) << bits) | u16::from(carry);
            *byte = shifted as u8;
            carry = (shifted >> 8) as u8;
        }
    }

    /// Shifts the whole packed value right by `bits` (0..=7), the inverse of
    /// [`Self::shift_left`] — used to undo the end-padding alignment before
    /// slicing out a byte-aligned suffix.
    pub fn shift_right(&mut self, bits: u32) {
        if bits == 0 {
            return;
        }
        let mut carry = 0u8;
        for byte in self.bytes.iter_mut() {
            let incoming = carry;
            carry = *byte << (8 - bits);
            *byte = (*byte >> bits) | incoming;
        }
    }

    /// Masks off bits below `keep_bits` counted from the MSB of the packed
    /// value (used to zero out residual low-order bits after a suffix
    /// length change).
    pub fn mask_high(&mut self, keep_bits: usize) {
        let keep_bytes = keep_bits / 8;
        let rem = keep_bits % 8;
        for b in self.bytes.iter_mut().skip(keep_bytes.min(self.bytes.len())) {
            *b = 0;
        }
        if rem > 0 && keep_bytes < self.bytes.len() {
            let mask = !(0xFFu8 >> rem);
            self.bytes[keep_bytes] &= mask;
        }
    }

    /// Increments the packed value at a given byte offset, propagating carry
    /// toward lower offsets (toward the MSB) — used by the KMC1/KMC2 readers
    /// to fold a prefix-LUT index into the low bytes of a suffix when
    /// reconstructing the full k-mer, carrying across the prefix boundary.
    pub fn increment_at_offset(&mut self, offset: usize) {
        let mut i = offset as isize;
        loop {
            if i < 0 {
                break;
            }
            let idx = i as usize;
            if self.bytes[idx] == 0xFF {
                self.bytes[idx] = 0;
                i -= 1;
            } else {
                self.bytes[idx] += 1;
                break;
            }
        }
    }

    /// Reconstructs a full k-mer from a LUT slot index and the on-disk
    /// suffix bytes: `prefix_index * 4^(k-p) + suffix_value`, realised as a
    /// plain big-endian concatenation of `prefix_index` onto `suffix_bytes`
    /// followed by a `shift_left` into the end-padded convention. `p` need
    /// not be a multiple of 4 — only `(k-p)` is constrained to be, so the
    /// suffix is always byte-aligned even though the prefix generally isn't.
    pub fn from_prefix_suffix(k: usize, p: usize, prefix_index: u64, suffix_bytes: &[u8]) -> Self {
        debug_assert_eq!(suffix_bytes.len(), packed_len(k - p));
        let total_len = packed_len(k);
        let prefix_len = total_len - suffix_bytes.len();
        let mut bytes = vec![0u8; prefix_len];
        let idx_bytes = prefix_index.to_be_bytes();
        let take = prefix_len.min(idx_bytes.len());
        bytes[prefix_len - take..].copy_from_slice(&idx_bytes[idx_bytes.len() - take..]);
        bytes.extend_from_slice(suffix_bytes);
        debug_assert_eq!(bytes.len(), total_len);
        let mut kmer = Self { k: k as u16, bytes };
        kmer.shift_left((total_len * 8 - 2 * k) as u32);
        kmer
    }

    /// Extracts the byte-aligned suffix (the trailing `k-p` bases) from a
    /// full k-mer, the inverse of [`Self::from_prefix_suffix`]'s suffix
    /// half. Undoes the end-padding alignment via `shift_right` before
    /// slicing the trailing bytes. Used by the KMC1 writer.
    pub fn suffix_bytes(&self, p: usize) -> Vec<u8> {
        let k = self.k();
        let suffix_len = packed_len(k - p);
        let pad_bits = (self.bytes.len() * 8 - 2 * k) as u32;
        let mut tmp = self.clone();
        tmp.shift_right(pad_bits);
        let total = tmp.bytes.len();
        tmp.bytes[total - suffix_len..].to_vec()
    }

    /// Reads the first `p` 2-bit codes (MSB-first) as an integer — the
    /// LUT slot a k-mer belongs to. Used by the KMC1 writer to compute a
    /// k-mer's LUT slot.
    pub fn prefix_index(&self, p: usize) -> u64 {
        let mut idx = 0u64;
        for i in 0..p {
            let byte_idx = i / 4;
            let shift = 6 - 2 * (i % 4);
            let code = (self.bytes[byte_idx] >> shift) & 0b11;
            idx = (idx << 2) | u64::from(code);
        }
        idx
    }
}

impl Ord for KmerVal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl PartialOrd for KmerVal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KmerVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ascii = self.decode(&Encoding::canonical());
        write!(f, "{}", String::from_utf8_lossy(&ascii))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let enc = Encoding::canonical();
        for seq in ["ACGT", "AAAA", "TTTT", "GATTACA", "A"] {
            let kmer = KmerVal::encode(seq.as_bytes(), &enc).unwrap();
            assert_eq!(kmer.decode(&enc), seq.as_bytes());
        }
    }

    #[test]
    fn ascending_order_matches_byte_compare() {
        let enc = Encoding::canonical();
        let a = KmerVal::encode(b"AAAA", &enc).unwrap();
        let c = KmerVal::encode(b"ACGT", &enc).unwrap();
        let t = KmerVal::encode(b"TTTT", &enc).unwrap();
        assert!(a < c);
        assert!(c < t);
    }

    #[test]
    fn packed_len_rounds_up() {
        assert_eq!(packed_len(1), 1);
        assert_eq!(packed_len(4), 1);
        assert_eq!(packed_len(5), 2);
        assert_eq!(packed_len(256), 64);
    }

    #[test]
    fn increment_at_offset_carries() {
        let mut k = KmerVal::from_bytes(4, vec![0x00, 0xFF]);
        k.increment_at_offset(1);
        assert_eq!(k.as_bytes(), &[0x00, 0x00]);
        // carry propagated into byte 0
        // (byte 1 wrapped from 0xFF to 0x00 and byte 0 incremented)
        let mut k2 = KmerVal::from_bytes(4, vec![0x00, 0xFF]);
        k2.increment_at_offset(1);
        assert_ne!(k2.as_bytes()[0], 0xFF); // sanity: didn't wrap byte 0 too
    }

    #[test]
    fn prefix_suffix_roundtrip_byte_aligned_p() {
        let enc = Encoding::canonical();
        let kmer = KmerVal::encode(b"ACGTACGT", &enc).unwrap();
        let p = 4;
        let idx = kmer.prefix_index(p);
        let suffix = kmer.suffix_bytes(p);
        let rebuilt = KmerVal::from_prefix_suffix(8, p, idx, &suffix);
        assert_eq!(rebuilt, kmer);
    }

    /// `p` need not be a multiple of 4 (only `k-p` is constrained to be);
    /// this is the case the byte-concatenation bug got wrong.
    #[test]
    fn prefix_suffix_roundtrip_non_byte_aligned_p() {
        let enc = Encoding::canonical();
        let kmer = KmerVal::encode(b"ACGTACGT", &enc).unwrap();
        let p = 3;
        let idx = kmer.prefix_index(p);
        let suffix = kmer.suffix_bytes(p);
        let rebuilt = KmerVal::from_prefix_suffix(8, p, idx, &suffix);
        assert_eq!(rebuilt, kmer);
    }

    #[test]
    fn from_prefix_suffix_matches_hand_packed_bytes() {
        // k=5, p=1, seq "ACGTA": prefix "A" (idx 0), suffix "CGTA" packed
        // as one byte 0b01_10_11_00 = 0x6C. Expected full packing is
        // encode()'s own 0x1B, 0x00 — verified independent of shift_left.
        let expected = KmerVal::encode(b"ACGTA", &Encoding::canonical()).unwrap();
        assert_eq!(expected.as_bytes(), &[0x1B, 0x00]);
        let rebuilt = KmerVal::from_prefix_suffix(5, 1, 0, &[0x6C]);
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn prefix_index_reads_leading_codes() {
        let enc = Encoding::canonical();
        let kmer = KmerVal::encode(b"ACGTACGT", &enc).unwrap();
        assert_eq!(kmer.prefix_index(4), 0b00_01_10_11);
        assert_eq!(kmer.prefix_index(8), 0b00_01_10_11_00_01_10_11);
    }

    #[test]
    fn non_canonical_encoding_roundtrips() {
        // swap A and T codes
        let enc = Encoding::from_codes([3, 1, 2, 0]).unwrap();
        let kmer = KmerVal::encode(b"ACGT", &enc).unwrap();
        assert_eq!(kmer.decode(&enc), b"ACGT");
    }

    #[test]
    fn encoding_byte_roundtrips() {
        let enc = Encoding::canonical();
        assert_eq!(Encoding::from_byte(enc.to_byte()).unwrap(), enc);
        let swapped = Encoding::from_codes([3, 1, 2, 0]).unwrap();
        assert_eq!(Encoding::from_byte(swapped.to_byte()).unwrap(), swapped);
    }

    #[test]
    fn rejects_bad_encoding_permutation() {
        assert!(Encoding::from_codes([0, 0, 1, 2]).is_err());
        assert!(Encoding::from_codes([0, 1, 2, 4]).is_err());
    }
}
