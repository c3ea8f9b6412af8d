//! KMC1/KMC2 prefix-file header (the 56-byte footer) and the prefix/suffix
//! file magic markers (§6).

use std::path::Path;

use crate::byteorder::{read_u32_le, read_u64_le, write_u32_le, write_u64_le};
use crate::error::{KmcError, Result};

pub const PREFIX_MAGIC: &[u8; 4] = b"KMCP";
pub const SUFFIX_MAGIC: &[u8; 4] = b"KMCS";

pub const KMC1_VERSION: u32 = 0x0;
pub const KMC2_VERSION: u32 = 0x200;

/// The 56-byte field-by-field footer, plus the trailing header-offset and
/// database-version tag that follow it on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmcHeader {
    pub kmer_length: u32,
    pub mode: u32,
    pub counter_size: u32,
    pub lut_prefix_len: u32,
    pub sign_len: u32,
    pub min_count: u32,
    /// `max_count` as written by the source: low 32 bits and high 32 bits
    /// stored separately (design note 9, open question 2). Writers must
    /// populate both even though some readers only look at the low half.
    pub max_count_lo: u32,
    pub max_count_hi: u32,
    pub both_strands: u32,
    pub total_kmers: u64,
    pub db_version: u32,
}

pub const HEADER_LEN: usize = 56;

impl KmcHeader {
    pub fn max_count(&self) -> u64 {
        (u64::from(self.max_count_hi) << 32) | u64::from(self.max_count_lo)
    }

    pub fn set_max_count(&mut self, val: u64) {
        self.max_count_lo = val as u32;
        self.max_count_hi = (val >> 32) as u32;
    }

    pub fn canonical(&self) -> bool {
        self.both_strands != 0
    }

    /// Encodes the 56-byte footer (little-endian fields).
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        write_u32_le(&mut buf[0..4], self.kmer_length);
        write_u32_le(&mut buf[4..8], self.mode);
        write_u32_le(&mut buf[8..12], self.counter_size);
        write_u32_le(&mut buf[12..16], self.lut_prefix_len);
        write_u32_le(&mut buf[16..20], self.sign_len);
        write_u32_le(&mut buf[20..24], self.min_count);
        write_u32_le(&mut buf[24..28], self.max_count_lo);
        write_u32_le(&mut buf[28..32], self.max_count_hi);
        write_u32_le(&mut buf[32..36], self.both_strands);
        write_u64_le(&mut buf[36..44], self.total_kmers);
        write_u32_le(&mut buf[44..48], self.db_version);
        // bytes 48..56 reserved / zero-padded
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            kmer_length: read_u32_le(&buf[0..4]),
            mode: read_u32_le(&buf[4..8]),
            counter_size: read_u32_le(&buf[8..12]),
            lut_prefix_len: read_u32_le(&buf[12..16]),
            sign_len: read_u32_le(&buf[16..20]),
            min_count: read_u32_le(&buf[20..24]),
            max_count_lo: read_u32_le(&buf[24..28]),
            max_count_hi: read_u32_le(&buf[28..32]),
            both_strands: read_u32_le(&buf[32..36]),
            total_kmers: read_u64_le(&buf[36..44]),
            db_version: read_u32_le(&buf[44..48]),
        }
    }

    pub fn lut_entries(&self) -> usize {
        4usize.pow(self.lut_prefix_len)
    }
}

pub fn check_magic(path: &Path, buf: &[u8], expected: &[u8; 4]) -> Result<()> {
    if buf.len() < 4 || &buf[..4] != expected {
        return Err(KmcError::bad_format(
            path,
            format!(
                "expected magic {:?}, got {:?}",
                String::from_utf8_lossy(expected),
                String::from_utf8_lossy(buf.get(..4).unwrap_or(buf))
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> KmcHeader {
        KmcHeader {
            kmer_length: 25,
            mode: 0,
            counter_size: 1,
            lut_prefix_len: 6,
            sign_len: 0,
            min_count: 1,
            max_count_lo: 0,
            max_count_hi: 0,
            both_strands: 1,
            total_kmers: 12345,
            db_version: KMC1_VERSION,
        }
    }

    #[test]
    fn header_roundtrip() {
        let h = sample_header();
        let buf = h.encode();
        let h2 = KmcHeader::decode(&buf);
        assert_eq!(h, h2);
    }

    #[test]
    fn max_count_splits_across_two_words() {
        let mut h = sample_header();
        h.set_max_count(0x1_0000_0005);
        assert_eq!(h.max_count_lo, 5);
        assert_eq!(h.max_count_hi, 1);
        assert_eq!(h.max_count(), 0x1_0000_0005);
    }

    #[test]
    fn lut_entries_is_4_pow_p() {
        let h = sample_header();
        assert_eq!(h.lut_entries(), 4096);
    }

    #[test]
    fn check_magic_rejects_wrong_bytes() {
        let err = check_magic(Path::new("x"), b"XXXX", PREFIX_MAGIC);
        assert!(err.is_err());
    }
}
