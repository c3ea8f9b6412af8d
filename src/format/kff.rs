//! KFF container format structures: header, section tags, variable
//! sections, index sections, footer (§6). All multi-byte integers are
//! big-endian.

use std::collections::BTreeMap;
use std::path::Path;

use crate::byteorder::{read_i64_be, read_u64_be, write_i64_be, write_u64_be};
use crate::error::{KmcError, Result};

pub const MAGIC: &[u8; 3] = b"KFF";

/// One-byte section type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Variable,
    Raw,
    Minimizer,
    Index,
}

impl SectionType {
    pub fn tag(self) -> u8 {
        match self {
            Self::Variable => b'v',
            Self::Raw => b'r',
            Self::Minimizer => b'm',
            Self::Index => b'i',
        }
    }

    pub fn from_tag(tag: u8, path: &Path) -> Result<Self> {
        match tag {
            b'v' => Ok(Self::Variable),
            b'r' => Ok(Self::Raw),
            b'm' => Ok(Self::Minimizer),
            b'i' => Ok(Self::Index),
            other => Err(KmcError::bad_format(
                path,
                format!("unknown section type byte {:?}", other as char),
            )),
        }
    }
}

/// File header: version, encoding, canonical flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub major: u8,
    pub minor: u8,
    /// Four 2-bit codes packed into one byte (A,C,G,T -> 2-bit code).
    pub encoding: u8,
    pub all_unique: bool,
    pub canonical: bool,
    pub free_block: Vec<u8>,
}

impl Header {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.free_block.len());
        buf.extend_from_slice(MAGIC);
        buf.push(self.major);
        buf.push(self.minor);
        buf.push(self.encoding);
        buf.push(u8::from(self.all_unique));
        buf.push(u8::from(self.canonical));
        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(&(self.free_block.len() as u32).to_be_bytes());
        buf.extend_from_slice(&len_buf);
        buf.extend_from_slice(&self.free_block);
        buf
    }
}

/// A variable section: a set of NUL-terminated-name / `u64` value pairs.
/// `k`, `data_size`, `max_in_block`, `m` scope subsequent data sections
/// until the next variable section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSection {
    pub vars: BTreeMap<String, u64>,
}

impl VariableSection {
    pub fn get(&self, name: &str) -> Option<u64> {
        self.vars.get(name).copied()
    }

    pub fn k(&self) -> Option<u64> {
        self.get("k")
    }

    pub fn data_size(&self) -> Option<u64> {
        self.get("data_size")
    }

    pub fn max_in_block(&self) -> Option<u64> {
        self.get("max")
    }

    pub fn m(&self) -> Option<u64> {
        self.get("m")
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(SectionType::Variable.tag());
        let mut body = Vec::new();
        let mut n = [0u8; 8];
        write_u64_be(&mut n, self.vars.len() as u64);
        body.extend_from_slice(&n);
        for (name, val) in &self.vars {
            body.extend_from_slice(name.as_bytes());
            body.push(0);
            let mut v = [0u8; 8];
            write_u64_be(&mut v, *val);
            body.extend_from_slice(&v);
        }
        buf.extend_from_slice(&body);
        buf
    }

    /// Decodes a variable section body (after the `v` tag byte has been
    /// consumed). Returns the section and the number of bytes consumed.
    pub fn decode(buf: &[u8], path: &Path) -> Result<(Self, usize)> {
        if buf.len() < 8 {
            return Err(KmcError::bad_format(path, "truncated variable section count"));
        }
        let n = read_u64_be(&buf[0..8]) as usize;
        let mut pos = 8;
        let mut vars = BTreeMap::new();
        for _ in 0..n {
            let name_start = pos;
            while buf.get(pos).copied() != Some(0) {
                pos += 1;
                if pos >= buf.len() {
                    return Err(KmcError::bad_format(path, "unterminated variable name"));
                }
            }
            let name = String::from_utf8_lossy(&buf[name_start..pos]).into_owned();
            pos += 1; // NUL
            if buf.len() < pos + 8 {
                return Err(KmcError::bad_format(path, "truncated variable value"));
            }
            let val = read_u64_be(&buf[pos..pos + 8]);
            pos += 8;
            vars.insert(name, val);
        }
        Ok((Self { vars }, pos))
    }
}

/// One entry of an index section: the type tag of a pointed-to section and
/// its byte offset relative to the index section's own start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub section_type: u8,
    pub relative_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSection {
    pub entries: Vec<IndexEntry>,
    pub next_index_offset: u64,
}

impl IndexSection {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(SectionType::Index.tag());
        let mut n = [0u8; 8];
        write_u64_be(&mut n, self.entries.len() as u64);
        buf.extend_from_slice(&n);
        for e in &self.entries {
            buf.push(e.section_type);
            let mut off = [0u8; 8];
            write_i64_be(&mut off, e.relative_offset);
            buf.extend_from_slice(&off);
        }
        let mut next = [0u8; 8];
        write_u64_be(&mut next, self.next_index_offset);
        buf.extend_from_slice(&next);
        buf
    }

    pub fn decode(buf: &[u8], path: &Path) -> Result<Self> {
        if buf.len() < 8 {
            return Err(KmcError::bad_format(path, "truncated index section count"));
        }
        let n = read_u64_be(&buf[0..8]) as usize;
        let mut pos = 8;
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            if buf.len() < pos + 9 {
                return Err(KmcError::bad_format(path, "truncated index entry"));
            }
            let section_type = buf[pos];
            let relative_offset = read_i64_be(&buf[pos + 1..pos + 9]);
            entries.push(IndexEntry {
                section_type,
                relative_offset,
            });
            pos += 9;
        }
        if buf.len() < pos + 8 {
            return Err(KmcError::bad_format(path, "truncated next_index_offset"));
        }
        let next_index_offset = read_u64_be(&buf[pos..pos + 8]);
        Ok(Self {
            entries,
            next_index_offset,
        })
    }
}

/// Raw section record length in bytes, given `k` and `data_size`.
pub fn raw_record_len(k: u64, data_size: u64) -> usize {
    (k as usize).div_ceil(4) + data_size as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_section_roundtrip() {
        let mut vars = BTreeMap::new();
        vars.insert("k".to_string(), 25);
        vars.insert("data_size".to_string(), 1);
        vars.insert("max".to_string(), 1000);
        vars.insert("m".to_string(), 10);
        let section = VariableSection { vars };
        let encoded = section.encode();
        assert_eq!(encoded[0], b'v');
        let (decoded, consumed) = VariableSection::decode(&encoded[1..], Path::new("x")).unwrap();
        assert_eq!(decoded, section);
        assert_eq!(consumed, encoded.len() - 1);
        assert_eq!(decoded.k(), Some(25));
    }

    #[test]
    fn index_section_roundtrip() {
        let section = IndexSection {
            entries: vec![
                IndexEntry {
                    section_type: b'r',
                    relative_offset: 128,
                },
                IndexEntry {
                    section_type: b'r',
                    relative_offset: -64,
                },
            ],
            next_index_offset: 0,
        };
        let encoded = section.encode();
        let decoded = IndexSection::decode(&encoded[1..], Path::new("x")).unwrap();
        assert_eq!(decoded, section);
    }

    #[test]
    fn section_type_tag_roundtrip() {
        for t in [
            SectionType::Variable,
            SectionType::Raw,
            SectionType::Minimizer,
            SectionType::Index,
        ] {
            let tag = t.tag();
            let back = SectionType::from_tag(tag, Path::new("x")).unwrap();
            assert_eq!(back.tag(), tag);
        }
    }

    #[test]
    fn raw_record_len_accounts_for_packed_kmer() {
        assert_eq!(raw_record_len(25, 1), 7 + 1);
        assert_eq!(raw_record_len(4, 2), 1 + 2);
    }
}
