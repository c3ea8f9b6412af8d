//! KFF writer (§4.6): a single raw section per output database.
//!
//! Writes the header, a variable section advertising `k`/`data_size`/
//! `ordered`, opens one raw section, streams `⌈k/4⌉+counter_size`-byte
//! records into a buffer flushed when full, then writes the section
//! trailer, an index section pointing back at it, and the footer.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::byteorder::write_counter_be;
use crate::error::{KmcError, Result};
use crate::format::kff::{
    raw_record_len, Header, IndexEntry, IndexSection, SectionType, VariableSection,
};
use crate::kmer::{packed_len, KmerVal};
use crate::ops::RecordSink;

const RECORD_BUF_CAPACITY: usize = 16 * 1024 * 1024;

pub struct KffWriter {
    file: File,
    path: PathBuf,
    k: u64,
    data_size: u64,
    cutoff_min: u32,
    cutoff_max: u32,
    counter_max: u32,
    record_buf: Vec<u8>,
    n_records: u64,
    raw_section_offset: u64,
}

impl KffWriter {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        path: &Path,
        k: u64,
        data_size: u64,
        encoding: u8,
        canonical: bool,
        cutoff_min: u32,
        cutoff_max: u32,
        counter_max: u32,
    ) -> Result<Self> {
        let mut file = File::create(path).map_err(|e| KmcError::file_io(path, e))?;

        #[cfg(feature = "tracing")]
        tracing::info!(path = %path.display(), k, data_size, "opening KFF writer");

        let header = Header {
            major: 1,
            minor: 0,
            encoding,
            all_unique: true,
            canonical,
            free_block: Vec::new(),
        };
        file.write_all(&header.encode()).map_err(|e| KmcError::file_io(path, e))?;

        let mut vars = BTreeMap::new();
        vars.insert("k".to_string(), k);
        vars.insert("data_size".to_string(), data_size);
        vars.insert("max".to_string(), u64::from(counter_max));
        vars.insert("m".to_string(), 0);
        vars.insert("ordered".to_string(), 1);
        let var_section = VariableSection { vars };
        file.write_all(&var_section.encode())
            .map_err(|e| KmcError::file_io(path, e))?;

        let raw_section_offset = file
            .stream_position()
            .map_err(|e| KmcError::file_io(path, e))?;
        file.write_all(&[SectionType::Raw.tag()])
            .map_err(|e| KmcError::file_io(path, e))?;
        // n_blocks placeholder, patched in on close().
        file.write_all(&[0u8; 8]).map_err(|e| KmcError::file_io(path, e))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            k,
            data_size,
            cutoff_min,
            cutoff_max,
            counter_max,
            record_buf: Vec::with_capacity(RECORD_BUF_CAPACITY),
            n_records: 0,
            raw_section_offset,
        })
    }

    fn flush_record_buf(&mut self) -> Result<()> {
        if self.record_buf.is_empty() {
            return Ok(());
        }
        self.file
            .write_all(&self.record_buf)
            .map_err(|e| KmcError::file_io(&self.path, e))?;
        self.record_buf.clear();
        Ok(())
    }

    /// Patches the section's record count, writes the index section and
    /// footer.
    pub fn close(mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::info!(total = self.n_records, "closing KFF writer");
        self.flush_record_buf()?;

        let index_offset = self
            .file
            .stream_position()
            .map_err(|e| KmcError::file_io(&self.path, e))?;
        let index = IndexSection {
            entries: vec![IndexEntry {
                section_type: SectionType::Raw.tag(),
                relative_offset: self.raw_section_offset as i64 - index_offset as i64,
            }],
            next_index_offset: 0,
        };
        self.file
            .write_all(&index.encode())
            .map_err(|e| KmcError::file_io(&self.path, e))?;

        let footer_offset = self
            .file
            .stream_position()
            .map_err(|e| KmcError::file_io(&self.path, e))?;
        let mut footer_vars = BTreeMap::new();
        footer_vars.insert("first_index".to_string(), index_offset);
        let footer_section = VariableSection { vars: footer_vars };
        let footer_bytes = footer_section.encode();
        self.file
            .write_all(&footer_bytes)
            .map_err(|e| KmcError::file_io(&self.path, e))?;
        let footer_size = self
            .file
            .stream_position()
            .map_err(|e| KmcError::file_io(&self.path, e))?
            - footer_offset;
        self.file
            .write_all(&footer_size.to_be_bytes())
            .map_err(|e| KmcError::file_io(&self.path, e))?;
        self.file
            .write_all(crate::format::kff::MAGIC)
            .map_err(|e| KmcError::file_io(&self.path, e))?;

        // Patch the raw section's n_blocks field now that the count is known.
        self.file
            .seek_write_n_blocks(self.raw_section_offset, self.n_records)?;

        Ok(())
    }
}

trait SeekWriteNBlocks {
    fn seek_write_n_blocks(&mut self, section_offset: u64, n_records: u64) -> Result<()>;
}

impl SeekWriteNBlocks for KffWriter {
    fn seek_write_n_blocks(&mut self, section_offset: u64, n_records: u64) -> Result<()> {
        use std::io::{Seek, SeekFrom};
        let cur = self.file.stream_position().map_err(|e| KmcError::file_io(&self.path, e))?;
        self.file
            .seek(SeekFrom::Start(section_offset + 1))
            .map_err(|e| KmcError::file_io(&self.path, e))?;
        let mut buf = [0u8; 8];
        crate::byteorder::write_u64_be(&mut buf, n_records);
        self.file.write_all(&buf).map_err(|e| KmcError::file_io(&self.path, e))?;
        self.file
            .seek(SeekFrom::Start(cur))
            .map_err(|e| KmcError::file_io(&self.path, e))?;
        Ok(())
    }
}

impl RecordSink for KffWriter {
    fn accept(&mut self, kmer: &KmerVal, counter: u32) -> Result<()> {
        if counter < self.cutoff_min || counter > self.cutoff_max {
            return Ok(());
        }
        let counter = counter.min(self.counter_max);

        let kmer_bytes = packed_len(self.k as usize);
        self.record_buf.extend_from_slice(&kmer.as_bytes()[..kmer_bytes]);
        let mut counter_bytes = [0u8; 4];
        write_counter_be(&mut counter_bytes, self.data_size as u8, counter);
        self.record_buf
            .extend_from_slice(&counter_bytes[..self.data_size as usize]);
        self.n_records += 1;

        if self.record_buf.len() >= RECORD_BUF_CAPACITY {
            self.flush_record_buf()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_record_buf()
    }
}

#[allow(dead_code)]
fn record_len_check(k: u64, data_size: u64) -> usize {
    raw_record_len(k, data_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::Encoding;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_section_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.kff");
        let enc = Encoding::canonical();
        let mut writer = KffWriter::open(&path, 4, 1, 0b00_01_10_11, true, 1, 255, 255).unwrap();
        writer.accept(&KmerVal::encode(b"AAAA", &enc).unwrap(), 3).unwrap();
        writer.accept(&KmerVal::encode(b"ACGT", &enc).unwrap(), 7).unwrap();
        writer.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], crate::format::kff::MAGIC);
        assert_eq!(&bytes[bytes.len() - 3..], crate::format::kff::MAGIC);
    }

    #[test]
    fn drops_out_of_cutoff_and_clamps_to_counter_max() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.kff");
        let enc = Encoding::canonical();
        let mut writer = KffWriter::open(&path, 4, 1, 0b00_01_10_11, true, 2, 255, 5).unwrap();
        writer.accept(&KmerVal::encode(b"AAAA", &enc).unwrap(), 1).unwrap();
        writer.accept(&KmerVal::encode(b"ACGT", &enc).unwrap(), 200).unwrap();
        assert_eq!(writer.n_records, 1);
        writer.close().unwrap();
    }
}
