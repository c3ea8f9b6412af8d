//! Dump sink (§4.7): converts each k-mer back to text using the configured
//! encoding, writing `<kmer>\t<counter>\n` through a ~16 MiB buffer flushed
//! when less than a fixed overhead remains.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{KmcError, Result};
use crate::kmer::{Encoding, KmerVal};
use crate::ops::RecordSink;

const BUF_CAPACITY: usize = 16 * 1024 * 1024;
/// Largest a single line can plausibly be: a k-mer's text form plus a tab,
/// a `u32` in decimal and a newline. Flush once less room than this remains.
const LINE_OVERHEAD: usize = 96;

pub struct DumpSink {
    file: File,
    path: PathBuf,
    encoding: Encoding,
    buf: Vec<u8>,
}

impl DumpSink {
    pub fn create(path: &Path, encoding: Encoding) -> Result<Self> {
        let file = File::create(path).map_err(|e| KmcError::file_io(path, e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            encoding,
            buf: Vec::with_capacity(BUF_CAPACITY),
        })
    }

    fn flush_buf(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.file
            .write_all(&self.buf)
            .map_err(|e| KmcError::file_io(&self.path, e))?;
        self.buf.clear();
        Ok(())
    }
}

impl RecordSink for DumpSink {
    fn accept(&mut self, kmer: &KmerVal, counter: u32) -> Result<()> {
        self.buf.extend_from_slice(&kmer.decode(&self.encoding));
        self.buf.push(b'\t');
        self.buf.extend_from_slice(counter.to_string().as_bytes());
        self.buf.push(b'\n');
        if self.buf.len() + LINE_OVERHEAD > BUF_CAPACITY {
            self.flush_buf()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dump_writes_tab_separated_kmer_and_counter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let enc = Encoding::canonical();
        let mut sink = DumpSink::create(&path, enc.clone()).unwrap();
        sink.accept(&KmerVal::encode(b"ACGT", &enc).unwrap(), 7).unwrap();
        sink.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "ACGT\t7\n");
    }

    #[test]
    fn dump_writes_multiple_records_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let enc = Encoding::canonical();
        let mut sink = DumpSink::create(&path, enc.clone()).unwrap();
        sink.accept(&KmerVal::encode(b"AAAA", &enc).unwrap(), 1).unwrap();
        sink.accept(&KmerVal::encode(b"CCCC", &enc).unwrap(), 2).unwrap();
        sink.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "AAAA\t1\nCCCC\t2\n");
    }
}
