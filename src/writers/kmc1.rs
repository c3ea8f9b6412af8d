//! KMC1 writer: a streaming, two-thread pipeline (§4.5).
//!
//! The thread driving `accept()` plays the role of the *preparing thread*:
//! for each record it drops out-of-cutoff counters, clamps to
//! `counter_max`, fills the LUT up to the record's prefix, and appends
//! `suffix_bytes + counter_size` bytes to a buffer. When the buffer fills
//! it is handed to a dedicated *suffix-writer thread* over a bounded byte
//! queue, isolating disk I/O stalls from the record-preparation path.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::byteorder::write_counter_le;
use crate::error::{KmcError, Result};
use crate::format::kmc_header::{KmcHeader, KMC1_VERSION, PREFIX_MAGIC, SUFFIX_MAGIC};
use crate::kmer::KmerVal;
use crate::ops::RecordSink;
use crate::queues::{BoundedQueue, ByteQueue};

const SUFFIX_BUF_CAPACITY: usize = 16 * 1024 * 1024;

pub struct Kmc1Writer {
    k: usize,
    p: usize,
    counter_size: usize,
    cutoff_min: u32,
    cutoff_max: u32,
    counter_max: u32,
    canonical: bool,
    lut: Vec<u64>,
    cur_prefix: u64,
    cumulative: u64,
    suffix_buf: Vec<u8>,
    byte_queue: ByteQueue,
    write_error: Arc<Mutex<Option<KmcError>>>,
    handle: Option<JoinHandle<()>>,
    prefix_path: PathBuf,
}

#[allow(clippy::too_many_arguments)]
impl Kmc1Writer {
    pub fn open(
        prefix_path: &Path,
        suffix_path: &Path,
        k: usize,
        p: usize,
        counter_size: usize,
        cutoff_min: u32,
        cutoff_max: u32,
        counter_max: u32,
        canonical: bool,
    ) -> Result<Self> {
        let mut file = File::create(suffix_path).map_err(|e| KmcError::file_io(suffix_path, e))?;
        file.write_all(SUFFIX_MAGIC)
            .map_err(|e| KmcError::file_io(suffix_path, e))?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %prefix_path.display(),
            k,
            p,
            counter_size,
            "opening KMC1 writer"
        );
        let byte_queue: ByteQueue = BoundedQueue::new(4);
        let write_error = Arc::new(Mutex::new(None));
        let io_queue = byte_queue.clone();
        let io_error = write_error.clone();
        let io_path = suffix_path.to_path_buf();
        let handle = std::thread::Builder::new()
            .name("kmc1-suffix-writer".into())
            .spawn(move || suffix_writer_thread(file, &io_path, io_queue, io_error))
            .expect("spawn kmc1 suffix writer thread");

        Ok(Self {
            k,
            p,
            counter_size,
            cutoff_min,
            cutoff_max,
            counter_max,
            canonical,
            lut: vec![0u64; 4usize.pow(p as u32)],
            cur_prefix: 0,
            cumulative: 0,
            suffix_buf: Vec::with_capacity(SUFFIX_BUF_CAPACITY),
            byte_queue,
            write_error,
            handle: Some(handle),
            prefix_path: prefix_path.to_path_buf(),
        })
    }

    fn check_write_error(&self) -> Result<()> {
        if let Some(e) = self.write_error.lock().take() {
            return Err(e);
        }
        Ok(())
    }

    fn flush_suffix_buf(&mut self) -> Result<()> {
        if self.suffix_buf.is_empty() {
            return Ok(());
        }
        let buf = std::mem::replace(&mut self.suffix_buf, Vec::with_capacity(SUFFIX_BUF_CAPACITY));
        if !self.byte_queue.push(buf) {
            self.check_write_error()?;
            return Err(KmcError::Internal("suffix writer queue aborted".into()));
        }
        Ok(())
    }

    /// Drains the input stream and closes the database, writing the LUT
    /// and the 56-byte footer.
    pub fn close(mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::info!(total = self.cumulative, "closing KMC1 writer");
        self.flush_suffix_buf()?;
        self.byte_queue.finish();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        self.check_write_error()?;

        // Fill the LUT's remaining entries with the final cumulative count.
        for slot in self.lut.iter_mut().skip(self.cur_prefix as usize + 1) {
            *slot = self.cumulative;
        }

        let mut prefix_file =
            File::create(&self.prefix_path).map_err(|e| KmcError::file_io(&self.prefix_path, e))?;
        prefix_file
            .write_all(PREFIX_MAGIC)
            .map_err(|e| KmcError::file_io(&self.prefix_path, e))?;
        for entry in &self.lut {
            prefix_file
                .write_all(&entry.to_le_bytes())
                .map_err(|e| KmcError::file_io(&self.prefix_path, e))?;
        }
        prefix_file
            .write_all(PREFIX_MAGIC)
            .map_err(|e| KmcError::file_io(&self.prefix_path, e))?;

        let mut header = KmcHeader {
            kmer_length: self.k as u32,
            mode: 0,
            counter_size: self.counter_size as u32,
            lut_prefix_len: self.p as u32,
            sign_len: 0,
            min_count: self.cutoff_min,
            max_count_lo: 0,
            max_count_hi: 0,
            both_strands: u32::from(self.canonical),
            total_kmers: self.cumulative,
            db_version: KMC1_VERSION,
        };
        header.set_max_count(u64::from(self.counter_max));
        let header_bytes = header.encode();
        prefix_file
            .write_all(&header_bytes)
            .map_err(|e| KmcError::file_io(&self.prefix_path, e))?;

        let header_offset = (4 + self.lut.len() * 8 + 4) as u32;
        prefix_file
            .write_all(&header_offset.to_le_bytes())
            .map_err(|e| KmcError::file_io(&self.prefix_path, e))?;
        prefix_file
            .write_all(&KMC1_VERSION.to_le_bytes())
            .map_err(|e| KmcError::file_io(&self.prefix_path, e))?;

        Ok(())
    }
}

impl RecordSink for Kmc1Writer {
    fn accept(&mut self, kmer: &KmerVal, counter: u32) -> Result<()> {
        self.check_write_error()?;
        if counter < self.cutoff_min || counter > self.cutoff_max {
            return Ok(());
        }
        let counter = counter.min(self.counter_max);

        let prefix = kmer.prefix_index(self.p);
        if prefix > self.cur_prefix {
            for slot in &mut self.lut[(self.cur_prefix as usize + 1)..=(prefix as usize)] {
                *slot = self.cumulative;
            }
            self.cur_prefix = prefix;
        }

        let suffix = kmer.suffix_bytes(self.p);
        self.suffix_buf.extend_from_slice(&suffix);
        let mut counter_bytes = [0u8; 4];
        write_counter_le(&mut counter_bytes, self.counter_size as u8, counter);
        self.suffix_buf
            .extend_from_slice(&counter_bytes[..self.counter_size]);

        self.cumulative += 1;
        if self.suffix_buf.len() >= SUFFIX_BUF_CAPACITY {
            self.flush_suffix_buf()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_suffix_buf()
    }
}

fn suffix_writer_thread(mut file: File, path: &Path, queue: ByteQueue, error: Arc<Mutex<Option<KmcError>>>) {
    loop {
        let buf = match queue.pop() {
            Some(b) => b,
            None => break,
        };
        if let Err(e) = file.write_all(&buf) {
            *error.lock() = Some(KmcError::file_io(path, e));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::Encoding;
    use tempfile::tempdir;

    #[test]
    fn writes_header_lut_and_records_for_small_database() {
        let dir = tempdir().unwrap();
        let prefix_path = dir.path().join("out.kmc_pre");
        let suffix_path = dir.path().join("out.kmc_suf");

        let enc = Encoding::canonical();
        let mut writer = Kmc1Writer::open(&prefix_path, &suffix_path, 4, 0, 1, 1, 255, 255, true).unwrap();
        writer.accept(&KmerVal::encode(b"AAAA", &enc).unwrap(), 3).unwrap();
        writer.accept(&KmerVal::encode(b"ACGT", &enc).unwrap(), 7).unwrap();
        writer.close().unwrap();

        let prefix_bytes = std::fs::read(&prefix_path).unwrap();
        assert_eq!(&prefix_bytes[..4], PREFIX_MAGIC);
        let suffix_bytes = std::fs::read(&suffix_path).unwrap();
        assert_eq!(&suffix_bytes[..4], SUFFIX_MAGIC);
        // 2 records * (1 suffix byte + 1 counter byte) + magics
        assert_eq!(suffix_bytes.len(), 4 + 2 * 2);
    }

    #[test]
    fn drops_records_outside_cutoff() {
        let dir = tempdir().unwrap();
        let prefix_path = dir.path().join("out.kmc_pre");
        let suffix_path = dir.path().join("out.kmc_suf");
        let enc = Encoding::canonical();
        let mut writer = Kmc1Writer::open(&prefix_path, &suffix_path, 4, 0, 1, 2, 255, 255, true).unwrap();
        writer.accept(&KmerVal::encode(b"AAAA", &enc).unwrap(), 1).unwrap();
        writer.accept(&KmerVal::encode(b"ACGT", &enc).unwrap(), 5).unwrap();
        writer.close().unwrap();
        let suffix_bytes = std::fs::read(&suffix_path).unwrap();
        assert_eq!(suffix_bytes.len(), 4 + 1 * 2);
    }

    #[test]
    fn clamps_counter_to_counter_max() {
        let dir = tempdir().unwrap();
        let prefix_path = dir.path().join("out.kmc_pre");
        let suffix_path = dir.path().join("out.kmc_suf");
        let enc = Encoding::canonical();
        let mut writer = Kmc1Writer::open(&prefix_path, &suffix_path, 4, 0, 1, 1, 255, 10, true).unwrap();
        writer.accept(&KmerVal::encode(b"AAAA", &enc).unwrap(), 250).unwrap();
        writer.close().unwrap();
        let suffix_bytes = std::fs::read(&suffix_path).unwrap();
        assert_eq!(suffix_bytes[4 + 1], 10);
    }
}
