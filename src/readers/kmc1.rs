//! KMC1 reader: the three-thread pipeline described in §4.2.
//!
//! 1. Suffix I/O thread reads the suffix file sequentially into fixed-size
//!    byte buffers, publishing to a bounded byte-buffer queue.
//! 2. Suffix-decoder thread pops byte buffers and decodes packed
//!    suffix+counter records.
//! 3. Consumer-facing thread walks the prefix LUT in lock-step,
//!    reconstructs full k-mers, applies the cutoff filter, and emits
//!    filled bundles on the reader's output queue.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::bundle::{Bundle, DEFAULT_CAPACITY};
use crate::byteorder::read_counter_le;
use crate::error::{KmcError, Result};
use crate::format::kmc_header::{check_magic, KmcHeader, HEADER_LEN, PREFIX_MAGIC, SUFFIX_MAGIC};
use crate::kmer::KmerVal;
use crate::progress::{Progress, SourceProgress};
use crate::queues::{BoundedQueue, BundleQueue, ByteQueue};
use crate::readers::BundleSource;

const SUFFIX_CHUNK: usize = 16 * 1024 * 1024;
const IO_QUEUE_DEPTH: usize = 4;

/// Cutoff filter applied by every reader: records with counters outside
/// `[min, max]` are dropped before they ever reach a bundle.
#[derive(Debug, Clone, Copy)]
pub struct Cutoff {
    pub min: u32,
    pub max: u32,
}

impl Cutoff {
    pub fn accepts(&self, counter: u32) -> bool {
        counter >= self.min && counter <= self.max
    }
}

type RawBatch = Vec<(Vec<u8>, u32)>;

pub struct Kmc1Reader {
    out: BundleQueue,
    byte_queue: ByteQueue,
    decoded_queue: BoundedQueue<RawBatch>,
    handles: Vec<JoinHandle<()>>,
    cancelled: bool,
}

impl Kmc1Reader {
    pub fn open(
        prefix_path: &Path,
        suffix_path: &Path,
        cutoff: Cutoff,
        progress: Option<(Arc<Progress>, Arc<SourceProgress>)>,
    ) -> Result<Self> {
        let header = read_header(prefix_path)?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %prefix_path.display(),
            k = header.kmer_length,
            p = header.lut_prefix_len,
            total = header.total_kmers,
            "opening KMC1 reader"
        );
        let lut = read_lut(prefix_path, &header)?;
        // suffix record width = ceil((k-p)/4) + counter_size
        let suffix_only_bytes = crate::kmer::packed_len(
            (header.kmer_length as usize).saturating_sub(header.lut_prefix_len as usize),
        );
        let record_len = suffix_only_bytes + header.counter_size as usize;

        let mut suffix_file = File::open(suffix_path)
            .map_err(|e| KmcError::file_io(suffix_path, e))?;
        let mut magic = [0u8; 4];
        suffix_file
            .read_exact(&mut magic)
            .map_err(|e| KmcError::file_io(suffix_path, e))?;
        check_magic(suffix_path, &magic, SUFFIX_MAGIC)?;

        let byte_queue: ByteQueue = BoundedQueue::new(IO_QUEUE_DEPTH);
        let decoded_queue: BoundedQueue<RawBatch> = BoundedQueue::new(IO_QUEUE_DEPTH);
        let out: BundleQueue = BoundedQueue::new(2);

        let io_suffix_path = suffix_path.to_path_buf();
        let io_queue = byte_queue.clone();
        let io_handle = std::thread::Builder::new()
            .name("kmc1-suffix-io".into())
            .spawn(move || {
                suffix_io_thread(suffix_file, &io_suffix_path, io_queue);
            })
            .expect("spawn suffix io thread");

        let dec_in = byte_queue.clone();
        let dec_out = decoded_queue.clone();
        let decode_handle = std::thread::Builder::new()
            .name("kmc1-suffix-decode".into())
            .spawn(move || {
                decode_thread(dec_in, dec_out, record_len, suffix_only_bytes);
            })
            .expect("spawn decode thread");

        let consumer_in = decoded_queue.clone();
        let consumer_out = out.clone();
        let k = header.kmer_length as usize;
        let p = header.lut_prefix_len as usize;
        let consumer_handle = std::thread::Builder::new()
            .name("kmc1-consumer".into())
            .spawn(move || {
                consumer_thread(consumer_in, consumer_out, lut, k, p, cutoff, progress);
            })
            .expect("spawn consumer thread");

        Ok(Self {
            out,
            byte_queue,
            decoded_queue,
            handles: vec![io_handle, decode_handle, consumer_handle],
            cancelled: false,
        })
    }
}

impl BundleSource for Kmc1Reader {
    fn next_bundle(&mut self, bundle: &mut Bundle) -> Result<()> {
        bundle.reset();
        match self.out.pop() {
            Some(b) => *bundle = b,
            None => bundle.reset(),
        }
        Ok(())
    }

    fn ignore_rest(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.byte_queue.abort();
        self.decoded_queue.abort();
        self.out.abort();
    }
}

impl Drop for Kmc1Reader {
    fn drop(&mut self) {
        self.ignore_rest();
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

fn suffix_io_thread(mut file: File, path: &Path, queue: ByteQueue) {
    loop {
        let mut buf = vec![0u8; SUFFIX_CHUNK];
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                buf.truncate(n);
                if !queue.push(buf) {
                    return;
                }
            }
            Err(_) => break,
        }
    }
    let _ = path;
    queue.finish();
}

fn decode_thread(input: ByteQueue, output: BoundedQueue<RawBatch>, record_len: usize, suffix_len: usize) {
    let mut carry: Vec<u8> = Vec::new();
    let counter_len = record_len - suffix_len;
    loop {
        let chunk = match input.pop() {
            Some(c) => c,
            None => break,
        };
        carry.extend_from_slice(&chunk);
        let mut batch: RawBatch = Vec::with_capacity(DEFAULT_CAPACITY);
        let mut pos = 0;
        while pos + record_len <= carry.len() {
            let suffix = carry[pos..pos + suffix_len].to_vec();
            let counter = if counter_len == 0 {
                1
            } else {
                read_counter_le(&carry[pos + suffix_len..pos + record_len], counter_len as u8)
            };
            batch.push((suffix, counter));
            pos += record_len;
            if batch.len() >= DEFAULT_CAPACITY {
                if !output.push(std::mem::take(&mut batch)) {
                    return;
                }
                batch = Vec::with_capacity(DEFAULT_CAPACITY);
            }
        }
        carry.drain(0..pos);
        if !batch.is_empty() && !output.push(batch) {
            return;
        }
    }
    output.finish();
}

#[allow(clippy::too_many_arguments)]
fn consumer_thread(
    input: BoundedQueue<RawBatch>,
    output: BundleQueue,
    lut: Vec<u64>,
    k: usize,
    p: usize,
    cutoff: Cutoff,
    progress: Option<(Arc<Progress>, Arc<SourceProgress>)>,
) {
    let mut cur_index: u64 = 0;
    let mut cur_prefix: u64 = 0;
    let mut bundle = Bundle::new();
    loop {
        let batch = match input.pop() {
            Some(b) => b,
            None => break,
        };
        let batch_len = batch.len() as u64;
        for (suffix, counter) in batch {
            while (cur_prefix + 1) < lut.len() as u64 && lut[(cur_prefix + 1) as usize] <= cur_index {
                cur_prefix += 1;
            }
            cur_index += 1;
            if cutoff.accepts(counter) {
                let kmer = KmerVal::from_prefix_suffix(k, p, cur_prefix, &suffix);
                if bundle.is_full() && !output.push(std::mem::replace(&mut bundle, Bundle::new())) {
                    return;
                }
                bundle.push(kmer, counter);
            }
        }
        if let Some((p, s)) = &progress {
            p.advance(s, batch_len);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(batch_len, cur_index, "kmc1 consumer thread processed batch");
        if bundle.is_full() && !output.push(std::mem::replace(&mut bundle, Bundle::new())) {
            return;
        }
    }
    if !bundle.is_empty() {
        let _ = output.push(bundle);
    }
    output.finish();
}

pub fn read_header(prefix_path: &Path) -> Result<KmcHeader> {
    let mut file = File::open(prefix_path).map_err(|e| KmcError::file_io(prefix_path, e))?;
    let len = file
        .metadata()
        .map_err(|e| KmcError::file_io(prefix_path, e))?
        .len();
    if len < (HEADER_LEN + 8) as u64 {
        return Err(KmcError::bad_format(prefix_path, "file too short for header"));
    }
    file.seek(SeekFrom::End(-((HEADER_LEN + 8) as i64)))
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    let mut buf = [0u8; HEADER_LEN];
    file.read_exact(&mut buf)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    Ok(KmcHeader::decode(&buf))
}

pub fn read_lut(prefix_path: &Path, header: &KmcHeader) -> Result<Vec<u64>> {
    let mut file = File::open(prefix_path).map_err(|e| KmcError::file_io(prefix_path, e))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    check_magic(prefix_path, &magic, PREFIX_MAGIC)?;
    let n = header.lut_entries();
    let mut raw = vec![0u8; n * 8];
    file.read_exact(&mut raw)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    let lut = raw
        .chunks_exact(8)
        .map(crate::byteorder::read_u64_le)
        .collect::<Vec<_>>();
    let mut end_magic = [0u8; 4];
    file.read_exact(&mut end_magic)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    check_magic(prefix_path, &end_magic, PREFIX_MAGIC)?;
    Ok(lut)
}

pub fn prefix_file_path(stem: &Path) -> PathBuf {
    stem.with_extension("kmc_pre")
}

pub fn suffix_file_path(stem: &Path) -> PathBuf {
    stem.with_extension("kmc_suf")
}
