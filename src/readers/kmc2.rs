//! KMC2 reader: a double-level tournament merge over a signature-binned
//! database (§4.3). Each bin is laid out exactly like a KMC1 database (its
//! own prefix LUT plus a suffix-record run); the reader's job is to expose
//! the concatenation of all bins as a single globally sorted stream.
//!
//! Architecture: one I/O thread serves whole-bin suffix reads on request; C
//! child threads each own a disjoint subset of bins, k-way-merging them with
//! a min-heap; a parent thread merges the C child streams. If `C < 2` the
//! parent is elided and the single child's output is the reader's output.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::bundle::Bundle;
use crate::byteorder::{read_counter_le, read_u32_le, read_u64_le};
use crate::error::{KmcError, Result};
use crate::format::kmc_header::{check_magic, KmcHeader, HEADER_LEN, PREFIX_MAGIC, SUFFIX_MAGIC};
use crate::kmer::{packed_len, KmerVal};
use crate::progress::{Progress, SourceProgress};
use crate::queues::{BoundedQueue, BundleQueue};
use crate::readers::kmc1::Cutoff;
use crate::readers::BundleSource;

/// Piecewise-linear child-thread-count heuristic (§4.3, "must be
/// reproduced"): 2@3, 3@4-5, 4@6-8, 5@9-10, 6@11-13, 7@14-16, then +1 per 5.
pub fn child_thread_count(threads: usize) -> usize {
    match threads {
        0..=2 => 1,
        3 => 2,
        4..=5 => 3,
        6..=8 => 4,
        9..=10 => 5,
        11..=13 => 6,
        14..=16 => 7,
        t => 7 + (t - 16).div_ceil(5),
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BinMeta {
    total: u64,
    suffix_offset: u64,
    lut: Vec<u64>,
}

pub(crate) struct Kmc2Layout {
    pub(crate) header: KmcHeader,
    pub(crate) bins: Vec<BinMeta>,
}

impl Kmc2Layout {
    /// Total record count across every bin, before any cutoff filter is
    /// applied. Used to size an output database's LUT when this file is
    /// one of several set-algebra inputs.
    pub(crate) fn total_records(&self) -> u64 {
        self.bins.iter().map(|b| b.total).sum()
    }
}

/// Reads the KMC2 prefix file: body (bin table) plus the shared 56-byte
/// tail footer described in §6.
pub fn read_layout(prefix_path: &Path) -> Result<Kmc2Layout> {
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
    let mut hdr_buf = [0u8; HEADER_LEN];
    file.read_exact(&mut hdr_buf)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    let header = KmcHeader::decode(&hdr_buf);

    file.seek(SeekFrom::Start(0))
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    check_magic(prefix_path, &magic, PREFIX_MAGIC)?;

    let mut u32buf = [0u8; 4];
    file.read_exact(&mut u32buf)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    let n_bins = read_u32_le(&u32buf) as usize;
    file.read_exact(&mut u32buf)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    let sign_len = read_u32_le(&u32buf) as usize;

    let mut sig_map = vec![0u8; 4usize.pow(sign_len as u32) * 4];
    file.read_exact(&mut sig_map)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;

    let bin_p = header.lut_prefix_len as usize;
    let mut bins = Vec::with_capacity(n_bins);
    for _ in 0..n_bins {
        let mut u64buf = [0u8; 8];
        file.read_exact(&mut u64buf)
            .map_err(|e| KmcError::file_io(prefix_path, e))?;
        let total = read_u64_le(&u64buf);
        file.read_exact(&mut u64buf)
            .map_err(|e| KmcError::file_io(prefix_path, e))?;
        let suffix_offset = read_u64_le(&u64buf);
        let lut_entries = 4usize.pow(bin_p as u32);
        let mut lut_raw = vec![0u8; lut_entries * 8];
        file.read_exact(&mut lut_raw)
            .map_err(|e| KmcError::file_io(prefix_path, e))?;
        let lut = lut_raw.chunks_exact(8).map(read_u64_le).collect();
        bins.push(BinMeta {
            total,
            suffix_offset,
            lut,
        });
    }

    let mut end_magic = [0u8; 4];
    file.read_exact(&mut end_magic)
        .map_err(|e| KmcError::file_io(prefix_path, e))?;
    check_magic(prefix_path, &end_magic, PREFIX_MAGIC)?;

    Ok(Kmc2Layout { header, bins })
}

enum IoRequest {
    ReadBin {
        offset: u64,
        len: usize,
        reply: Sender<Vec<u8>>,
    },
}

/// Serves `IoRequest`s for one suffix file. Under the `mmap` feature the
/// file is mapped once up front and every request is served by copying out
/// of the map (no per-request `seek`+`read` syscall pair); otherwise each
/// request does a plain positioned read. Either way this preserves the
/// single-I/O-thread, work-stealing-request-queue architecture §4.3
/// requires — `mmap` only changes how a request is satisfied, not the
/// thread topology.
fn io_thread(file: File, requests: Receiver<IoRequest>, suffix_path: std::path::PathBuf) {
    #[cfg(feature = "mmap")]
    {
        // SAFETY: the suffix file is opened read-only and not modified by
        // any other process for the reader's lifetime; the standard mmap
        // file-mutation race applies equally to any other mmap consumer.
        let map = unsafe { memmap2::Mmap::map(&file) };
        if let Ok(map) = map {
            while let Ok(req) = requests.recv() {
                match req {
                    IoRequest::ReadBin { offset, len, reply } => {
                        let start = offset as usize;
                        let buf = map
                            .get(start..start + len)
                            .map(<[u8]>::to_vec)
                            .unwrap_or_default();
                        let _ = reply.send(buf);
                    }
                }
            }
            return;
        }
    }
    let mut file = file;
    while let Ok(req) = requests.recv() {
        match req {
            IoRequest::ReadBin { offset, len, reply } => {
                let mut buf = vec![0u8; len];
                let ok = file
                    .seek(SeekFrom::Start(offset))
                    .and_then(|_| file.read_exact(&mut buf))
                    .is_ok();
                if !ok {
                    buf.clear();
                }
                let _ = reply.send(buf);
            }
        }
    }
    let _ = suffix_path;
}

/// Decodes one bin's suffix bytes into a sorted, cutoff-filtered
/// `(KmerVal, u32)` vector using the bin's own LUT, exactly as the KMC1
/// consumer thread does.
fn decode_bin(
    raw: &[u8],
    bin: &BinMeta,
    k: usize,
    p: usize,
    counter_size: usize,
    cutoff: Cutoff,
) -> Vec<(KmerVal, u32)> {
    let suffix_len = packed_len(k.saturating_sub(p));
    let record_len = suffix_len + counter_size;
    let mut out = Vec::with_capacity(bin.total as usize);
    let mut cur_prefix = 0u64;
    for (idx, chunk) in raw.chunks_exact(record_len).enumerate() {
        let idx = idx as u64;
        while (cur_prefix + 1) < bin.lut.len() as u64 && bin.lut[(cur_prefix + 1) as usize] <= idx {
            cur_prefix += 1;
        }
        let counter = if counter_size == 0 {
            1
        } else {
            read_counter_le(&chunk[suffix_len..], counter_size as u8)
        };
        if cutoff.accepts(counter) {
            let kmer = KmerVal::from_prefix_suffix(k, p, cur_prefix, &chunk[..suffix_len]);
            out.push((kmer, counter));
        }
    }
    out
}

/// Simple queue-backed `BundleSource` adapter, used to let the parent merge
/// child-thread output queues through the same `Peekable` vocabulary as
/// everything else.
struct QueueSource(BundleQueue);

impl BundleSource for QueueSource {
    fn next_bundle(&mut self, bundle: &mut Bundle) -> Result<()> {
        bundle.reset();
        if let Some(b) = self.0.pop() {
            *bundle = b;
        }
        Ok(())
    }

    fn ignore_rest(&mut self) {
        self.0.abort();
    }
}

pub struct Kmc2Reader {
    out: BundleQueue,
    child_queues: Vec<BundleQueue>,
    handles: Vec<JoinHandle<()>>,
    cancelled: bool,
}

impl Kmc2Reader {
    pub fn open(
        prefix_path: &Path,
        suffix_path: &Path,
        reader_threads: usize,
        cutoff: Cutoff,
        progress: Option<(Arc<Progress>, Arc<SourceProgress>)>,
    ) -> Result<Self> {
        let layout = read_layout(prefix_path)?;
        let k = layout.header.kmer_length as usize;
        let p = layout.header.lut_prefix_len as usize;
        let counter_size = layout.header.counter_size as usize;
        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %prefix_path.display(),
            k,
            bins = layout.bins.len(),
            total = layout.total_records(),
            "opening KMC2 reader"
        );

        let mut file = File::open(suffix_path).map_err(|e| KmcError::file_io(suffix_path, e))?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|e| KmcError::file_io(suffix_path, e))?;
        check_magic(suffix_path, &magic, SUFFIX_MAGIC)?;

        let (req_tx, req_rx) = bounded::<IoRequest>(4);
        let io_path = suffix_path.to_path_buf();
        let io_handle = std::thread::Builder::new()
            .name("kmc2-suffix-io".into())
            .spawn(move || io_thread(file, req_rx, io_path))
            .expect("spawn kmc2 io thread");

        let c = child_thread_count(reader_threads).min(layout.bins.len().max(1));
        #[cfg(feature = "tracing")]
        tracing::info!(
            reader_threads,
            child_threads = c,
            "kmc2 reader thread-count heuristic decision"
        );
        let bin_indices: Vec<usize> = (0..layout.bins.len()).collect();
        let chunks: Vec<Vec<usize>> = split_evenly(&bin_indices, c);

        let mut child_queues = Vec::with_capacity(chunks.len());
        let mut handles = Vec::with_capacity(chunks.len() + 1);

        for chunk in chunks {
            if chunk.is_empty() {
                continue;
            }
            let out_q: BundleQueue = BoundedQueue::new(2);
            child_queues.push(out_q.clone());
            let bins: Vec<BinMeta> = chunk.iter().map(|&i| layout.bins[i].clone()).collect();
            let req_tx = req_tx.clone();
            let progress = progress.clone();
            let handle = std::thread::Builder::new()
                .name("kmc2-child".into())
                .spawn(move || {
                    child_thread(bins, k, p, counter_size, cutoff, req_tx, out_q, progress);
                })
                .expect("spawn kmc2 child thread");
            handles.push(handle);
        }
        drop(req_tx);
        handles.push(io_handle);

        let out = if child_queues.is_empty() {
            // Empty database: no child threads were spawned, so nothing will
            // ever finish the queue on our behalf.
            let empty: BundleQueue = BoundedQueue::new(1);
            empty.finish();
            empty
        } else if child_queues.len() < 2 {
            child_queues[0].clone()
        } else {
            let final_out: BundleQueue = BoundedQueue::new(2);
            let sources: Vec<QueueSource> = child_queues.iter().cloned().map(QueueSource).collect();
            let parent_out = final_out.clone();
            let parent_handle = std::thread::Builder::new()
                .name("kmc2-parent".into())
                .spawn(move || parent_thread(sources, parent_out))
                .expect("spawn kmc2 parent thread");
            handles.push(parent_handle);
            final_out
        };

        Ok(Self {
            out,
            child_queues,
            handles,
            cancelled: false,
        })
    }
}

pub(crate) fn split_evenly(items: &[usize], n: usize) -> Vec<Vec<usize>> {
    if n == 0 {
        return vec![items.to_vec()];
    }
    let mut out = vec![Vec::new(); n];
    for (i, &item) in items.iter().enumerate() {
        out[i % n].push(item);
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn child_thread(
    bins: Vec<BinMeta>,
    k: usize,
    p: usize,
    counter_size: usize,
    cutoff: Cutoff,
    req_tx: Sender<IoRequest>,
    out: BundleQueue,
    progress: Option<(Arc<Progress>, Arc<SourceProgress>)>,
) {
    let suffix_len = packed_len(k.saturating_sub(p));
    let record_len = suffix_len + counter_size;

    let mut decoded: Vec<Vec<(KmerVal, u32)>> = Vec::with_capacity(bins.len());
    for bin in &bins {
        let (reply_tx, reply_rx) = bounded(1);
        let len = bin.total as usize * record_len;
        if req_tx
            .send(IoRequest::ReadBin {
                offset: 4 + bin.suffix_offset,
                len,
                reply: reply_tx,
            })
            .is_err()
        {
            return;
        }
        let raw = match reply_rx.recv() {
            Ok(raw) => raw,
            Err(_) => return,
        };
        decoded.push(decode_bin(&raw, bin, k, p, counter_size, cutoff));
        if let Some((prog, source)) = &progress {
            prog.advance(source, bin.total);
        }
    }

    // k-way merge across this child's bins via a min-heap of cursors.
    let mut cursors = vec![0usize; decoded.len()];
    let mut heap: BinaryHeap<Reverse<(KmerVal, usize)>> = BinaryHeap::new();
    for (bin_idx, recs) in decoded.iter().enumerate() {
        if let Some((kmer, _)) = recs.first() {
            heap.push(Reverse((kmer.clone(), bin_idx)));
        }
    }

    let mut bundle = Bundle::new();
    while let Some(Reverse((_, bin_idx))) = heap.pop() {
        let pos = cursors[bin_idx];
        let (kmer, counter) = decoded[bin_idx][pos].clone();
        cursors[bin_idx] += 1;
        if let Some((next_kmer, _)) = decoded[bin_idx].get(cursors[bin_idx]) {
            heap.push(Reverse((next_kmer.clone(), bin_idx)));
        }
        if bundle.is_full() && !out.push(std::mem::replace(&mut bundle, Bundle::new())) {
            return;
        }
        bundle.push(kmer, counter);
    }
    if !bundle.is_empty() {
        let _ = out.push(bundle);
    }
    out.finish();
}

fn parent_thread(mut sources: Vec<QueueSource>, out: BundleQueue) {
    use crate::readers::Peekable;
    let mut peekables: Vec<Peekable<QueueSource>> =
        sources.drain(..).map(Peekable::new).collect();
    let mut bundle = Bundle::new();
    loop {
        let mut best: Option<(usize, KmerVal)> = None;
        for (i, p) in peekables.iter_mut().enumerate() {
            if let Ok(Some((kmer, _))) = p.top() {
                let is_better = match &best {
                    Some((_, b)) => kmer < b,
                    None => true,
                };
                if is_better {
                    best = Some((i, kmer.clone()));
                }
            }
        }
        let Some((idx, _)) = best else { break };
        match peekables[idx].advance() {
            Ok(Some((kmer, counter))) => {
                if bundle.is_full() && !out.push(std::mem::replace(&mut bundle, Bundle::new())) {
                    return;
                }
                bundle.push(kmer, counter);
            }
            _ => break,
        }
    }
    if !bundle.is_empty() {
        let _ = out.push(bundle);
    }
    out.finish();
}

impl BundleSource for Kmc2Reader {
    fn next_bundle(&mut self, bundle: &mut Bundle) -> Result<()> {
        bundle.reset();
        if let Some(b) = self.out.pop() {
            *bundle = b;
        }
        Ok(())
    }

    fn ignore_rest(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        for q in &self.child_queues {
            q.abort();
        }
        self.out.abort();
    }
}

impl Drop for Kmc2Reader {
    fn drop(&mut self) {
        self.ignore_rest();
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}
