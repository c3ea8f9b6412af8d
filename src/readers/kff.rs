//! KFF reader: a tournament merge over a KFF file's data sections (§4.4).
//!
//! Reading first requires indexing: the trailing footer (if present) points
//! at the first index section; the linked list of index sections is
//! followed to collect every data-section offset, validating that each
//! claimed section starts with its advertised type byte. Sections are then
//! treated as independent sorted streams and tournament-merged exactly as
//! the KMC2 reader merges bins — but without prefix reconstruction, since
//! KFF records store the full k-mer directly.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::bundle::Bundle;
use crate::byteorder::{read_counter_be, read_u64_be};
use crate::error::{KmcError, Result};
use crate::format::kff::{raw_record_len, Header, IndexSection, SectionType, VariableSection, MAGIC};
use crate::kmer::{packed_len, KmerVal};
use crate::progress::{Progress, SourceProgress};
use crate::queues::{BoundedQueue, BundleQueue};
use crate::readers::kmc1::Cutoff;
use crate::readers::kmc2::child_thread_count;
use crate::readers::{BundleSource, Peekable};

#[derive(Debug, Clone)]
struct SectionMeta {
    /// Absolute offset of the first record byte (just past `n_blocks`).
    data_offset: u64,
    n_records: u64,
}

pub struct KffLayout {
    pub header: Header,
    pub k: u64,
    pub data_size: u64,
    sections: Vec<SectionMeta>,
}

impl KffLayout {
    /// Total record count across every data section, before any cutoff
    /// filter is applied. Used to size an output database's LUT when this
    /// file is one of several set-algebra inputs.
    pub fn total_records(&self) -> u64 {
        self.sections.iter().map(|s| s.n_records).sum()
    }
}

fn read_header(file: &mut File, path: &Path) -> Result<Header> {
    let mut magic = [0u8; 3];
    file.read_exact(&mut magic).map_err(|e| KmcError::file_io(path, e))?;
    if &magic != MAGIC {
        return Err(KmcError::bad_format(path, "missing KFF magic"));
    }
    let mut b = [0u8; 5];
    file.read_exact(&mut b).map_err(|e| KmcError::file_io(path, e))?;
    let [major, minor, encoding, all_unique, canonical] = b;
    if all_unique != 1 {
        return Err(KmcError::bad_format(path, "all-unique flag must be 1"));
    }
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).map_err(|e| KmcError::file_io(path, e))?;
    let free_len = u32::from_be_bytes(len_buf) as usize;
    let mut free_block = vec![0u8; free_len];
    file.read_exact(&mut free_block).map_err(|e| KmcError::file_io(path, e))?;
    Ok(Header {
        major,
        minor,
        encoding,
        all_unique: true,
        canonical: canonical != 0,
        free_block,
    })
}

fn read_variable_section_at(file: &mut File, path: &Path, offset: u64) -> Result<(VariableSection, u64)> {
    file.seek(SeekFrom::Start(offset)).map_err(|e| KmcError::file_io(path, e))?;
    let mut tag = [0u8; 1];
    file.read_exact(&mut tag).map_err(|e| KmcError::file_io(path, e))?;
    if SectionType::from_tag(tag[0], path)? != SectionType::Variable {
        return Err(KmcError::bad_format(path, "expected variable section"));
    }
    let mut rest = Vec::new();
    file.read_to_end(&mut rest).map_err(|e| KmcError::file_io(path, e))?;
    let (section, consumed) = VariableSection::decode(&rest, path)?;
    Ok((section, offset + 1 + consumed as u64))
}

/// Validates the section advertises `ordered=1`, required by §4.4.
fn require_ordered(vars: &VariableSection, path: &Path) -> Result<()> {
    match vars.get("ordered") {
        Some(1) => Ok(()),
        _ => Err(KmcError::Unsupported(format!(
            "{}: every section must advertise ordered",
            path.display()
        ))),
    }
}

/// Follows the footer -> index-section linked list to collect every data
/// section's offset. Falls back to a sequential forward scan if no footer
/// is present.
pub fn read_layout(path: &Path) -> Result<KffLayout> {
    let mut file = File::open(path).map_err(|e| KmcError::file_io(path, e))?;
    let header = read_header(&mut file, path)?;

    let after_header = file.stream_position().map_err(|e| KmcError::file_io(path, e))?;
    let (vars, after_vars) = read_variable_section_at(&mut file, path, after_header)?;
    require_ordered(&vars, path)?;
    let k = vars.k().ok_or_else(|| KmcError::bad_format(path, "variable section missing 'k'"))?;
    let data_size = vars
        .data_size()
        .ok_or_else(|| KmcError::bad_format(path, "variable section missing 'data_size'"))?;

    let len = file.metadata().map_err(|e| KmcError::file_io(path, e))?.len();

    let sections = if len >= 3 {
        file.seek(SeekFrom::End(-3)).map_err(|e| KmcError::file_io(path, e))?;
        let mut tail_magic = [0u8; 3];
        file.read_exact(&mut tail_magic).map_err(|e| KmcError::file_io(path, e))?;
        if &tail_magic == MAGIC && len >= 11 {
            read_indexed_sections(&mut file, path, len)?
        } else {
            let record_len = raw_record_len(k, data_size);
            scan_sections_sequentially(&mut file, path, after_vars, len, record_len)?
        }
    } else {
        Vec::new()
    };

    Ok(KffLayout {
        header,
        k,
        data_size,
        sections,
    })
}

fn read_indexed_sections(file: &mut File, path: &Path, len: u64) -> Result<Vec<SectionMeta>> {
    file.seek(SeekFrom::End(-11)).map_err(|e| KmcError::file_io(path, e))?;
    let mut footer_size_buf = [0u8; 8];
    file.read_exact(&mut footer_size_buf).map_err(|e| KmcError::file_io(path, e))?;
    let footer_size = read_u64_be(&footer_size_buf);
    let footer_offset = len.saturating_sub(11).saturating_sub(footer_size);
    let (footer_vars, _) = read_variable_section_at(file, path, footer_offset)?;
    let first_index = footer_vars
        .get("first_index")
        .ok_or_else(|| KmcError::bad_format(path, "footer missing 'first_index'"))?;

    let mut sections = Vec::new();
    let mut next = first_index;
    loop {
        if next == 0 && !sections.is_empty() {
            break;
        }
        file.seek(SeekFrom::Start(next)).map_err(|e| KmcError::file_io(path, e))?;
        let mut tag = [0u8; 1];
        file.read_exact(&mut tag).map_err(|e| KmcError::file_io(path, e))?;
        if SectionType::from_tag(tag[0], path)? != SectionType::Index {
            return Err(KmcError::bad_format(path, "expected index section"));
        }
        let mut rest = vec![0u8; (footer_offset.saturating_sub(next + 1)) as usize];
        file.read_exact(&mut rest).map_err(|e| KmcError::file_io(path, e))?;
        let index = IndexSection::decode(&rest, path)?;
        for entry in &index.entries {
            let abs = (next as i64 + entry.relative_offset) as u64;
            file.seek(SeekFrom::Start(abs)).map_err(|e| KmcError::file_io(path, e))?;
            let mut t = [0u8; 1];
            file.read_exact(&mut t).map_err(|e| KmcError::file_io(path, e))?;
            if t[0] != entry.section_type {
                return Err(KmcError::bad_format(path, "index entry type mismatch"));
            }
            match SectionType::from_tag(t[0], path)? {
                SectionType::Raw | SectionType::Minimizer => {
                    let mut n_buf = [0u8; 8];
                    file.read_exact(&mut n_buf).map_err(|e| KmcError::file_io(path, e))?;
                    let n_records = read_u64_be(&n_buf);
                    sections.push(SectionMeta {
                        data_offset: abs + 1 + 8,
                        n_records,
                    });
                }
                _ => {}
            }
        }
        if index.next_index_offset == 0 {
            break;
        }
        next = index.next_index_offset;
    }
    Ok(sections)
}

/// Forward scan used when a file carries no footer/index chain: every
/// section is visited in file order, each raw/minimizer section's record
/// count read directly from its own header so `pos` always advances past
/// its actual payload.
fn scan_sections_sequentially(
    file: &mut File,
    path: &Path,
    mut pos: u64,
    len: u64,
    record_len: usize,
) -> Result<Vec<SectionMeta>> {
    let mut sections = Vec::new();
    let limit = len.saturating_sub(3);
    while pos < limit {
        file.seek(SeekFrom::Start(pos)).map_err(|e| KmcError::file_io(path, e))?;
        let mut tag = [0u8; 1];
        if file.read_exact(&mut tag).is_err() {
            break;
        }
        pos += 1;
        match SectionType::from_tag(tag[0], path)? {
            SectionType::Raw | SectionType::Minimizer => {
                let mut n_buf = [0u8; 8];
                file.read_exact(&mut n_buf).map_err(|e| KmcError::file_io(path, e))?;
                let n_records = read_u64_be(&n_buf);
                sections.push(SectionMeta {
                    data_offset: pos + 8,
                    n_records,
                });
                pos += 8 + n_records * record_len as u64;
            }
            SectionType::Variable => {
                let mut rest = Vec::new();
                file.read_to_end(&mut rest).map_err(|e| KmcError::file_io(path, e))?;
                let (_section, consumed) = VariableSection::decode(&rest, path)?;
                pos += consumed as u64;
            }
            SectionType::Index => break,
        }
    }
    Ok(sections)
}

enum IoRequest {
    ReadSection {
        offset: u64,
        len: usize,
        reply: Sender<Vec<u8>>,
    },
}

/// See `readers::kmc2::io_thread`: under the `mmap` feature, requests are
/// served by slicing a one-time mapping of the file instead of a
/// `seek`+`read` syscall pair per request.
fn io_thread(file: File, requests: Receiver<IoRequest>) {
    #[cfg(feature = "mmap")]
    {
        // SAFETY: see readers::kmc2::io_thread.
        let map = unsafe { memmap2::Mmap::map(&file) };
        if let Ok(map) = map {
            while let Ok(req) = requests.recv() {
                match req {
                    IoRequest::ReadSection { offset, len, reply } => {
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
            IoRequest::ReadSection { offset, len, reply } => {
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
}

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

pub struct KffReader {
    out: BundleQueue,
    child_queues: Vec<BundleQueue>,
    handles: Vec<JoinHandle<()>>,
    cancelled: bool,
}

impl KffReader {
    pub fn open(
        path: &Path,
        reader_threads: usize,
        cutoff: Cutoff,
        progress: Option<(Arc<Progress>, Arc<SourceProgress>)>,
    ) -> Result<Self> {
        let layout = read_layout(path)?;
        let k = layout.k;
        let data_size = layout.data_size;
        let record_len = raw_record_len(k, data_size);
        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %path.display(),
            k,
            sections = layout.sections.len(),
            total = layout.total_records(),
            "opening KFF reader"
        );

        let file = File::open(path).map_err(|e| KmcError::file_io(path, e))?;
        let (req_tx, req_rx) = bounded::<IoRequest>(4);
        let io_handle = std::thread::Builder::new()
            .name("kff-io".into())
            .spawn(move || io_thread(file, req_rx))
            .expect("spawn kff io thread");

        let c = child_thread_count(reader_threads).min(layout.sections.len().max(1));
        let idx: Vec<usize> = (0..layout.sections.len()).collect();
        let chunks = crate::readers::kmc2::split_evenly(&idx, c);

        let mut child_queues = Vec::new();
        let mut handles = Vec::new();
        for chunk in chunks {
            if chunk.is_empty() {
                continue;
            }
            let out_q: BundleQueue = BoundedQueue::new(2);
            child_queues.push(out_q.clone());
            let sections: Vec<SectionMeta> = chunk.iter().map(|&i| layout.sections[i].clone()).collect();
            let req_tx = req_tx.clone();
            let progress = progress.clone();
            let handle = std::thread::Builder::new()
                .name("kff-child".into())
                .spawn(move || {
                    child_thread(sections, k as usize, data_size as usize, record_len, cutoff, req_tx, out_q, progress);
                })
                .expect("spawn kff child thread");
            handles.push(handle);
        }
        drop(req_tx);
        handles.push(io_handle);

        let out = if child_queues.is_empty() {
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
                .name("kff-parent".into())
                .spawn(move || parent_thread(sources, parent_out))
                .expect("spawn kff parent thread");
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

#[allow(clippy::too_many_arguments)]
fn child_thread(
    sections: Vec<SectionMeta>,
    k: usize,
    data_size: usize,
    record_len: usize,
    cutoff: Cutoff,
    req_tx: Sender<IoRequest>,
    out: BundleQueue,
    progress: Option<(Arc<Progress>, Arc<SourceProgress>)>,
) {
    let kmer_bytes = packed_len(k);
    let mut decoded: Vec<Vec<(KmerVal, u32)>> = Vec::with_capacity(sections.len());
    for section in &sections {
        let (reply_tx, reply_rx) = bounded(1);
        let len = section.n_records as usize * record_len;
        if req_tx
            .send(IoRequest::ReadSection {
                offset: section.data_offset,
                len,
                reply: reply_tx,
            })
            .is_err()
        {
            return;
        }
        let raw = match reply_rx.recv() {
            Ok(r) => r,
            Err(_) => return,
        };
        let mut recs = Vec::with_capacity(section.n_records as usize);
        for chunk in raw.chunks_exact(record_len) {
            let counter = if data_size == 0 {
                1
            } else {
                read_counter_be(&chunk[kmer_bytes..], data_size as u8)
            };
            if cutoff.accepts(counter) {
                let kmer = KmerVal::from_bytes(k, chunk[..kmer_bytes].to_vec());
                recs.push((kmer, counter));
            }
        }
        decoded.push(recs);
        if let Some((p, s)) = &progress {
            p.advance(s, section.n_records);
        }
    }

    let mut cursors = vec![0usize; decoded.len()];
    let mut heap: BinaryHeap<Reverse<(KmerVal, usize)>> = BinaryHeap::new();
    for (i, recs) in decoded.iter().enumerate() {
        if let Some((kmer, _)) = recs.first() {
            heap.push(Reverse((kmer.clone(), i)));
        }
    }
    let mut bundle = Bundle::new();
    while let Some(Reverse((_, i))) = heap.pop() {
        let pos = cursors[i];
        let (kmer, counter) = decoded[i][pos].clone();
        cursors[i] += 1;
        if let Some((next_kmer, _)) = decoded[i].get(cursors[i]) {
            heap.push(Reverse((next_kmer.clone(), i)));
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
    let mut peekables: Vec<Peekable<QueueSource>> = sources.drain(..).map(Peekable::new).collect();
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

impl BundleSource for KffReader {
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

impl Drop for KffReader {
    fn drop(&mut self) {
        self.ignore_rest();
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_ordered_rejects_missing_flag() {
        let vars = VariableSection::default();
        assert!(require_ordered(&vars, Path::new("x")).is_err());
    }

    #[test]
    fn require_ordered_accepts_flag_one() {
        let mut vars = VariableSection::default();
        vars.vars.insert("ordered".to_string(), 1);
        assert!(require_ordered(&vars, Path::new("x")).is_ok());
    }
}
