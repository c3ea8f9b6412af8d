//! A small FASTA/FASTQ read filter that uses a k-mer set as a membership
//! filter (spec.md §1, "external collaborators"). Built on the `bio` crate.

use std::cmp::min;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bio::alphabets::dna::revcomp;
#[cfg(not(feature = "needletail"))]
use bio::io::{fasta, fastq};

use crate::error::{KmcError, Result};
use crate::kmer::{Encoding, KmerVal};

/// Opens `path` for reading, transparently decompressing it first if its
/// name ends in `.gz` and the `gzip` feature is enabled. A `.gz` path
/// without the feature is a `BadArgument`, not a silent raw-byte read.
fn open_reads(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| KmcError::file_io(path, e))?;
    let is_gz = path.extension().and_then(|e| e.to_str()) == Some("gz");
    if is_gz {
        #[cfg(feature = "gzip")]
        {
            return Ok(Box::new(flate2::read::GzDecoder::new(file)));
        }
        #[cfg(not(feature = "gzip"))]
        {
            return Err(KmcError::BadArgument(format!(
                "{}: gzip-compressed input requires the 'gzip' feature",
                path.display()
            )));
        }
    }
    Ok(Box::new(BufReader::new(file)))
}

/// Strips a trailing `.gz` before checking for `.fq`/`.fastq`, so
/// `reads.fq.gz` is still recognised as FASTQ.
fn format_stem(path: &Path) -> &Path {
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        path.file_stem().map_or(path, Path::new)
    } else {
        path
    }
}

/// The set of canonical k-mers a read is tested against.
pub struct MembershipSet {
    k: usize,
    encoding: Encoding,
    kmers: HashSet<KmerVal>,
}

impl MembershipSet {
    pub fn new(k: usize, encoding: Encoding) -> Self {
        Self {
            k,
            encoding,
            kmers: HashSet::new(),
        }
    }

    pub fn insert(&mut self, kmer: KmerVal) {
        self.kmers.insert(kmer);
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Does any canonical k-mer substring of `seq` fall in the set?
    fn matches(&self, seq: &[u8]) -> bool {
        if seq.len() < self.k {
            return false;
        }
        for window in seq.windows(self.k) {
            if window.contains(&b'N') || window.contains(&b'n') {
                continue;
            }
            let rc = revcomp(window);
            let canon = min(window, rc.as_slice());
            if let Ok(kmer) = KmerVal::encode(canon, &self.encoding) {
                if self.kmers.contains(&kmer) {
                    return true;
                }
            }
        }
        false
    }
}

fn is_fastq(path: &Path) -> bool {
    matches!(
        format_stem(path).extension().and_then(|e| e.to_str()),
        Some("fq") | Some("fastq")
    )
}

/// Streams records from `reads`, writing to `output` only those containing
/// at least one k-mer present in `set`. Format (FASTA/FASTQ) follows the
/// input file's extension and is preserved on output; a `.gz` suffix is
/// transparently decompressed on the way in.
pub fn filter(reads: &Path, output: &Path, set: &MembershipSet) -> Result<()> {
    #[cfg(feature = "needletail")]
    {
        filter_needletail(reads, output, set)
    }
    #[cfg(not(feature = "needletail"))]
    {
        filter_bio(reads, output, set)
    }
}

#[cfg(not(feature = "needletail"))]
fn filter_bio(reads: &Path, output: &Path, set: &MembershipSet) -> Result<()> {
    let out_file = File::create(output).map_err(|e| KmcError::file_io(output, e))?;
    let mut out = BufWriter::new(out_file);
    let input = open_reads(reads)?;

    if is_fastq(reads) {
        let reader = fastq::Reader::new(input);
        for record in reader.records() {
            let record = record.map_err(|e| KmcError::bad_format(reads, e.to_string()))?;
            if set.matches(record.seq()) {
                write_fastq(&mut out, reads, &record)?;
            }
        }
    } else {
        let reader = fasta::Reader::new(input);
        for record in reader.records() {
            let record = record.map_err(|e| KmcError::bad_format(reads, e.to_string()))?;
            if set.matches(record.seq()) {
                write_fasta(&mut out, reads, &record)?;
            }
        }
    }
    out.flush().map_err(|e| KmcError::file_io(output, e))?;
    Ok(())
}

/// needletail requires its reader to be `Send`, so the whole input is
/// buffered before parsing (mirrors the teacher's streaming reader). It
/// auto-detects FASTA/FASTQ and gzip framing from content rather than the
/// file extension, but output is still written in the extension's format
/// so round-tripping `reads.fq` produces FASTQ with quality lines.
#[cfg(feature = "needletail")]
fn filter_needletail(reads: &Path, output: &Path, set: &MembershipSet) -> Result<()> {
    let out_file = File::create(output).map_err(|e| KmcError::file_io(output, e))?;
    let mut out = BufWriter::new(out_file);
    let want_fastq = is_fastq(reads);

    let mut buffer = Vec::new();
    open_reads(reads)?
        .read_to_end(&mut buffer)
        .map_err(|e| KmcError::file_io(reads, e))?;

    let mut parser = needletail::parse_fastx_reader(std::io::Cursor::new(buffer))
        .map_err(|e| KmcError::bad_format(reads, e.to_string()))?;
    while let Some(record) = parser.next() {
        let record = record.map_err(|e| KmcError::bad_format(reads, e.to_string()))?;
        if !set.matches(&record.seq()) {
            continue;
        }
        let id = record.id();
        if want_fastq {
            writeln!(out, "@{}", String::from_utf8_lossy(id))
                .map_err(|e| KmcError::file_io(output, e))?;
            out.write_all(&record.seq())
                .and_then(|()| writeln!(out, "\n+"))
                .map_err(|e| KmcError::file_io(output, e))?;
            let qual = record.qual().unwrap_or(&[]);
            out.write_all(qual)
                .and_then(|()| writeln!(out))
                .map_err(|e| KmcError::file_io(output, e))?;
        } else {
            writeln!(out, ">{}", String::from_utf8_lossy(id))
                .map_err(|e| KmcError::file_io(output, e))?;
            out.write_all(&record.seq())
                .and_then(|()| writeln!(out))
                .map_err(|e| KmcError::file_io(output, e))?;
        }
    }
    out.flush().map_err(|e| KmcError::file_io(output, e))?;
    Ok(())
}

#[cfg(not(feature = "needletail"))]
fn write_fasta(out: &mut impl Write, path: &Path, record: &fasta::Record) -> Result<()> {
    let desc = record.desc().map(|d| format!(" {d}")).unwrap_or_default();
    writeln!(out, ">{}{desc}", record.id()).map_err(|e| KmcError::file_io(path, e))?;
    out.write_all(record.seq())
        .and_then(|()| writeln!(out))
        .map_err(|e| KmcError::file_io(path, e))
}

#[cfg(not(feature = "needletail"))]
fn write_fastq(out: &mut impl Write, path: &Path, record: &fastq::Record) -> Result<()> {
    let desc = record.desc().map(|d| format!(" {d}")).unwrap_or_default();
    writeln!(out, "@{}{desc}", record.id()).map_err(|e| KmcError::file_io(path, e))?;
    out.write_all(record.seq())
        .and_then(|()| writeln!(out, "\n+"))
        .map_err(|e| KmcError::file_io(path, e))?;
    out.write_all(record.qual())
        .and_then(|()| writeln!(out))
        .map_err(|e| KmcError::file_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_canonical_substring() {
        let encoding = Encoding::canonical();
        let mut set = MembershipSet::new(4, encoding);
        set.insert(KmerVal::encode(b"ACGT", &encoding).unwrap());
        assert!(set.matches(b"TTACGTTT"));
        assert!(!set.matches(b"TTTTTTTT"));
    }

    #[test]
    fn rejects_windows_with_n() {
        let encoding = Encoding::canonical();
        let mut set = MembershipSet::new(4, encoding);
        set.insert(KmerVal::encode(b"ACGT", &encoding).unwrap());
        assert!(!set.matches(b"ACNT"));
    }

    #[test]
    fn format_stem_strips_gz_before_extension_check() {
        assert!(is_fastq(Path::new("reads.fq.gz")));
        assert!(is_fastq(Path::new("reads.fastq.gz")));
        assert!(!is_fastq(Path::new("reads.fa.gz")));
        assert!(is_fastq(Path::new("reads.fq")));
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn filter_reads_gzip_compressed_fasta() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let reads_path = dir.path().join("reads.fa.gz");
        let output_path = dir.path().join("out.fa");

        let mut enc = GzEncoder::new(File::create(&reads_path).unwrap(), Compression::default());
        enc.write_all(b">r1\nACGTACGT\n>r2\nTTTTTTTT\n").unwrap();
        enc.finish().unwrap();

        let encoding = Encoding::canonical();
        let mut set = MembershipSet::new(4, encoding);
        set.insert(KmerVal::encode(b"ACGT", &encoding).unwrap());

        filter(&reads_path, &output_path, &set).unwrap();
        let out = std::fs::read_to_string(&output_path).unwrap();
        assert!(out.contains("r1"));
        assert!(!out.contains("r2"));
    }

    #[cfg(feature = "needletail")]
    #[test]
    fn filter_needletail_preserves_fastq_quality_lines() {
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let reads_path = dir.path().join("reads.fq");
        let output_path = dir.path().join("out.fq");
        std::fs::write(
            &reads_path,
            b"@r1\nACGTACGT\n+\nIIIIIIII\n@r2\nTTTTTTTT\n+\nIIIIIIII\n",
        )
        .unwrap();

        let encoding = Encoding::canonical();
        let mut set = MembershipSet::new(4, encoding);
        set.insert(KmerVal::encode(b"ACGT", &encoding).unwrap());

        filter(&reads_path, &output_path, &set).unwrap();
        let out = std::fs::read_to_string(&output_path).unwrap();
        assert!(out.contains("r1"));
        assert!(out.contains("IIIIIIII"));
        assert!(!out.contains("r2"));
    }
}
