//! Histogram sink (§4.7): accumulates counter -> count in a vector sized
//! `cutoff_max + 1`, then writes one line per counter in
//! `[cutoff_min, cutoff_max]` on `finish()`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{KmcError, Result};
use crate::kmer::KmerVal;
use crate::ops::RecordSink;

pub struct HistogramSink {
    file: File,
    path: PathBuf,
    cutoff_min: u32,
    cutoff_max: u32,
    counts: Vec<u64>,
}

impl HistogramSink {
    pub fn create(path: &Path, cutoff_min: u32, cutoff_max: u32) -> Result<Self> {
        let file = File::create(path).map_err(|e| KmcError::file_io(path, e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            cutoff_min,
            cutoff_max,
            counts: vec![0u64; cutoff_max as usize + 1],
        })
    }
}

impl RecordSink for HistogramSink {
    fn accept(&mut self, _kmer: &KmerVal, counter: u32) -> Result<()> {
        if let Some(slot) = self.counts.get_mut(counter as usize) {
            *slot += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut out = String::new();
        for counter in self.cutoff_min..=self.cutoff_max {
            let count = self.counts.get(counter as usize).copied().unwrap_or(0);
            out.push_str(&counter.to_string());
            out.push('\t');
            out.push_str(&count.to_string());
            out.push('\n');
        }
        self.file
            .write_all(out.as_bytes())
            .map_err(|e| KmcError::file_io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::Encoding;
    use tempfile::tempdir;

    #[test]
    fn histogram_matches_scenario_s6() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hist.txt");
        let enc = Encoding::canonical();
        let mut sink = HistogramSink::create(&path, 1, 3).unwrap();
        sink.accept(&KmerVal::encode(b"AAAA", &enc).unwrap(), 1).unwrap();
        sink.accept(&KmerVal::encode(b"CCCC", &enc).unwrap(), 1).unwrap();
        sink.accept(&KmerVal::encode(b"GGGG", &enc).unwrap(), 2).unwrap();
        sink.accept(&KmerVal::encode(b"TTTT", &enc).unwrap(), 3).unwrap();
        sink.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "1\t2\n2\t1\n3\t1\n");
    }

    #[test]
    fn histogram_ignores_counters_outside_its_allocated_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hist.txt");
        let enc = Encoding::canonical();
        let mut sink = HistogramSink::create(&path, 1, 2).unwrap();
        // counter_max (cutoff_max) bounds the vector; larger counters are
        // simply not tallied rather than causing an out-of-bounds write.
        sink.accept(&KmerVal::encode(b"AAAA", &enc).unwrap(), 1).unwrap();
        sink.accept(&KmerVal::encode(b"CCCC", &enc).unwrap(), 50).unwrap();
        sink.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "1\t1\n2\t0\n");
    }
}
