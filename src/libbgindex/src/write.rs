// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Index writing. See libbgformat for details of the on-disk format.
//!
//! Compressed postings arrive in whatever order the compressor pool
//! finishes them; the writer buffers them by sequence number and commits
//! bytes strictly in merge order, so the output file is deterministic.
//! The file is written in a single forward pass: a placeholder header
//! and hint table go out first, and both are rewritten in place once the
//! last posting and the file-id map are down.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, info};

use libbgcodec::varbyte;
use libbgformat::{BgiHeader, HINT_ABSENT};

use crate::compress::CompressedPosting;
use crate::error::{IndexError, IndexErrorKind, IndexResult};

/// A posting this size or larger cannot be represented: the size field
/// loses its top bit to the PFOR flag.
const MAX_POSTING_SIZE: usize = 1 << 31;

const WRITE_BUF_SIZE: usize = 256 << 10;

#[derive(Debug, Default, Clone, Copy)]
pub struct WriterStats {
    pub total_ngrams: u64,
    pub total_pfor_encoded: u64,
    pub total_uncompressed_bytes: u64,
    pub total_compressed_bytes: u64,
    pub final_index_size: u64,
}

pub struct IndexWriter {
    out: BufWriter<File>,
    header: BgiHeader,
    hints: Vec<u64>,
    /// Current absolute file offset; tracked rather than asked for, the
    /// stream only ever moves forward until finalize.
    offset: u64,
    next_seq: u64,
    pending: BTreeMap<u64, CompressedPosting>,
    last_ngram: u32,
    first_write: bool,
    last_hint: u64,
    stats: WriterStats,
}

impl IndexWriter {
    /// Open the output file and lay down the placeholder header and
    /// hint table.
    pub fn create<P: AsRef<Path>>(path: P, header: BgiHeader) -> IndexResult<IndexWriter> {
        let f = File::create(path)?;
        let mut out = BufWriter::with_capacity(WRITE_BUF_SIZE, f);

        header.write(&mut out)?;
        let num_hints = header.num_hints() as usize;
        let mut hints = vec![HINT_ABSENT; num_hints];
        for _ in 0..num_hints {
            out.write_u64::<LittleEndian>(HINT_ABSENT)?;
        }
        let offset = header.header_size() + header.hints_size();
        // postings begin here; even if the first one needs leading
        // padding, the skip scan for hint prefix zero starts at it
        hints[0] = offset;

        Ok(IndexWriter {
            out,
            header,
            hints,
            offset,
            next_seq: 0,
            pending: BTreeMap::new(),
            last_ngram: 0,
            first_write: true,
            last_hint: 0,
            stats: WriterStats::default(),
        })
    }

    pub fn written(&self) -> u64 {
        self.stats.total_ngrams
    }

    /// Accept one compressed posting, flushing as many in-order postings
    /// as its arrival unblocks.
    pub fn add(&mut self, posting: CompressedPosting) -> IndexResult<()> {
        self.pending.insert(posting.seq, posting);
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() != self.next_seq {
                break;
            }
            let posting = entry.remove();
            self.write_posting(posting)?;
            self.next_seq += 1;
        }
        Ok(())
    }

    fn write_posting(&mut self, posting: CompressedPosting) -> IndexResult<()> {
        let CompressedPosting { ngram, bytes, uncompressed_size, pfor, .. } = posting;

        if bytes.len() >= MAX_POSTING_SIZE {
            return Err(IndexError::new(
                IndexErrorKind::Invariant,
                format!("size of compressed data too big for ngram {:08x}", ngram),
            ));
        }

        // absent ngrams between the previous posting and this one each
        // get a single zero byte, which reads back as an empty posting
        let pad = if self.first_write {
            self.first_write = false;
            u64::from(ngram)
        } else {
            u64::from(ngram) - u64::from(self.last_ngram) - 1
        };
        if pad > 0 {
            debug!(
                "padding missing ngrams before {:08x} ({} of them)",
                ngram, pad
            );
            let zeros = [0u8; 4096];
            let mut left = pad;
            while left > 0 {
                let n = left.min(zeros.len() as u64) as usize;
                self.out.write_all(&zeros[..n])?;
                left -= n as u64;
            }
            self.offset += pad;
        }

        let hint = self.header.ngram_to_hint(ngram);
        if hint != self.last_hint {
            let mut at = self.offset;
            // if this ngram sits mid-padding, the hint has to point at
            // the first padded slot sharing its prefix so the skip count
            // stays position-relative
            let low = u64::from(ngram & self.header.hint_type_mask());
            if pad > 0 && low != 0 {
                at -= low;
            }
            self.hints[hint as usize] = at;
            self.last_hint = hint;
        }

        let mut size_field = Vec::with_capacity(5);
        varbyte::encode_into(
            &mut size_field,
            (bytes.len() as u64) << 1 | u64::from(pfor),
        );
        self.out.write_all(&size_field)?;
        self.out.write_all(&bytes)?;
        self.offset += (size_field.len() + bytes.len()) as u64;
        self.last_ngram = ngram;

        self.stats.total_ngrams += 1;
        self.stats.total_pfor_encoded += u64::from(pfor);
        self.stats.total_uncompressed_bytes += uncompressed_size;
        self.stats.total_compressed_bytes += bytes.len() as u64;
        if self.stats.total_ngrams % 0xFFFFF == 0 {
            info!("writing ngram {:08x}", ngram);
        }
        Ok(())
    }

    /// Write the file-id map, then rewind and rewrite the header and
    /// hint table with their real values.
    pub fn finalize(mut self, id_to_name: &[String], compress: bool) -> IndexResult<WriterStats> {
        if !self.pending.is_empty() {
            return Err(IndexError::new(
                IndexErrorKind::Invariant,
                format!(
                    "{} postings never flushed, first waiting seq {} but next expected {}",
                    self.pending.len(),
                    self.pending.keys().next().expect("nonempty"),
                    self.next_seq
                ),
            ));
        }

        self.header.fileid_map_offset = self.offset;
        self.header.num_ngrams = self.stats.total_ngrams as u32;
        self.header.num_files = id_to_name.len() as u32;
        if compress {
            self.header.fmt_minor = libbgformat::FMT_MINOR_COMPRESSED;
        }

        debug!("saving fileid map");
        if compress {
            let mut enc = ZlibEncoder::new(&mut self.out, Compression::default());
            for (i, name) in id_to_name.iter().enumerate() {
                writeln!(enc, "{:010} {}", i, name)?;
            }
            enc.finish()?;
        } else {
            for (i, name) in id_to_name.iter().enumerate() {
                writeln!(self.out, "{:010} {}", i, name)?;
            }
        }

        self.out.flush()?;
        let mut f = self.out.into_inner().map_err(|e| e.into_error())?;
        let final_index_size = f.seek(SeekFrom::End(0))?;

        debug!("fixing header data");
        f.seek(SeekFrom::Start(0))?;
        let mut out = BufWriter::with_capacity(WRITE_BUF_SIZE, f);
        self.header.write(&mut out)?;
        debug!("saving index hint data");
        for &h in &self.hints {
            out.write_u64::<LittleEndian>(h)?;
        }
        out.flush()?;

        self.stats.final_index_size = final_index_size;
        info!(
            "wrote {} ngrams, {} pfor encoded, {} uncompressed, {} compressed",
            self.stats.total_ngrams,
            self.stats.total_pfor_encoded,
            self.stats.total_uncompressed_bytes,
            self.stats.total_compressed_bytes
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::{Compressor, PostingList};

    fn posting(seq: u64, ngram: u32, ids: Vec<u32>) -> CompressedPosting {
        Compressor::new(32, 3, 8)
            .compress(PostingList { seq, ngram, ids })
            .unwrap()
    }

    fn read_index(path: &Path) -> Vec<u8> {
        std::fs::read(path).unwrap()
    }

    #[test]
    fn out_of_order_postings_land_in_ngram_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bgi");
        let mut hdr = BgiHeader::new(3);
        hdr.pfor_blocksize = 32;
        let mut w = IndexWriter::create(&path, hdr.clone()).unwrap();
        // writer sorts by seq, whatever order the pool finished in
        w.add(posting(1, 0x000020, vec![1])).unwrap();
        w.add(posting(2, 0x000021, vec![0, 1])).unwrap();
        w.add(posting(0, 0x000010, vec![0])).unwrap();
        let stats = w.finalize(&["a".to_string(), "b".to_string()], false).unwrap();
        assert_eq!(stats.total_ngrams, 3);

        let data = read_index(&path);
        let hdr = BgiHeader::read(&data).unwrap();
        assert_eq!(hdr.num_ngrams, 3);
        assert_eq!(hdr.num_files, 2);
        assert!(hdr.fileid_map_offset > 0);
        let map = &data[hdr.fileid_map_offset as usize..];
        assert_eq!(map, &b"0000000000 a\n0000000001 b\n"[..]);
    }

    #[test]
    fn gaps_between_ngrams_are_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bgi");
        let mut hdr = BgiHeader::new(3);
        hdr.pfor_blocksize = 32;
        let mut w = IndexWriter::create(&path, hdr).unwrap();
        let g = 0x000100u32;
        w.add(posting(0, g, vec![0])).unwrap();
        w.add(posting(1, g + 5, vec![1])).unwrap();
        w.finalize(&["a".to_string(), "b".to_string()], false).unwrap();

        let data = read_index(&path);
        let hdr = BgiHeader::read(&data).unwrap();
        let start = (hdr.header_size() + hdr.hints_size()) as usize;
        // g leading pad, then its posting: size field + VarByte(0)
        let mut at = start + g as usize;
        let (size, n) = varbyte::decode(&data[at..]).unwrap();
        assert_eq!(size & 1, 0);
        at += n + (size >> 1) as usize;
        // exactly four zero bytes for g+1..g+4
        assert_eq!(&data[at..at + 4], &[0, 0, 0, 0]);
        let (size2, _) = varbyte::decode(&data[at + 4..]).unwrap();
        assert!(size2 >> 1 > 0);
    }

    #[test]
    fn missing_seq_is_caught_at_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.bgi");
        let mut hdr = BgiHeader::new(3);
        hdr.pfor_blocksize = 32;
        let mut w = IndexWriter::create(&path, hdr).unwrap();
        w.add(posting(1, 0x000002, vec![0])).unwrap();
        let err = w.finalize(&["a".to_string()], false).unwrap_err();
        assert_eq!(err.kind(), IndexErrorKind::Invariant);
    }
}
