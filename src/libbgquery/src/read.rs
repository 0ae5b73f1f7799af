// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reading an index. See libbgformat for details of the on-disk format.

use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use log::{debug, info, warn};
use memmap2::Mmap;

use libbgcodec::{from_deltas, varbyte, Pfor};
use libbgformat::{ngram, BgiHeader, FormatError, HINT_ABSENT};

use crate::{QueryError, QueryResult};

/// A memory-mapped `.bgi` index.
pub struct Index {
    map: Mmap,
    header: BgiHeader,
    hints_at: usize,
}

/// Totals from one pass over the posting stream, for the stats dump.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamStats {
    pub present_ngrams: u64,
    /// Zero-byte slots written for absent ngrams inside the covered
    /// range.
    pub absent_slots: u64,
    pub pfor_postings: u64,
    pub varbyte_postings: u64,
    pub total_ids: u64,
    pub total_posting_bytes: u64,
    pub largest_posting_ids: u64,
}

impl Index {
    pub fn open<P: AsRef<Path>>(path: P) -> QueryResult<Index> {
        let f = File::open(path).map_err(QueryError::Stat)?;
        let map = unsafe { Mmap::map(&f) }.map_err(QueryError::Mmap)?;
        let header = BgiHeader::read(&map)?;
        if header.fileid_map_offset == 0 {
            return Err(FormatError::NotFinalized.into());
        }
        let data_start = header.header_size() + header.hints_size();
        if header.fileid_map_offset > map.len() as u64
            || header.fileid_map_offset < data_start
        {
            return Err(FormatError::Truncated.into());
        }
        debug!("{}", header.dump());
        let hints_at = header.header_size() as usize;
        Ok(Index { map, header, hints_at })
    }

    pub fn header(&self) -> &BgiHeader {
        &self.header
    }

    /// Total size of the mapped file in bytes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }

    fn hint_entry(&self, ngram: u32) -> u64 {
        let idx = self.header.ngram_to_hint(ngram);
        if idx >= self.header.num_hints() {
            // an ngram outside the table (a 3-gram with its high byte
            // set) cannot be in the index
            return HINT_ABSENT;
        }
        let at = self.hints_at + 8 * idx as usize;
        LittleEndian::read_u64(&self.map[at..at + 8])
    }

    /// The sorted file-id list for one ngram; empty when the ngram is
    /// not in the index.
    pub fn posting(&self, ngram: u32) -> QueryResult<Vec<u32>> {
        let hint = self.hint_entry(ngram);
        if hint == HINT_ABSENT {
            debug!("hint index indicates ngram {:08x} not present", ngram);
            return Ok(Vec::new());
        }
        // postings end where the fileid map begins
        let data = &self.map[..self.header.fileid_map_offset as usize];
        let mut pos = hint as usize;

        // surf to the proper ngram: each posting between here and the
        // target is skipped by its size field, absent ones are a single
        // zero byte. The stream carries no padding past the last
        // present ngram, so running off its end means "not here".
        let mut skip = ngram & self.header.hint_type_mask();
        while skip > 0 {
            match data.get(pos) {
                None => return Ok(Vec::new()),
                Some(0) => pos += 1,
                Some(_) => {
                    let (size, n) = varbyte::decode_u32(&data[pos..])?;
                    pos += n + (size >> 1) as usize;
                }
            }
            skip -= 1;
        }

        let (size, pfor) = match data.get(pos) {
            None => return Ok(Vec::new()),
            Some(0) => {
                debug!("0 size, ngram {:08x} not here", ngram);
                return Ok(Vec::new());
            }
            Some(_) => {
                let (field, n) = varbyte::decode_u32(&data[pos..])?;
                pos += n;
                ((field >> 1) as usize, field & 1 == 1)
            }
        };
        if size == 0 {
            return Ok(Vec::new());
        }
        if pos + size > data.len() {
            return Err(FormatError::Truncated.into());
        }
        self.decode_payload(&data[pos..pos + size], pfor)
    }

    /// Decode one posting payload: the VarByte'd first id, then deltas
    /// as PFOR blocks (trailing zero pads stripped) or VarBytes.
    fn decode_payload(&self, payload: &[u8], pfor: bool) -> QueryResult<Vec<u32>> {
        let size = payload.len();
        let (first, mut used) = varbyte::decode_u32(payload)?;
        let mut ids = vec![first];

        if pfor {
            let pfor_codec = Pfor::new(u32::from(self.header.pfor_blocksize), 0);
            while used < size {
                let (mut block, n) = pfor_codec.decode(&payload[used..])?;
                used += n;
                // the delta list may have been padded out to the
                // blocksize with zeros; a real delta is never zero
                if let Some(z) = block.iter().position(|&d| d == 0) {
                    block.truncate(z);
                }
                ids.extend(block);
            }
        } else {
            while used < size {
                let (delta, n) = varbyte::decode_u32(&payload[used..])?;
                used += n;
                ids.push(delta);
            }
        }

        from_deltas(&mut ids, 0);
        Ok(ids)
    }

    /// Walk the whole posting stream once and total it up, the raw
    /// material for the stats dump.
    pub fn stream_stats(&self) -> QueryResult<StreamStats> {
        let data = &self.map[..self.header.fileid_map_offset as usize];
        let mut pos = (self.header.header_size() + self.header.hints_size()) as usize;
        let mut stats = StreamStats::default();

        while pos < data.len() {
            if data[pos] == 0 {
                stats.absent_slots += 1;
                pos += 1;
                continue;
            }
            let (field, n) = varbyte::decode_u32(&data[pos..])?;
            pos += n;
            let size = (field >> 1) as usize;
            let pfor = field & 1 == 1;
            if pos + size > data.len() {
                return Err(FormatError::Truncated.into());
            }
            let ids = self.decode_payload(&data[pos..pos + size], pfor)?;
            pos += size;

            stats.present_ngrams += 1;
            if pfor {
                stats.pfor_postings += 1;
            } else {
                stats.varbyte_postings += 1;
            }
            stats.total_posting_bytes += size as u64;
            stats.total_ids += ids.len() as u64;
            stats.largest_posting_ids = stats.largest_posting_ids.max(ids.len() as u64);
        }
        Ok(stats)
    }

    /// Candidate file ids containing every ngram of every pattern.
    pub fn search(&self, patterns: &[Vec<u8>]) -> QueryResult<Vec<u32>> {
        let n = self.header.n;
        let mut ngrams = Vec::new();
        for pattern in patterns {
            if pattern.len() < usize::from(n) {
                return Err(QueryError::Pattern(format!(
                    "number of bytes to search ({}) is less than n ({})",
                    pattern.len(),
                    n
                )));
            }
            ngrams.extend(ngram::extract_ngrams(pattern, n));
        }
        ngram::sort_and_dedup(&mut ngrams);
        debug!("searching for {} unique ngrams", ngrams.len());

        let mut found: Vec<u32> = Vec::new();
        for (i, &g) in ngrams.iter().enumerate() {
            let cur = self.posting(g)?;
            debug!("found {} file ids for ngram {:08x}", cur.len(), g);
            if cur.is_empty() {
                return Ok(Vec::new());
            }
            if i == 0 {
                found = cur;
            } else {
                found = intersect(&found, &cur);
                if found.is_empty() {
                    info!("set intersection empty, bailing...");
                    return Ok(Vec::new());
                }
            }
        }
        Ok(found)
    }

    /// The raw file-id map lines, `NNNNNNNNNN path[,key=value]*`,
    /// decompressed when the format says so.
    pub fn file_map(&self) -> QueryResult<Vec<String>> {
        let raw = &self.map[self.header.fileid_map_offset as usize..];
        let text = if self.header.compressed() {
            let mut out = String::new();
            ZlibDecoder::new(raw).read_to_string(&mut out)?;
            out
        } else {
            String::from_utf8_lossy(raw).into_owned()
        };
        // an in-place extract leaves NUL padding at the tail
        let text = text.trim_end_matches('\0');
        let lines: Vec<String> = text
            .split('\n')
            .filter(|l| l.len() > 1)
            .map(str::to_string)
            .collect();
        if lines.len() != self.header.num_files as usize {
            warn!(
                "num_files mismatch, expected {} but found {}",
                self.header.num_files,
                lines.len()
            );
        }
        Ok(lines)
    }

    /// Map entries with the id prefix removed: the path, plus whatever
    /// metadata followed it.
    pub fn paths(&self) -> QueryResult<Vec<String>> {
        Ok(self
            .file_map()?
            .into_iter()
            .map(|line| match line.find(' ') {
                Some(at) => line[at + 1..].to_string(),
                None => line,
            })
            .collect())
    }
}

/// Sorted linear intersection of two ascending id lists.
pub fn intersect(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            i += 1;
        } else if a[i] > b[j] {
            j += 1;
        } else {
            out.push(a[i]);
            i += 1;
            j += 1;
        }
    }
    out
}
