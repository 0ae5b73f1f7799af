// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! In-place file-id-map surgery.
//!
//! The map is the only part of an index that can be rewritten after the
//! fact: an entry's path can be blanked or replaced without moving a
//! single posting byte, because entries are resolved by line position
//! and the map sits at the end of the file. Blanked entries keep their
//! `NNNNNNNNNN ` prefix so every other id keeps its line.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{info, warn};

use crate::read::Index;
use crate::{QueryError, QueryResult};

/// Blank (or replace) every map entry whose path matches one of
/// `targets`. Returns how many entries changed. The index file is
/// modified in place; posting offsets are untouched.
pub fn extract_entries<P: AsRef<Path>>(
    index_path: P,
    targets: &[String],
    replacement: Option<&str>,
) -> QueryResult<usize> {
    let index_path = index_path.as_ref();
    let (header, mut lines, region_len) = {
        let index = Index::open(index_path)?;
        let region = index.len() - index.header().fileid_map_offset as usize;
        (index.header().clone(), index.file_map()?, region)
    };

    let mut found = 0;
    for line in lines.iter_mut() {
        let Some(space) = line.find(' ') else {
            warn!("problem parsing fileid map line: {}", line);
            continue;
        };
        let entry = &line[space + 1..];
        let path_part = entry.split(',').next().unwrap_or(entry);
        if targets.iter().any(|t| t == path_part) {
            info!("Extracting: {}", line);
            let mut new_line = line[..space + 1].to_string();
            if let Some(r) = replacement {
                new_line.push_str(r);
            }
            *line = new_line;
            found += 1;
            if found == targets.len() {
                break;
            }
        }
    }

    if found == 0 {
        warn!("no files found");
        return Ok(0);
    }

    // the read/write reopen stands where the original's writable map
    // did, so its failure reports the same way
    let mut f = OpenOptions::new()
        .read(true)
        .write(true)
        .open(index_path)
        .map_err(QueryError::Mmap)?;
    f.seek(SeekFrom::Start(header.fileid_map_offset))?;
    if header.compressed() {
        // the fresh stream may be shorter than the old one; zlib stops
        // at its end marker, so stale tail bytes are harmless
        let mut enc = ZlibEncoder::new(&mut f, Compression::default());
        for line in &lines {
            writeln!(enc, "{}", line)?;
        }
        enc.finish()?;
    } else {
        let mut written = 0;
        for line in &lines {
            writeln!(f, "{}", line)?;
            written += line.len() + 1;
        }
        // NUL-pad the shrinkage so the file keeps its exact size
        if written < region_len {
            let pad = vec![0u8; region_len - written];
            f.write_all(&pad)?;
        }
    }
    Ok(found)
}
