// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Shingling: turn one file into its sorted unique ngram list.
//!
//! Nothing here ever aborts the build. Files that cannot be opened or
//! mapped, or whose size is out of range, come back flagged `missing`;
//! files with more unique ngrams than the policy allows come back
//! flagged `hit_limit` with their ngram list discarded. The caller
//! decides what to do with the flags.

use std::fs::File;
use std::path::Path;

use log::{error, info};
use memmap2::Mmap;

use libbgformat::ngram;

use crate::filedata::FileData;

#[derive(Debug, Clone, Copy)]
pub struct ShingleOptions {
    pub ngram_size: u8,
    /// Files with at least this many unique ngrams are rejected.
    pub max_unique_ngrams: u64,
}

/// Outcome of shingling one file: the FileData (flags included) and the
/// unique-ngram count for the metadata line.
pub struct Shingled {
    pub fd: FileData,
    pub unique_ngrams: usize,
}

pub fn shingle_file(path: &str, id: u32, opts: ShingleOptions) -> Shingled {
    let mut fd = FileData::new(id);

    let size = match std::fs::metadata(path) {
        Ok(md) => md.len(),
        Err(e) => {
            error!("stat failed on '{}' ({})", path, e);
            fd.missing = true;
            return Shingled { fd, unique_ngrams: 0 };
        }
    };
    if size < u64::from(opts.ngram_size) || size >= 1 << 32 {
        error!("issue w/ file size on '{}' ({})", path, size);
        fd.missing = true;
        return Shingled { fd, unique_ngrams: 0 };
    }

    let map = match open_map(path) {
        Ok(map) => map,
        Err(e) => {
            error!("issue w/ mmap on '{}' ({})", path, e);
            fd.missing = true;
            return Shingled { fd, unique_ngrams: 0 };
        }
    };

    let total = map.len() - usize::from(opts.ngram_size) + 1;
    fd.ngrams = ngram::extract_ngrams(&map, opts.ngram_size);
    drop(map);
    ngram::sort_and_dedup(&mut fd.ngrams);

    let unique_ngrams = fd.ngrams.len();
    if unique_ngrams as u64 >= opts.max_unique_ngrams {
        error!(
            "Shingled file {} contains too many ({}) unique {}-grams, rejecting from index.",
            path, unique_ngrams, opts.ngram_size
        );
        fd.hit_limit = true;
        fd.ngrams = Vec::new();
        return Shingled { fd, unique_ngrams };
    }

    info!(
        "Shingled file {} (id {}) contains {} UNIQUE {}-grams out of {} total",
        path, id, unique_ngrams, opts.ngram_size, total
    );
    Shingled { fd, unique_ngrams }
}

fn open_map(path: &str) -> std::io::Result<Mmap> {
    let f = File::open(Path::new(path))?;
    // the map is read-only and dropped before the file ever changes hands
    unsafe { Mmap::map(&f) }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn opts() -> ShingleOptions {
        ShingleOptions {
            ngram_size: 3,
            max_unique_ngrams: u64::from(u32::MAX),
        }
    }

    #[test]
    fn missing_file_is_flagged_not_fatal() {
        let s = shingle_file("/nonexistent/biggrep/test/path", 0, opts());
        assert!(s.fd.missing);
        assert!(!s.fd.hit_limit);
    }

    #[test]
    fn short_file_is_flagged_missing() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"ab").unwrap();
        let s = shingle_file(f.path().to_str().unwrap(), 0, opts());
        assert!(s.fd.missing);
    }

    #[test]
    fn shingles_sorted_unique() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        // "abcabc": windows abc, bca, cab, abc -> three unique
        f.write_all(b"abcabc").unwrap();
        let s = shingle_file(f.path().to_str().unwrap(), 3, opts());
        assert!(!s.fd.rejected());
        assert_eq!(s.unique_ngrams, 3);
        let mut sorted = s.fd.ngrams.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(s.fd.ngrams, sorted);
    }

    #[test]
    fn limit_rejects_and_discards() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"abcdefgh").unwrap();
        let mut o = opts();
        o.max_unique_ngrams = 3;
        let s = shingle_file(f.path().to_str().unwrap(), 0, o);
        assert!(s.fd.hit_limit);
        assert!(s.fd.ngrams.is_empty());
        assert_eq!(s.unique_ngrams, 6);
    }
}
