// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

// Index format.
//
// An index stored on disk has the format:
//
//  header:
//      magic "BIGGREP\n"                       [8]
//      fmt_major (currently 2)                 [1]
//      fmt_minor (0, 1 or 2)                   [1]
//      N (3 or 4)                              [1]
//      hint_type (0-2, iff fmt >= 2.1)         [1]
//      pfor_blocksize                          [1]
//      num_ngrams, little endian               [4]
//      num_files, little endian                [4]
//      fileid_map_offset, little endian        [8]
//
//  hints:
//      2^H little-endian u64 file offsets, H depending on N and
//      hint_type (see num_hints below). An entry of all ones means no
//      posting carries that hint prefix; otherwise the entry is the
//      absolute offset of the first posting whose hint prefix equals the
//      entry's index.
//
//  postings, for each ngram in ascending order:
//      VarByte(size << 1 | pfor_flag)
//      payload of `size` bytes:
//          VarByte(first file id)
//          either PFOR blocks over the remaining deltas, zero padded to
//          the blocksize, or one VarByte per delta
//      An absent ngram is written as one raw zero byte in place of a
//      size field (no real size field ever starts with 0x00); runs of
//      absent ngrams between present ones are one such byte each, and
//      nothing at all is written past the last present ngram.
//
//  fileid map, at fileid_map_offset:
//      one newline-terminated line per id, in id order:
//          NNNNNNNNNN <path>[,key=value]*
//      zlib-compressed when fmt_minor == 2.
//
// A fileid_map_offset of zero marks an index that is still being
// generated (or a build that died); readers refuse it.

use std::error::Error;
use std::fmt;

pub mod header;
pub mod ngram;

pub use header::BgiHeader;

/// First eight bytes of every index file.
pub const MAGIC: &[u8; 8] = b"BIGGREP\n";

pub const FMT_MAJOR: u8 = 2;
pub const FMT_MINOR: u8 = 1;
pub const FMT_MINOR_COMPRESSED: u8 = 2;

/// Hint-table entry for "no posting carries this prefix".
pub const HINT_ABSENT: u64 = u64::MAX;

#[derive(Debug)]
pub enum FormatError {
    BadMagic,
    Truncated,
    UnsupportedVersion { major: u8, minor: u8 },
    BadNgramSize(u8),
    BadHintType(u8),
    /// fileid_map_offset is still zero: the index was never finalized.
    NotFinalized,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FormatError::BadMagic => write!(f, "bad magic, not a BGI index file"),
            FormatError::Truncated => write!(f, "index file appears to be truncated"),
            FormatError::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported index format version {}.{}", major, minor)
            }
            FormatError::BadNgramSize(n) => write!(f, "invalid ngram size {} (only 3 or 4)", n),
            FormatError::BadHintType(t) => write!(f, "invalid hint type {} (only 0-2)", t),
            FormatError::NotFinalized => {
                write!(f, "fileid_map_offset not set, index still being generated?")
            }
        }
    }
}

impl Error for FormatError {}
