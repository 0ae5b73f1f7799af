// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Query side of the index: open a `.bgi` file, look up postings by
//! ngram, intersect across the ngrams of a byte pattern, and resolve
//! surviving file ids through the file-id map.

use std::error::Error;
use std::fmt;
use std::io;

use libbgcodec::CodecError;
use libbgformat::FormatError;

pub mod extract;
pub mod pattern;
pub mod read;

pub use read::{Index, StreamStats};

#[derive(Debug)]
pub enum QueryError {
    /// The index file could not be stat'd or opened.
    Stat(io::Error),
    /// The index file could not be mapped.
    Mmap(io::Error),
    /// Any other I/O failure while using an open index.
    Io(io::Error),
    Format(FormatError),
    /// Posting data failed to decode; the index is corrupt.
    Codec(CodecError),
    /// The search pattern was unusable (bad hex, too short).
    Pattern(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            QueryError::Stat(ref e) => write!(f, "issue w/ stat on index file ({})", e),
            QueryError::Mmap(ref e) => write!(f, "issue w/ mmap on index file ({})", e),
            QueryError::Io(ref e) => e.fmt(f),
            QueryError::Format(ref e) => e.fmt(f),
            QueryError::Codec(ref e) => write!(f, "corrupt posting data: {}", e),
            QueryError::Pattern(ref msg) => f.write_str(msg),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            QueryError::Stat(ref e) | QueryError::Mmap(ref e) | QueryError::Io(ref e) => Some(e),
            QueryError::Format(ref e) => Some(e),
            QueryError::Codec(ref e) => Some(e),
            QueryError::Pattern(_) => None,
        }
    }
}

impl From<io::Error> for QueryError {
    fn from(e: io::Error) -> Self {
        QueryError::Io(e)
    }
}

impl From<FormatError> for QueryError {
    fn from(e: FormatError) -> Self {
        QueryError::Format(e)
    }
}

impl From<CodecError> for QueryError {
    fn from(e: CodecError) -> Self {
        QueryError::Codec(e)
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
