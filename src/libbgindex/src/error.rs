// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::error::{self, Error};
use std::fmt;
use std::io;

use libbgcodec::CodecError;

#[derive(Debug)]
pub struct IndexError {
    kind: IndexErrorKind,
    error: Box<dyn error::Error + Send + Sync>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorKind {
    IoError(io::ErrorKind),
    /// Bad option values, caught before any I/O happens.
    Config,
    /// Fewer than two files survived shingling.
    TooFewFiles,
    /// A pipeline contract was broken (merge went backwards, a seq number
    /// never arrived, an oversized posting).
    Invariant,
    Codec,
}

impl IndexError {
    pub fn new<E>(kind: IndexErrorKind, error: E) -> IndexError
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        IndexError {
            kind,
            error: error.into(),
        }
    }
    pub fn kind(&self) -> IndexErrorKind {
        self.kind
    }
}

impl From<io::Error> for IndexError {
    fn from(e: io::Error) -> Self {
        IndexError {
            kind: IndexErrorKind::IoError(e.kind()),
            error: Box::new(e),
        }
    }
}

impl From<CodecError> for IndexError {
    fn from(e: CodecError) -> Self {
        IndexError {
            kind: IndexErrorKind::Codec,
            error: Box::new(e),
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.error.as_ref())
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.error.fmt(fmt)
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
