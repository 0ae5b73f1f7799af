// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Integer codecs used by the posting stream: VarByte for single unsigned
//! values and PFOR (Patched Frame Of Reference) for fixed-size blocks of
//! small ones, plus the delta-list helpers both sides of the index share.

use std::error::Error;
use std::fmt;

pub mod pfor;
pub mod varbyte;

pub use pfor::{from_deltas, to_deltas, Pfor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The block handed to the PFOR encoder was not exactly one blocksize.
    BlockSizeMismatch { expected: usize, got: usize },
    /// No bit width in 1..=15 leaves few enough exception values.
    WidthOverflow,
    /// Ran out of input bytes mid-value or mid-block.
    TruncatedInput,
    /// A VarByte value ran longer than any 64-bit value can encode to.
    Overlong,
    /// A PFOR exception patch pointed outside its block.
    BadExceptionIndex { index: u64, blocksize: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CodecError::BlockSizeMismatch { expected, got } => {
                write!(f, "block size mismatch: expected {} values, got {}", expected, got)
            }
            CodecError::WidthOverflow => write!(f, "no bit width <= 15 satisfies the exception limit"),
            CodecError::TruncatedInput => write!(f, "truncated input"),
            CodecError::Overlong => write!(f, "overlong VarByte value"),
            CodecError::BadExceptionIndex { index, blocksize } => {
                write!(f, "exception index {} outside block of {}", index, blocksize)
            }
        }
    }
}

impl Error for CodecError {}

pub type CodecResult<T> = Result<T, CodecError>;
