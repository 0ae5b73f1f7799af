// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Index building: shingle files into sorted unique ngram sets, merge
//! them with a loser tree, compress each posting list, and write the
//! `.bgi` file. See [`pipeline::build_index`] for the whole pipeline;
//! the stage types are public for reuse and testing.

pub mod compress;
pub mod error;
pub mod filedata;
pub mod losertree;
pub mod merge;
pub mod pipeline;
pub mod shingle;
pub mod stopwatch;
pub mod write;

pub use compress::{CompressedPosting, Compressor, PostingList};
pub use error::{IndexError, IndexErrorKind, IndexResult};
pub use filedata::FileData;
pub use losertree::LoserTree;
pub use merge::PostingBatcher;
pub use pipeline::{build_index, BuildStats, IndexOptions};
pub use write::{IndexWriter, WriterStats};
