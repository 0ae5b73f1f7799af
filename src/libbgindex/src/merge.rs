// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Grouping the loser tree's (ngram, file id) stream into posting
//! lists.
//!
//! The tree yields one pair per file per ngram, ngrams non-decreasing.
//! The batcher collects the ids of the current ngram and emits the
//! finished group, stamped with a monotonically increasing sequence
//! number, whenever the ngram changes. A decreasing ngram is a broken
//! merge and comes back as an error rather than a garbage index.

use crate::compress::PostingList;
use crate::error::{IndexError, IndexErrorKind, IndexResult};

pub struct PostingBatcher {
    fids: Vec<u32>,
    seq: u64,
    last_ngram: u32,
    started: bool,
}

impl Default for PostingBatcher {
    fn default() -> PostingBatcher {
        PostingBatcher::new()
    }
}

impl PostingBatcher {
    pub fn new() -> PostingBatcher {
        PostingBatcher {
            fids: Vec::new(),
            seq: 0,
            last_ngram: 0,
            started: false,
        }
    }

    /// Groups emitted so far.
    pub fn emitted(&self) -> u64 {
        self.seq
    }

    /// Feed one merged pair. Returns the completed group when `ngram`
    /// moved past the one being collected.
    pub fn push(&mut self, ngram: u32, id: u32) -> IndexResult<Option<PostingList>> {
        if !self.started {
            self.started = true;
            self.last_ngram = ngram;
        }
        if ngram == self.last_ngram {
            self.fids.push(id);
            return Ok(None);
        }
        if ngram < self.last_ngram {
            return Err(IndexError::new(
                IndexErrorKind::Invariant,
                format!(
                    "merge went backwards, current ngram {:08x} < last ngram {:08x}",
                    ngram, self.last_ngram
                ),
            ));
        }
        let done = PostingList {
            seq: self.seq,
            ngram: self.last_ngram,
            ids: std::mem::take(&mut self.fids),
        };
        self.seq += 1;
        self.last_ngram = ngram;
        self.fids.push(id);
        Ok(Some(done))
    }

    /// Flush the group in progress once the tree runs dry.
    pub fn finish(mut self) -> Option<PostingList> {
        if self.fids.is_empty() {
            return None;
        }
        Some(PostingList {
            seq: self.seq,
            ngram: self.last_ngram,
            ids: std::mem::take(&mut self.fids),
        })
    }
}
