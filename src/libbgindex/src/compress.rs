// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Posting-list compression.
//!
//! The id list arrives sorted and strictly increasing. It leaves as:
//! VarByte(first id), then the remaining ids in delta form, either as
//! concatenated PFOR blocks (the last one zero-padded up to the
//! blocksize) or, when a block cannot meet the PFOR width/exception
//! bounds, one VarByte per delta for the whole tail. PFOR is
//! all-or-nothing per posting; mixing codecs inside one list would cost
//! a per-block flag the common case never needs.

use log::debug;

use libbgcodec::{to_deltas, varbyte, CodecError, Pfor};

use crate::error::{IndexError, IndexErrorKind, IndexResult};

/// One merged posting group, in ascending-ngram emit order. `seq` is the
/// merge-order sequence number the writer sorts on.
#[derive(Debug)]
pub struct PostingList {
    pub seq: u64,
    pub ngram: u32,
    pub ids: Vec<u32>,
}

/// A compressed posting on its way to the writer.
#[derive(Debug)]
pub struct CompressedPosting {
    pub seq: u64,
    pub ngram: u32,
    pub bytes: Vec<u8>,
    pub uncompressed_size: u64,
    pub pfor: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    pfor: Pfor,
    /// Minimum number of deltas before PFOR is worth attempting.
    threshold: usize,
}

impl Compressor {
    pub fn new(blocksize: u32, max_exceptions: u32, threshold: usize) -> Compressor {
        Compressor {
            pfor: Pfor::new(blocksize, max_exceptions),
            threshold,
        }
    }

    pub fn compress(&self, posting: PostingList) -> IndexResult<CompressedPosting> {
        let PostingList { seq, ngram, mut ids } = posting;
        if ids.is_empty() {
            return Err(IndexError::new(
                IndexErrorKind::Invariant,
                format!("ngram {:08x} arrived with zero file ids", ngram),
            ));
        }
        let num_ids = ids.len();
        let uncompressed_size = 4 * num_ids as u64;
        to_deltas(&mut ids, 0);

        let mut bytes = Vec::with_capacity(num_ids * 2);
        varbyte::encode_into(&mut bytes, u64::from(ids[0]));
        let prefix_len = bytes.len();

        let blocksize = self.pfor.blocksize();
        let mut pfor_encoded = false;
        if num_ids - 1 >= self.threshold {
            // pad the tail out to whole blocks with zero deltas; they are
            // stripped again on decode
            if (num_ids - 1) % blocksize != 0 {
                let pads = blocksize - (num_ids - 1) % blocksize;
                ids.resize(num_ids + pads, 0);
            }
            pfor_encoded = true;
            for block in ids[1..].chunks(blocksize) {
                match self.pfor.encode(block) {
                    Ok(enc) => bytes.extend_from_slice(&enc),
                    Err(CodecError::WidthOverflow) => {
                        debug!(
                            "ngram {:08x} block failed PFOR encoding, falling back to VarByte",
                            ngram
                        );
                        bytes.truncate(prefix_len);
                        pfor_encoded = false;
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if !pfor_encoded {
            // the slice bound leaves any block padding behind
            for &delta in &ids[1..num_ids] {
                varbyte::encode_into(&mut bytes, u64::from(delta));
            }
        }

        Ok(CompressedPosting {
            seq,
            ngram,
            bytes,
            uncompressed_size,
            pfor: pfor_encoded,
        })
    }
}
