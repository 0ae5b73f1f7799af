// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Patched Frame Of Reference encoding over fixed blocks of u32 values.
//!
//! A block of `blocksize` values is packed at a common bit width `b`,
//! chosen as the smallest width in 1..=15 that leaves at most
//! `max_exceptions` wider values. The wide values ("exceptions") are
//! written as zeros in the packed payload and patched back in from a
//! VarByte-encoded (index, value) tail. The encoded block is:
//!
//! ```text
//! [high nybble: exception count][low nybble: b]
//! [ceil(blocksize * b / 8) bytes of packed payload]
//! [VarByte index, VarByte value] per exception, ascending index
//! ```
//!
//! A b nybble of zero is the special flag for "b would be 1 and every
//! non-exception value is exactly 1": the payload is omitted entirely.
//! Delta lists over dense posting runs hit that case constantly, which is
//! where most of the savings come from.
//!
//! Bits are laid down little-endian: value i occupies bits
//! [b*i, b*(i+1)) of the payload, least significant bit first.

use crate::{varbyte, CodecError, CodecResult};

pub const DEFAULT_BLOCKSIZE: u32 = 32;
pub const DEFAULT_MAX_EXCEPTIONS: u32 = 3;

/// Widest packable value; wider ones must be exceptions.
const MAX_B: u32 = 15;

/// Bits needed to store `v`: 1 + floor(log2 v), or 0 for v == 0.
#[inline]
fn width(v: u32) -> u32 {
    32 - v.leading_zeros()
}

#[derive(Debug, Clone, Copy)]
pub struct Pfor {
    blocksize: usize,
    max_exceptions: u32,
}

impl Default for Pfor {
    fn default() -> Pfor {
        Pfor::new(DEFAULT_BLOCKSIZE, DEFAULT_MAX_EXCEPTIONS)
    }
}

impl Pfor {
    /// The exception count has to fit the header nybble, so anything above
    /// 15 is clamped down to it.
    pub fn new(blocksize: u32, max_exceptions: u32) -> Pfor {
        Pfor {
            blocksize: blocksize as usize,
            max_exceptions: max_exceptions.min(15),
        }
    }

    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    fn payload_len(&self, b: u32) -> usize {
        (self.blocksize * b as usize + 7) / 8
    }

    pub fn encode(&self, vals: &[u32]) -> CodecResult<Vec<u8>> {
        if vals.len() != self.blocksize {
            return Err(CodecError::BlockSizeMismatch {
                expected: self.blocksize,
                got: vals.len(),
            });
        }

        // histogram of required widths, then walk it to find the smallest
        // b that leaves at most max_exceptions wider values
        let mut counts = [0usize; 33];
        for &v in vals {
            counts[width(v) as usize] += 1;
        }
        let mut wider = self.blocksize - counts[0];
        let mut b = 0;
        for cand in 1..=MAX_B {
            wider -= counts[cand as usize];
            if wider <= self.max_exceptions as usize {
                b = cand;
                break;
            }
        }
        if b == 0 {
            return Err(CodecError::WidthOverflow);
        }
        let exceptions = wider;

        let special = b == 1 && vals.iter().all(|&v| v == 1 || width(v) > 1);

        let mut out = Vec::with_capacity(1 + self.payload_len(b));
        out.push(((exceptions as u8) << 4) | if special { 0 } else { b as u8 });

        if !special {
            // pack with 3 bytes of slack so the last value can be OR'd in
            // whole, then cut back to the real payload length
            let plen = self.payload_len(b);
            let mut payload = vec![0u8; plen + 3];
            for (i, &v) in vals.iter().enumerate() {
                let v = if width(v) > b { 0 } else { v };
                let off = b as usize * i;
                let w = v << (off % 8);
                payload[off / 8] |= w as u8;
                payload[off / 8 + 1] |= (w >> 8) as u8;
                payload[off / 8 + 2] |= (w >> 16) as u8;
            }
            payload.truncate(plen);
            out.extend_from_slice(&payload);
        }

        if exceptions > 0 {
            for (i, &v) in vals.iter().enumerate() {
                if width(v) > b {
                    varbyte::encode_into(&mut out, i as u64);
                    varbyte::encode_into(&mut out, u64::from(v));
                }
            }
        }

        Ok(out)
    }

    /// Decode one block from the front of `data`, returning the values and
    /// the number of input bytes consumed.
    pub fn decode(&self, data: &[u8]) -> CodecResult<(Vec<u32>, usize)> {
        let header = *data.first().ok_or(CodecError::TruncatedInput)?;
        let exceptions = header >> 4;
        let b = u32::from(header & 0x0f);
        let special = b == 0;

        let mut out = vec![if special { 1u32 } else { 0 }; self.blocksize];
        let mut pos = 1;

        if !special {
            let plen = self.payload_len(b);
            if data.len() < 1 + plen {
                return Err(CodecError::TruncatedInput);
            }
            let payload = &data[1..1 + plen];
            let mask = (1u32 << b) - 1;
            for (i, slot) in out.iter_mut().enumerate() {
                let off = b as usize * i;
                let mut w = 0u32;
                for k in 0..3 {
                    if let Some(&byte) = payload.get(off / 8 + k) {
                        w |= u32::from(byte) << (8 * k);
                    }
                }
                *slot = (w >> (off % 8)) & mask;
            }
            pos += plen;
        }

        for _ in 0..exceptions {
            let (idx, n) = varbyte::decode(&data[pos..])?;
            pos += n;
            let (val, n) = varbyte::decode_u32(&data[pos..])?;
            pos += n;
            let slot = out
                .get_mut(idx as usize)
                .ok_or(CodecError::BadExceptionIndex {
                    index: idx,
                    blocksize: self.blocksize,
                })?;
            *slot = val;
        }

        Ok((out, pos))
    }
}

/// In-place conversion of a sorted list to first-value-plus-differences
/// form. `start` is subtracted from the first element for lists that
/// continue an earlier run.
pub fn to_deltas(vals: &mut [u32], start: u32) {
    for i in (1..vals.len()).rev() {
        vals[i] -= vals[i - 1];
    }
    if let Some(first) = vals.first_mut() {
        *first -= start;
    }
}

/// Inverse of [`to_deltas`].
pub fn from_deltas(vals: &mut [u32], start: u32) {
    if let Some(first) = vals.first_mut() {
        *first += start;
    }
    for i in 1..vals.len() {
        vals[i] += vals[i - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(vals: &[u32], len: usize) -> Vec<u32> {
        let mut v = vals.to_vec();
        v.resize(len, 1);
        v
    }

    #[test]
    fn all_ones_is_one_header_byte() {
        let pfor = Pfor::new(16, 1);
        let vals = vec![1u32; 16];
        let enc = pfor.encode(&vals).unwrap();
        assert_eq!(enc, vec![0x00]);
        assert_eq!(pfor.decode(&enc).unwrap(), (vals, 1));
    }

    #[test]
    fn special_block_with_one_exception() {
        let pfor = Pfor::new(16, 1);
        let mut vals = vec![1u32; 16];
        vals[11] = 1024;
        let enc = pfor.encode(&vals).unwrap();
        // header says one exception, special flag; no payload, then the
        // VarByte'd index/value pair
        assert_eq!(enc[0], 0x10);
        assert_eq!(&enc[1..], &[0x8b, 0x08, 0x80][..]);
        assert_eq!(pfor.decode(&enc).unwrap(), (vals, enc.len()));
    }

    #[test]
    fn two_wide_values_widen_b_instead() {
        let pfor = Pfor::new(16, 1);
        let mut vals = vec![1u32; 16];
        vals[4] = 1000;
        vals[11] = 1000;
        let enc = pfor.encode(&vals).unwrap();
        // both at width 10 > one allowed exception, so b widens to 10
        assert_eq!(enc[0], 0x0a);
        assert_eq!(pfor.decode(&enc).unwrap(), (vals, enc.len()));
    }

    #[test]
    fn mixed_block_with_zero_padding() {
        let pfor = Pfor::new(16, 1);
        let vals = vec![1, 1, 1, 30, 32, 1, 1, 1, 1, 1, 1, 1000, 0, 0, 0, 0];
        let enc = pfor.encode(&vals).unwrap();
        assert_eq!(enc[0], (1 << 4) | 6);
        assert_eq!(pfor.decode(&enc).unwrap(), (vals, enc.len()));
    }

    #[test]
    fn all_zero_block_round_trips() {
        let pfor = Pfor::new(32, 3);
        let vals = vec![0u32; 32];
        let enc = pfor.encode(&vals).unwrap();
        assert_eq!(pfor.decode(&enc).unwrap(), (vals, enc.len()));
    }

    #[test]
    fn width_overflow_when_too_many_wide_values() {
        let pfor = Pfor::new(16, 1);
        let vals = block(&[1 << 17, 1 << 17, 1 << 17], 16);
        assert_eq!(pfor.encode(&vals), Err(CodecError::WidthOverflow));
    }

    #[test]
    fn wrong_block_length_is_rejected() {
        let pfor = Pfor::new(16, 1);
        assert_eq!(
            pfor.encode(&[1, 2, 3]),
            Err(CodecError::BlockSizeMismatch { expected: 16, got: 3 })
        );
    }

    #[test]
    fn consecutive_blocks_decode_by_offset() {
        let pfor = Pfor::new(16, 2);
        let b1 = block(&[100, 83, 12, 1, 0, 60, 70], 16);
        let b2 = vec![1u32; 16];
        let b3 = block(&[32, 31, 33], 16);
        let mut enc = pfor.encode(&b1).unwrap();
        enc.extend(pfor.encode(&b2).unwrap());
        enc.extend(pfor.encode(&b3).unwrap());

        let (d1, n1) = pfor.decode(&enc).unwrap();
        let (d2, n2) = pfor.decode(&enc[n1..]).unwrap();
        let (d3, n3) = pfor.decode(&enc[n1 + n2..]).unwrap();
        assert_eq!((d1, d2, d3), (b1, b2, b3));
        assert_eq!(n1 + n2 + n3, enc.len());
    }

    #[test]
    fn larger_blocksizes_round_trip() {
        let pfor = Pfor::new(64, 6);
        let vals: Vec<u32> = (0..64).map(|i| (i * 37) % 4096).collect();
        let enc = pfor.encode(&vals).unwrap();
        assert_eq!(pfor.decode(&enc).unwrap(), (vals, enc.len()));
    }

    #[test]
    fn delta_round_trip() {
        let orig = vec![2u32, 5, 6, 9, 40];
        let mut vals = orig.clone();
        to_deltas(&mut vals, 0);
        assert_eq!(vals, vec![2, 3, 1, 3, 31]);
        from_deltas(&mut vals, 0);
        assert_eq!(vals, orig);

        let mut vals = orig.clone();
        to_deltas(&mut vals, 2);
        assert_eq!(vals[0], 0);
        from_deltas(&mut vals, 2);
        assert_eq!(vals, orig);
    }

    #[test]
    fn truncated_block_is_an_error() {
        let pfor = Pfor::new(16, 1);
        let vals = block(&[100, 83, 12], 16);
        let enc = pfor.encode(&vals).unwrap();
        assert_eq!(pfor.decode(&enc[..3]), Err(CodecError::TruncatedInput));
        assert_eq!(pfor.decode(&[]), Err(CodecError::TruncatedInput));
    }

    // xorshift so the "random" vectors are the same on every run
    struct Rng(u64);
    impl Rng {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }
    }

    #[test]
    fn pseudo_random_vectors_round_trip() {
        let mut rng = Rng(0x9e3779b97f4a7c15);
        for (blocksize, max_exceptions) in [(16u32, 2u32), (32, 3), (64, 6)] {
            let pfor = Pfor::new(blocksize, max_exceptions);
            for round in 0..200 {
                // bound values so b <= 14 always suffices
                let bound = 1 + (rng.next() % 16384) as u32;
                let mut vals: Vec<u32> = (0..blocksize)
                    .map(|_| (rng.next() as u32) % bound)
                    .collect();
                if round % 2 == 0 {
                    vals.sort_unstable();
                    if round % 4 == 0 {
                        to_deltas(&mut vals, 0);
                    }
                }
                let enc = pfor.encode(&vals).unwrap();
                assert_eq!(
                    pfor.decode(&enc).unwrap(),
                    (vals, enc.len()),
                    "blocksize {} round {}",
                    blocksize,
                    round
                );
            }
        }
    }
}
