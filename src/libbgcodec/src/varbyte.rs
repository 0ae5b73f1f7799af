// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Variable-length unsigned integer encoding.
//!
//! Values are split into 7-bit groups and written most-significant group
//! first. Every byte but the last has its high bit clear; the terminating
//! byte has the high bit set. Zero therefore encodes to the single byte
//! 0x80, and a lone 0x80 in a posting stream reads back as "size zero".

use crate::{CodecError, CodecResult};

/// Longest encoding of a u64: ceil(64 / 7) groups.
const MAX_ENCODED_LEN: usize = 10;

/// Append the encoding of `v` to `out`, returning the number of bytes added.
pub fn encode_into(out: &mut Vec<u8>, v: u64) -> usize {
    let mut groups = [0u8; MAX_ENCODED_LEN];
    let mut n = 0;
    let mut v = v;
    loop {
        groups[n] = (v & 0x7f) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    // groups were collected least-significant first
    for i in (1..n).rev() {
        out.push(groups[i]);
    }
    out.push(groups[0] | 0x80);
    n
}

pub fn encode(v: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_ENCODED_LEN);
    encode_into(&mut out, v);
    out
}

/// Decode one value from the front of `b`, returning it along with the
/// number of bytes consumed.
pub fn decode(b: &[u8]) -> CodecResult<(u64, usize)> {
    let mut x: u64 = 0;
    for (i, &byte) in b.iter().enumerate() {
        if i >= MAX_ENCODED_LEN {
            return Err(CodecError::Overlong);
        }
        x = (x << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 != 0 {
            return Ok((x, i + 1));
        }
    }
    Err(CodecError::TruncatedInput)
}

/// Decode one value known to fit in 32 bits (posting sizes, file ids).
pub fn decode_u32(b: &[u8]) -> CodecResult<(u32, usize)> {
    let (v, n) = decode(b)?;
    if v > u64::from(u32::MAX) {
        return Err(CodecError::Overlong);
    }
    Ok((v as u32, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_a_single_terminator() {
        assert_eq!(encode(0), vec![0x80]);
        assert_eq!(decode(&[0x80]).unwrap(), (0, 1));
    }

    #[test]
    fn small_values() {
        assert_eq!(encode(1), vec![0x81]);
        assert_eq!(encode(127), vec![0xff]);
        assert_eq!(encode(128), vec![0x01, 0x80]);
        assert_eq!(encode(300), vec![0x02, 0xac]);
    }

    #[test]
    fn round_trips() {
        for v in [
            0u64,
            1,
            2,
            (1 << 7) - 1,
            1 << 7,
            (1 << 14) - 1,
            1 << 14,
            (1 << 32) - 1,
            u64::MAX,
        ] {
            let enc = encode(v);
            assert_eq!(decode(&enc).unwrap(), (v, enc.len()), "value {}", v);
        }
    }

    #[test]
    fn decode_leaves_trailing_bytes_alone() {
        let mut buf = encode(1234);
        let len = buf.len();
        buf.extend_from_slice(&[0xde, 0xad]);
        assert_eq!(decode(&buf).unwrap(), (1234, len));
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert_eq!(decode(&[]), Err(CodecError::TruncatedInput));
        // continuation byte with nothing after it
        assert_eq!(decode(&[0x01]), Err(CodecError::TruncatedInput));
    }

    #[test]
    fn overlong_input_is_an_error() {
        let b = [0x7f; 11];
        assert_eq!(decode(&b), Err(CodecError::Overlong));
    }
}
