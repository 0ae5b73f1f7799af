// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Search patterns arrive as ascii hex on the command line.

use crate::{QueryError, QueryResult};

/// Convert one hex pattern to raw bytes. Odd-length or non-hex input is
/// a pattern error, not a crash.
pub fn pattern_from_hex(s: &str) -> QueryResult<Vec<u8>> {
    hex::decode(s).map_err(|e| {
        QueryError::Pattern(format!("bad hex search string '{}': {}", s, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hex() {
        assert_eq!(pattern_from_hex("424344").unwrap(), vec![0x42, 0x43, 0x44]);
        assert_eq!(pattern_from_hex("DEADbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn rejects_odd_and_junk() {
        assert!(matches!(pattern_from_hex("abc"), Err(QueryError::Pattern(_))));
        assert!(matches!(pattern_from_hex("zz"), Err(QueryError::Pattern(_))));
    }
}
