// Copyright 2016 Vernon Jones.
// Original code Copyright 2011-2017 Carnegie Mellon University.
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Write as _;
use std::io::{self, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{FormatError, FMT_MAJOR, FMT_MINOR, MAGIC};

/// The `.bgi` file header. Format 2.0 is 28 bytes; 2.1 added the
/// hint_type byte for 29.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgiHeader {
    pub fmt_major: u8,
    pub fmt_minor: u8,
    pub n: u8,
    pub hint_type: u8,
    pub pfor_blocksize: u8,
    pub num_ngrams: u32,
    pub num_files: u32,
    pub fileid_map_offset: u64,
}

impl BgiHeader {
    pub fn new(n: u8) -> BgiHeader {
        BgiHeader {
            fmt_major: FMT_MAJOR,
            fmt_minor: FMT_MINOR,
            n,
            hint_type: 0,
            pfor_blocksize: 0,
            num_ngrams: 0,
            num_files: 0,
            fileid_map_offset: 0,
        }
    }

    pub fn has_hint_type(&self) -> bool {
        self.fmt_major >= 2 && self.fmt_minor >= 1
    }

    pub fn compressed(&self) -> bool {
        self.fmt_minor == 2
    }

    pub fn header_size(&self) -> u64 {
        if self.has_hint_type() {
            29
        } else {
            28
        }
    }

    /// Number of hint-table entries:
    ///
    /// type 0 trims the last byte of the ngram (N=3 -> 64K, N=4 -> 16M),
    /// type 1 trims the last nybble (N=3 -> 1M, N=4 -> 256M),
    /// type 2 uses the whole ngram (N=3 -> 16M, N=4 -> 4G).
    pub fn num_hints(&self) -> u64 {
        1u64 << (8 * u32::from(self.n) - 4 * (2 - u32::from(self.hint_type)))
    }

    pub fn hints_size(&self) -> u64 {
        8 * self.num_hints()
    }

    /// Low bits of an ngram not covered by its hint prefix: 0xFF, 0x0F or
    /// 0x00 for types 0, 1, 2. The query engine skips `ngram & mask`
    /// postings forward from the hinted offset.
    pub fn hint_type_mask(&self) -> u32 {
        0xff >> (4 * u32::from(self.hint_type))
    }

    pub fn ngram_to_hint(&self, ngram: u32) -> u64 {
        u64::from(ngram) >> (4 * (2 - u32::from(self.hint_type)))
    }

    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(MAGIC)?;
        out.write_u8(self.fmt_major)?;
        out.write_u8(self.fmt_minor)?;
        out.write_u8(self.n)?;
        if self.has_hint_type() {
            out.write_u8(self.hint_type)?;
        }
        out.write_u8(self.pfor_blocksize)?;
        out.write_u32::<LittleEndian>(self.num_ngrams)?;
        out.write_u32::<LittleEndian>(self.num_files)?;
        out.write_u64::<LittleEndian>(self.fileid_map_offset)?;
        Ok(())
    }

    /// Parse a header from the front of a mapped index file.
    pub fn read(data: &[u8]) -> Result<BgiHeader, FormatError> {
        if data.len() < 28 {
            return Err(FormatError::Truncated);
        }
        if &data[..8] != MAGIC {
            return Err(FormatError::BadMagic);
        }
        let mut hdr = BgiHeader::new(0);
        hdr.fmt_major = data[8];
        hdr.fmt_minor = data[9];
        hdr.n = data[10];
        if hdr.fmt_major != FMT_MAJOR || hdr.fmt_minor > 2 {
            return Err(FormatError::UnsupportedVersion {
                major: hdr.fmt_major,
                minor: hdr.fmt_minor,
            });
        }
        let mut rest = if hdr.has_hint_type() {
            hdr.hint_type = data[11];
            &data[12..]
        } else {
            &data[11..]
        };
        if hdr.n < 3 || hdr.n > 4 {
            return Err(FormatError::BadNgramSize(hdr.n));
        }
        if hdr.hint_type > 2 {
            return Err(FormatError::BadHintType(hdr.hint_type));
        }
        if rest.len() < 17 {
            return Err(FormatError::Truncated);
        }
        hdr.pfor_blocksize = rest.read_u8().expect("length checked");
        hdr.num_ngrams = rest.read_u32::<LittleEndian>().expect("length checked");
        hdr.num_files = rest.read_u32::<LittleEndian>().expect("length checked");
        hdr.fileid_map_offset = rest.read_u64::<LittleEndian>().expect("length checked");
        Ok(hdr)
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "BGI Header:");
        let _ = writeln!(out, "  magic == {}", String::from_utf8_lossy(&MAGIC[..7]));
        let _ = writeln!(out, "  fmt_major == {}", self.fmt_major);
        let _ = writeln!(out, "  fmt_minor == {}", self.fmt_minor);
        let _ = writeln!(out, "  N == {}", self.n);
        let _ = writeln!(out, "    hint_type == {}", self.hint_type);
        let _ = writeln!(out, "    num_hints == {}", self.num_hints());
        let _ = writeln!(out, "    hints size == {}", self.hints_size());
        let _ = writeln!(out, "  pfor_blocksize == {}", self.pfor_blocksize);
        let _ = writeln!(out, "  num_ngrams == {}", self.num_ngrams);
        let _ = writeln!(out, "  num_files == {}", self.num_files);
        let _ = writeln!(out, "  fileid_map_offset == 0x{:x}", self.fileid_map_offset);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut hdr = BgiHeader::new(3);
        hdr.hint_type = 1;
        hdr.pfor_blocksize = 32;
        hdr.num_ngrams = 12345;
        hdr.num_files = 678;
        hdr.fileid_map_offset = 0xdead_beef;
        let mut buf = Vec::new();
        hdr.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, hdr.header_size());
        assert_eq!(BgiHeader::read(&buf).unwrap(), hdr);
    }

    #[test]
    fn layout_is_fixed() {
        let mut hdr = BgiHeader::new(4);
        hdr.pfor_blocksize = 32;
        hdr.num_ngrams = 2;
        hdr.num_files = 1;
        hdr.fileid_map_offset = 0x0102_0304_0506_0708;
        let mut buf = Vec::new();
        hdr.write(&mut buf).unwrap();
        assert_eq!(&buf[..8], b"BIGGREP\n");
        assert_eq!(buf[8..13], [2, 1, 4, 0, 32]);
        assert_eq!(buf[13..17], [2, 0, 0, 0]);
        assert_eq!(buf[17..21], [1, 0, 0, 0]);
        assert_eq!(buf[21..29], [8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn version_2_0_has_no_hint_byte() {
        let mut hdr = BgiHeader::new(3);
        hdr.fmt_minor = 0;
        let mut buf = Vec::new();
        hdr.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 28);
        let back = BgiHeader::read(&buf).unwrap();
        assert_eq!(back.hint_type, 0);
        assert_eq!(back, hdr);
    }

    #[test]
    fn hint_arithmetic() {
        let mut hdr = BgiHeader::new(3);
        assert_eq!(hdr.num_hints(), 1 << 16);
        assert_eq!(hdr.hint_type_mask(), 0xff);
        assert_eq!(hdr.ngram_to_hint(0x00aa_bbcc), 0xaabb);

        hdr.hint_type = 1;
        assert_eq!(hdr.num_hints(), 1 << 20);
        assert_eq!(hdr.hint_type_mask(), 0x0f);
        assert_eq!(hdr.ngram_to_hint(0x00aa_bbcc), 0xaabbc);

        hdr.hint_type = 2;
        assert_eq!(hdr.num_hints(), 1 << 24);
        assert_eq!(hdr.hint_type_mask(), 0x00);
        assert_eq!(hdr.ngram_to_hint(0x00aa_bbcc), 0xaabbcc);

        let mut hdr = BgiHeader::new(4);
        assert_eq!(hdr.num_hints(), 1 << 24);
        hdr.hint_type = 2;
        assert_eq!(hdr.num_hints(), 1u64 << 32);
    }

    #[test]
    fn bad_headers_are_rejected() {
        assert!(matches!(BgiHeader::read(b"nope"), Err(FormatError::Truncated)));
        let mut buf = vec![0u8; 29];
        buf[..8].copy_from_slice(b"NOTANIDX");
        assert!(matches!(BgiHeader::read(&buf), Err(FormatError::BadMagic)));

        let mut hdr = BgiHeader::new(5);
        hdr.num_ngrams = 1;
        let mut buf = Vec::new();
        hdr.write(&mut buf).unwrap();
        assert!(matches!(BgiHeader::read(&buf), Err(FormatError::BadNgramSize(5))));
    }
}
