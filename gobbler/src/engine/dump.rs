// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Hex dumps of frames for the operator console.

use std::io::{self, Write};

const OCTETS_PER_LINE: usize = 16;

/// Write the first `limit` bytes of `bytes` (all of them if there are fewer) as lines of 16
/// hex octets, each line led by its offset.
///
/// # Errors
///
/// Fails if `out` fails.
pub fn hex_dump<W: Write>(out: &mut W, bytes: &[u8], limit: usize) -> io::Result<()> {
    let len = limit.min(bytes.len());
    write!(out, "{:05x} ", 0)?;
    for (k, byte) in bytes[..len].iter().enumerate() {
        write!(out, "{byte:02x} ")?;
        if (k + 1) % OCTETS_PER_LINE == 0 {
            write!(out, "\n{:05x} ", k + 1)?;
        }
    }
    writeln!(out)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dump(bytes: &[u8], limit: usize) -> String {
        let mut out = Vec::new();
        hex_dump(&mut out, bytes, limit).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn short_dump() {
        assert_eq!(dump(&[0xde, 0xad, 0x01], 16), "00000 de ad 01 \n");
    }

    #[test]
    fn lines_of_sixteen() {
        let bytes: Vec<u8> = (0..20).collect();
        assert_eq!(
            dump(&bytes, usize::MAX),
            "00000 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f \n00010 10 11 12 13 \n"
        );
    }

    #[test]
    fn dump_stops_at_limit() {
        let bytes: Vec<u8> = (0..20).collect();
        assert_eq!(dump(&bytes, 2), "00000 00 01 \n");
        assert_eq!(dump(&[], 8), "00000 \n");
    }
}
