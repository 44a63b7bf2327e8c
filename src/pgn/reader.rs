//! Chunked file reading with boundary-safe game splitting.
//!
//! PGN files are read in large fixed blocks, so a game record may straddle a
//! block boundary. The reader works in two phases on owned buffers: the tail
//! carried over from the previous read is prepended to the next block
//! (append-carry), then everything after the last unambiguous game start is
//! moved back into the carry buffer (split-and-carry). Each emitted unit
//! therefore contains only complete games, except for the final end-of-file
//! flush which may be malformed and is left to fail downstream.

use std::io::{self, Read};

use crate::error::Result;

pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024 * 1024;

const CARRY_CAPACITY: usize = 16 * 1024;

pub struct BlockReader<R> {
    source: R,
    block_size: usize,
    carry: Vec<u8>,
    eof: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(source: R) -> BlockReader<R> {
        BlockReader::with_block_size(source, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(source: R, block_size: usize) -> BlockReader<R> {
        assert!(block_size > 0);
        BlockReader {
            source,
            block_size,
            carry: Vec::with_capacity(CARRY_CAPACITY),
            eof: false,
        }
    }

    /// Returns the next boundary-safe unit, or `None` once the source is
    /// exhausted. A game larger than the block size grows the carry buffer
    /// across reads rather than being truncated.
    pub fn next_unit(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if self.eof {
                if self.carry.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.carry)));
            }

            let mut buf = std::mem::take(&mut self.carry);
            let start = buf.len();
            buf.resize(start + self.block_size, 0);
            let n = read_full(&mut self.source, &mut buf[start..])?;
            buf.truncate(start + n);
            if n < self.block_size {
                self.eof = true;
            }

            match last_game_start(&buf) {
                Some(pos) if pos > 0 => {
                    self.carry = buf.split_off(pos);
                    return Ok(Some(buf));
                }
                // No boundary past the front: the whole stitched buffer is
                // still the unterminated tail of one game, keep growing.
                _ => self.carry = buf,
            }
        }
    }
}

fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match source.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(m) => n += m,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

/// Offset of the last unambiguous game start: a `[` opening a line that
/// follows a blank line (or the start of the buffer).
fn last_game_start(buf: &[u8]) -> Option<usize> {
    let mut i = buf.len();
    while i > 0 {
        i -= 1;
        if buf[i] == b'[' && is_game_start(buf, i) {
            return Some(i);
        }
    }
    None
}

fn is_game_start(buf: &[u8], i: usize) -> bool {
    if i == 0 {
        return true;
    }
    if buf[i - 1] != b'\n' {
        return false;
    }
    let mut j = i - 1;
    if j == 0 {
        return true;
    }
    j -= 1;
    if buf[j] == b'\r' {
        if j == 0 {
            return true;
        }
        j -= 1;
    }
    buf[j] == b'\n'
}
