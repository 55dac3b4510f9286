//! Frame extractor: turns a byte stream into a sequence of complete
//! top-level JSON objects.
//!
//! Ported from the original `JSONReader`, but the escape-tracking state
//! (the run length of backslashes immediately preceding the current byte)
//! is a field on `FrameReader` rather than something recomputed by walking
//! backward through the current chunk. The original's walk-back can't see
//! across a chunk boundary and so can misclassify a quote whose preceding
//! backslashes span a read; carrying the run length across `feed()` calls
//! fixes that outright.

use crate::errors::RelayError;

/// No single frame may exceed this many bytes.
pub const MAX_FRAME_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Scanning,
}

pub struct FrameReader {
    buf: Vec<u8>,
    mode: Mode,
    open_braces: i64,
    in_string: bool,
    /// Count of consecutive backslashes immediately before the byte about
    /// to be processed, carried across `feed()` calls.
    backslash_run: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            mode: Mode::Idle,
            open_braces: 0,
            in_string: false,
            backslash_run: 0,
        }
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.mode = Mode::Idle;
        self.open_braces = 0;
        self.in_string = false;
        self.backslash_run = 0;
    }

    /// Feed the next chunk of bytes read off the socket. Returns every
    /// object that completed during this call, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, RelayError> {
        if self.buf.len() > MAX_FRAME_BYTES {
            self.reset();
            return Err(RelayError::FrameTooLong { max: MAX_FRAME_BYTES });
        }

        let mut done = Vec::new();

        for (offset, &byte) in chunk.iter().enumerate() {
            match self.mode {
                Mode::Idle => {
                    if byte.is_ascii_whitespace() {
                        continue;
                    }
                    if byte == b'{' {
                        self.buf.push(byte);
                        self.open_braces = 1;
                        self.mode = Mode::Scanning;
                        self.in_string = false;
                        self.backslash_run = 0;
                    } else {
                        self.reset();
                        return Err(RelayError::FrameCorrupted { offset });
                    }
                }
                Mode::Scanning => {
                    self.buf.push(byte);

                    if byte == b'"' {
                        if !self.in_string {
                            self.in_string = true;
                        } else if self.backslash_run % 2 == 0 {
                            self.in_string = false;
                        }
                        self.backslash_run = 0;
                    } else if byte == b'\\' {
                        self.backslash_run += 1;
                    } else {
                        self.backslash_run = 0;
                        if !self.in_string {
                            if byte == b'{' {
                                self.open_braces += 1;
                            } else if byte == b'}' {
                                self.open_braces -= 1;
                            }
                        }
                    }

                    if self.open_braces == 0 {
                        done.push(std::mem::take(&mut self.buf));
                        self.reset();
                    }
                }
            }
        }

        Ok(done)
    }
}
