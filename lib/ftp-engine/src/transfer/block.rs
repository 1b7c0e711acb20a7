/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

const BLOCK_HEADER_LEN: usize = 3;

const DESCRIPTOR_EOR: u8 = 128;
const DESCRIPTOR_EOF: u8 = 64;
const DESCRIPTOR_SUSPECT: u8 = 32;
const DESCRIPTOR_RESTART: u8 = 16;

/// Strip the framing of a MODE B data stream.
///
/// Each block is a descriptor byte, a big endian byte count, then the data.
/// Restart marker blocks carry no file data and are dropped.
#[derive(Debug, Default)]
pub struct BlockModeDecoder {
    header: [u8; BLOCK_HEADER_LEN],
    header_len: usize,
    descriptor: u8,
    left: usize,
    end_of_file: bool,
    suspect: bool,
}

impl BlockModeDecoder {
    /// Whether the block carrying the EOF descriptor has been fully read.
    #[inline]
    pub fn end_of_file(&self) -> bool {
        self.end_of_file && self.left == 0
    }

    /// Whether any block was marked as suspect by the server.
    #[inline]
    pub fn suspect(&self) -> bool {
        self.suspect
    }

    /// Get ready for the next file on the same data connection.
    pub fn reset(&mut self) {
        *self = BlockModeDecoder::default();
    }

    /// Decode as much of `input` as belongs to the current file, appending the
    /// payload to `out`. Returns the number of bytes consumed, bytes after the
    /// end of the file are left to the caller.
    pub fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) -> usize {
        let mut offset = 0;
        while offset < input.len() && !self.end_of_file() {
            if self.left == 0 {
                let need = BLOCK_HEADER_LEN - self.header_len;
                let copy = need.min(input.len() - offset);
                self.header[self.header_len..self.header_len + copy]
                    .copy_from_slice(&input[offset..offset + copy]);
                self.header_len += copy;
                offset += copy;
                if self.header_len < BLOCK_HEADER_LEN {
                    break;
                }

                self.header_len = 0;
                self.descriptor = self.header[0];
                self.left = u16::from_be_bytes([self.header[1], self.header[2]]) as usize;
                if self.descriptor & DESCRIPTOR_SUSPECT != 0 {
                    self.suspect = true;
                }
                if self.descriptor & DESCRIPTOR_EOF != 0 {
                    self.end_of_file = true;
                }
                continue;
            }

            let copy = self.left.min(input.len() - offset);
            if self.descriptor & DESCRIPTOR_RESTART == 0 {
                out.extend_from_slice(&input[offset..offset + copy]);
            }
            self.left -= copy;
            offset += copy;
        }
        offset
    }

    /// Whether the last block ended a record.
    #[inline]
    pub fn end_of_record(&self) -> bool {
        self.descriptor & DESCRIPTOR_EOR != 0
    }
}
