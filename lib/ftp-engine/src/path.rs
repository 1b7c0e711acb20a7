/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use crate::FtpTypeCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpPathStatus {
    /// Nothing parsed yet.
    Null,
    Directory,
    /// The last segment, which is expected to be a file.
    File,
    /// All segments have been walked through.
    End,
}

/// Walks a slash separated remote path one segment at a time.
#[derive(Debug)]
pub struct FtpPathResolver {
    path: String,
    segment_start: usize,
    next_segment: Option<usize>,
    status: FtpPathStatus,
}

impl Default for FtpPathResolver {
    fn default() -> Self {
        FtpPathResolver::new("")
    }
}

impl FtpPathResolver {
    pub fn new(path: &str) -> Self {
        FtpPathResolver {
            path: path.to_string(),
            segment_start: 0,
            next_segment: None,
            status: FtpPathStatus::Null,
        }
    }

    /// Replace the path and reset the walk.
    pub fn set_path(&mut self, path: &str) {
        self.path.clear();
        self.path.push_str(path);
        self.reset();
    }

    pub fn reset(&mut self) {
        self.segment_start = 0;
        self.next_segment = None;
        self.status = FtpPathStatus::Null;
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn status(&self) -> FtpPathStatus {
        self.status
    }

    #[inline]
    pub fn set_status(&mut self, status: FtpPathStatus) {
        self.status = status;
    }

    /// Move to the next segment.
    ///
    /// Returns false once the walk is over, which is either at the end of the
    /// path, or at the last segment if the caller asked for a plain file
    /// transfer and no directory probing is needed.
    pub fn parse_path(&mut self, typecode: FtpTypeCode) -> bool {
        let next = match self.next_segment {
            Some(n) => n,
            None => {
                self.status = FtpPathStatus::Directory;
                0
            }
        };

        if next < self.path.len() {
            self.segment_start = next;
            match memchr::memchr(b'/', &self.path.as_bytes()[next..]) {
                Some(p) => self.next_segment = Some(next + p + 1),
                None => {
                    self.next_segment = Some(self.path.len());
                    self.status = FtpPathStatus::File;
                    if typecode.is_file_type() {
                        return false;
                    }
                }
            }
        } else {
            self.segment_start = next;
            self.next_segment = Some(next);
            self.status = FtpPathStatus::End;
        }

        self.status != FtpPathStatus::End
    }

    /// Continue the walk from a byte offset into the path, as if all the
    /// segments before it had already been entered.
    pub fn resume_at(&mut self, offset: usize, typecode: FtpTypeCode) -> bool {
        self.next_segment = Some(offset.min(self.path.len()));
        self.status = FtpPathStatus::Directory;
        self.parse_path(typecode)
    }

    /// The current segment, without the trailing slash.
    pub fn segment(&self) -> &str {
        let end = self.next_segment.unwrap_or(self.segment_start);
        let segment = &self.path[self.segment_start..end];
        segment.strip_suffix('/').unwrap_or(segment)
    }

    /// Everything from the current segment to the end of the path.
    pub fn remaining(&self) -> &str {
        &self.path[self.segment_start..]
    }

    /// Whether the whole path addresses a directory.
    pub fn is_directory_path(&self) -> bool {
        self.path.is_empty() || self.path.ends_with('/')
    }
}
