/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicU64, Ordering};

use crate::FtpRemoteFacts;

pub const FTP_ANONYMOUS_USER: &str = "anonymous";

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FtpTypeCode {
    /// Let the engine decide, binary for files and a listing for directories.
    #[default]
    Auto,
    Ascii,
    Image,
    Directory,
}

impl FtpTypeCode {
    /// Whether the caller asked for a plain file transfer with an explicit type.
    #[inline]
    pub(crate) fn is_file_type(&self) -> bool {
        matches!(self, FtpTypeCode::Ascii | FtpTypeCode::Image)
    }
}

/// A single logical transfer.
///
/// The path is the URL path after the host with the leading slash removed, and
/// may still carry percent escapes. A trailing slash marks a directory.
#[derive(Debug)]
pub struct FtpRequest {
    id: u64,
    path: String,
    typecode: FtpTypeCode,
    username: Option<String>,
    password: Option<String>,
    resume_offset: u64,
    use_resume: bool,
    mdtm_record: Option<String>,
    facts: FtpRemoteFacts,
}

impl FtpRequest {
    pub fn new(path: &str) -> Self {
        FtpRequest {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            path: path.to_string(),
            typecode: FtpTypeCode::Auto,
            username: None,
            password: None,
            resume_offset: 0,
            use_resume: false,
            mdtm_record: None,
            facts: FtpRemoteFacts::default(),
        }
    }

    pub fn with_typecode(mut self, typecode: FtpTypeCode) -> Self {
        self.typecode = typecode;
        self
    }

    pub fn with_user(mut self, username: &str, password: Option<&str>) -> Self {
        self.username = Some(username.to_string());
        self.password = password.map(|s| s.to_string());
        self
    }

    /// Ask the server to start the transfer at `offset`.
    ///
    /// `mdtm` is the modification time recorded when the partial copy was
    /// fetched. The resume is cancelled if the server reports another one.
    pub fn with_resume(mut self, offset: u64, mdtm: Option<&str>) -> Self {
        self.resume_offset = offset;
        self.use_resume = offset > 0;
        self.mdtm_record = mdtm.map(|s| s.to_string());
        self
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn typecode(&self) -> FtpTypeCode {
        self.typecode
    }

    pub fn username(&self) -> &str {
        match &self.username {
            Some(u) if !u.is_empty() => u.as_str(),
            _ => FTP_ANONYMOUS_USER,
        }
    }

    #[inline]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub(crate) fn is_anonymous(&self) -> bool {
        self.username() == FTP_ANONYMOUS_USER
    }

    /// Whether a 331 reply to USER should be answered with PASS.
    pub(crate) fn may_send_password(&self) -> bool {
        self.password.is_some()
            || self.username.as_ref().map(|u| u.is_empty()).unwrap_or(true)
            || self.is_anonymous()
    }

    #[inline]
    pub fn resume_offset(&self) -> u64 {
        self.resume_offset
    }

    #[inline]
    pub fn use_resume(&self) -> bool {
        self.use_resume
    }

    pub(crate) fn cancel_resume(&mut self) {
        self.use_resume = false;
    }

    /// The latest MDTM record, updated from the server during the transfer.
    #[inline]
    pub fn mdtm_record(&self) -> Option<&str> {
        self.mdtm_record.as_deref()
    }

    /// Compare the server time-val with the stored record and keep the new one.
    pub(crate) fn update_mdtm(&mut self, mdtm: Option<&str>) {
        match mdtm {
            Some(new) => {
                if self.use_resume
                    && let Some(old) = &self.mdtm_record
                    && old != new
                {
                    self.use_resume = false;
                }
                self.mdtm_record = Some(new.to_string());
                self.facts.set_mdtm(new);
            }
            None => {
                if self.use_resume && self.mdtm_record.is_some() {
                    self.use_resume = false;
                }
            }
        }
    }

    #[inline]
    pub fn facts(&self) -> &FtpRemoteFacts {
        &self.facts
    }

    #[inline]
    pub(crate) fn facts_mut(&mut self) -> &mut FtpRemoteFacts {
        &mut self.facts
    }
}
