/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use chrono::{DateTime, Utc};

mod time_val;

/// What the server told about the target of a request, made available to the
/// receiver once the transfer header is ready.
#[derive(Debug, Clone, Default)]
pub struct FtpRemoteFacts {
    size: Option<u64>,
    mdtm: Option<String>,
    modify_time: Option<DateTime<Utc>>,
    start_path: Option<String>,
    directory_message: String,
    using_resume: bool,
    listing: bool,
}

impl FtpRemoteFacts {
    #[inline]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// The raw time-val of the MDTM reply.
    #[inline]
    pub fn mdtm(&self) -> Option<&str> {
        self.mdtm.as_deref()
    }

    #[inline]
    pub fn modify_time(&self) -> Option<&DateTime<Utc>> {
        self.modify_time.as_ref()
    }

    /// The login directory reported by PWD.
    #[inline]
    pub fn start_path(&self) -> Option<&str> {
        self.start_path.as_deref()
    }

    /// Text the server attached to the reply which confirmed the final directory.
    #[inline]
    pub fn directory_message(&self) -> &str {
        &self.directory_message
    }

    /// Whether the server accepted the REST command for this transfer.
    #[inline]
    pub fn using_resume(&self) -> bool {
        self.using_resume
    }

    /// Whether the transfer is a directory listing.
    #[inline]
    pub fn listing(&self) -> bool {
        self.listing
    }

    pub(crate) fn set_size(&mut self, size: Option<u64>) {
        self.size = size;
    }

    pub(crate) fn set_mdtm(&mut self, mdtm: &str) {
        self.modify_time = time_val::parse_from_str(mdtm).ok();
        self.mdtm = Some(mdtm.to_string());
    }

    pub(crate) fn set_start_path(&mut self, path: &str) {
        self.start_path = Some(path.to_string());
    }

    pub(crate) fn set_directory_message(&mut self, msg: String) {
        self.directory_message = msg;
    }

    pub(crate) fn set_using_resume(&mut self, using: bool) {
        self.using_resume = using;
    }

    pub(crate) fn set_listing(&mut self, listing: bool) {
        self.listing = listing;
    }
}
