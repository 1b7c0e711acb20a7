/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FtpReplyError {
    #[error("reply exceeds max size {0}")]
    ReplyTooLong(usize),
}
