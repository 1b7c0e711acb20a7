/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FtpSessionError<E: std::error::Error> {
    #[error("connect failed: {0:?}")]
    ConnectIoError(E),
    #[error("timed out to connect")]
    ConnectTimedOut,
    #[error("failed to send command: {0:?}")]
    SendFailed(io::Error),
    #[error("failed to recv reply: {0:?}")]
    RecvFailed(io::Error),
    #[error("session aborted")]
    Aborted,
}
