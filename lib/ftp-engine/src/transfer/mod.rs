/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use async_trait::async_trait;

use crate::{FtpRemoteFacts, FtpRequest, FtpRequestError};

mod block;
pub use block::BlockModeDecoder;

/// The consumer of one request.
///
/// Exactly one of `on_finished` and `on_failed` is called, and `recv_data`
/// only ever follows `on_header`.
#[async_trait]
pub trait FtpTransferReceiver {
    async fn on_header(&mut self, facts: &FtpRemoteFacts);
    async fn recv_data(&mut self, data: &[u8]);
    async fn on_finished(&mut self, request: FtpRequest);
    async fn on_failed(&mut self, request: FtpRequest, error: FtpRequestError);
}
