/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{info, warn};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::oneshot;

use ftp_engine::{FtpRemoteFacts, FtpRequest, FtpRequestError, FtpTransferReceiver};

pub(crate) enum Output {
    Stdout(Stdout),
    File(File),
}

impl Output {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Output::Stdout(io) => io.write_all(data).await,
            Output::File(f) => f.write_all(data).await,
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(io) => io.flush().await,
            Output::File(f) => f.flush().await,
        }
    }

    /// Drop what was written by an earlier partial download.
    async fn truncate(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(_) => Ok(()),
            Output::File(f) => f.set_len(0).await,
        }
    }
}

pub(crate) type TransferResult = anyhow::Result<FtpRemoteFacts>;

/// Writes the payload of one request to the output, and sends the result
/// back once the request is over.
pub(crate) struct OutputReceiver {
    output: Output,
    resume: bool,
    facts: FtpRemoteFacts,
    write_error: Option<io::Error>,
    result: Option<oneshot::Sender<TransferResult>>,
}

impl OutputReceiver {
    pub(crate) fn new(output: Output, resume: bool) -> (Self, oneshot::Receiver<TransferResult>) {
        let (sender, receiver) = oneshot::channel();
        let r = OutputReceiver {
            output,
            resume,
            facts: FtpRemoteFacts::default(),
            write_error: None,
            result: Some(sender),
        };
        (r, receiver)
    }

    fn send_result(&mut self, r: TransferResult) {
        if let Some(sender) = self.result.take() {
            let _ = sender.send(r);
        }
    }
}

#[async_trait]
impl FtpTransferReceiver for OutputReceiver {
    async fn on_header(&mut self, facts: &FtpRemoteFacts) {
        if let Some(size) = facts.size() {
            info!("remote size: {size}");
        }
        if let Some(dt) = facts.modify_time() {
            info!("remote modify time: {dt}");
        }
        if self.resume && !facts.using_resume() {
            warn!("the server will not resume, fetching from the start");
            if let Err(e) = self.output.truncate().await {
                self.write_error = Some(e);
            }
        }
        self.facts = facts.clone();
    }

    async fn recv_data(&mut self, data: &[u8]) {
        if self.write_error.is_some() {
            return;
        }
        if let Err(e) = self.output.write_all(data).await {
            self.write_error = Some(e);
        }
    }

    async fn on_finished(&mut self, _request: FtpRequest) {
        if self.write_error.is_none()
            && let Err(e) = self.output.flush().await
        {
            self.write_error = Some(e);
        }
        let r = match self.write_error.take() {
            Some(e) => Err(anyhow!("failed to write output: {e}")),
            None => Ok(self.facts.clone()),
        };
        self.send_result(r);
    }

    async fn on_failed(&mut self, request: FtpRequest, error: FtpRequestError) {
        self.send_result(Err(anyhow!("{} failed: {error}", request.path())));
    }
}
