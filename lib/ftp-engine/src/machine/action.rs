/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use crate::{FtpCommandLine, FtpPassiveEndpoint, FtpRemoteFacts, FtpRequest, FtpRequestError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FtpDataMode {
    /// MODE S, the end of data is the close of the data connection.
    #[default]
    Stream,
    /// MODE B, the data connection is kept open across transfers.
    Block,
}

/// Side effects the control machine asks its driver to perform, in order.
#[derive(Debug)]
pub enum FtpAction {
    Send(FtpCommandLine),
    OpenDataConnection {
        endpoint: FtpPassiveEndpoint,
        mode: FtpDataMode,
    },
    CloseDataConnection,
    HeaderAvailable {
        request_id: u64,
        facts: FtpRemoteFacts,
    },
    RequestFinished(FtpRequest),
    RequestFailed(FtpRequest, FtpRequestError),
    /// Give the request back to the queue, to be served by another session.
    RequeueRequest(FtpRequest),
    /// Close the control connection, the session is over.
    Close,
}

/// Where an idle session gets its next request from.
pub trait FtpRequestSource {
    fn next_request(&mut self) -> Option<FtpRequest>;

    /// Whether the session may stay connected while there is no request.
    fn allow_idle(&self) -> bool;
}

#[cfg(test)]
pub(crate) struct VecRequestSource {
    pub(crate) requests: std::collections::VecDeque<FtpRequest>,
    pub(crate) allow_idle: bool,
}

#[cfg(test)]
impl FtpRequestSource for VecRequestSource {
    fn next_request(&mut self) -> Option<FtpRequest> {
        self.requests.pop_front()
    }

    fn allow_idle(&self) -> bool {
        self.allow_idle
    }
}
