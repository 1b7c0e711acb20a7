/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FtpPassiveError {
    #[error("no valid host and port found in PASV reply")]
    InvalidPasvReply,
    #[error("no valid port found in EPSV reply")]
    InvalidEpsvReply,
    #[error("passive address {0} does not match the control connection peer {1}")]
    AddressMismatch(IpAddr, IpAddr),
    #[error("passive port {0} is restricted")]
    RestrictedPort(u16),
}
