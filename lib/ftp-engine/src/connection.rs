/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::error::Error;
use std::net::IpAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::FtpServerAddr;

#[async_trait]
pub trait FtpConnectionProvider<T: AsyncRead + AsyncWrite, E: Error> {
    /// Connect to the server, returning the stream and the resolved peer
    /// address if known. The peer address is what passive endpoints are
    /// checked against.
    async fn new_control_connection(
        &self,
        server: &FtpServerAddr,
    ) -> Result<(T, Option<IpAddr>), E>;

    async fn new_data_connection(&self, server_addr: &FtpServerAddr) -> Result<T, E>;
}
