/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

mod ports;
pub use ports::{FtpPortSet, FtpPortSetParseError};

#[cfg(feature = "yaml")]
mod yaml;

const DEFAULT_ANONYMOUS_PASSWORD: &str = "anonymous@";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpControlConfig {
    /// Max bytes buffered for a single reply.
    pub max_reply_size: usize,
    /// A session which has not seen any traffic for this long is closed.
    pub idle_timeout: Duration,
}

impl Default for FtpControlConfig {
    fn default() -> Self {
        FtpControlConfig {
            max_reply_size: 64 * 1024,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpTransferConfig {
    pub passive_connect_timeout: Duration,
    pub try_block_mode: bool,
    pub read_buffer_size: usize,
    /// How long to wait for the end of a block mode transfer after the server
    /// reported it complete.
    pub end_wait_timeout: Duration,
}

impl Default for FtpTransferConfig {
    fn default() -> Self {
        FtpTransferConfig {
            passive_connect_timeout: Duration::from_secs(10),
            try_block_mode: true,
            read_buffer_size: 16 * 1024,
            end_wait_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpClientConfig {
    pub control: FtpControlConfig,
    pub transfer: FtpTransferConfig,
    pub connect_timeout: Duration,
    /// Address paths from the root directory instead of the login directory.
    pub use_absolute_path: bool,
    pub no_keep_alive: bool,
    pub offline_mode: bool,
    pub max_connections_per_host: usize,
    pub permitted_ports: FtpPortSet,
    pub anonymous_password: String,
}

impl Default for FtpClientConfig {
    fn default() -> Self {
        FtpClientConfig {
            control: FtpControlConfig::default(),
            transfer: FtpTransferConfig::default(),
            connect_timeout: Duration::from_secs(30),
            use_absolute_path: false,
            no_keep_alive: false,
            offline_mode: false,
            max_connections_per_host: 8,
            permitted_ports: FtpPortSet::default(),
            anonymous_password: DEFAULT_ANONYMOUS_PASSWORD.to_string(),
        }
    }
}

impl FtpClientConfig {
    /// Whether an idle session may be kept for later requests.
    pub(crate) fn allow_keep_alive(&self) -> bool {
        !(self.no_keep_alive || self.offline_mode)
    }
}
