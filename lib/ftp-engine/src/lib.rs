/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod debug;
pub use debug::{FTP_DEBUG_LOG_LEVEL, FTP_DEBUG_LOG_TARGET};

mod error;
pub use error::{FtpErrorKind, FtpPassiveError, FtpReplyError, FtpRequestError, FtpSessionError};

mod config;
pub use config::{
    FtpClientConfig, FtpControlConfig, FtpPortSet, FtpPortSetParseError, FtpTransferConfig,
};

mod server;
pub use server::{FTP_DEFAULT_PORT, FtpServerAddr, FtpServerAddrParseError, FtpServerHost};

mod capability;
pub use capability::{FtpServerCapabilities, banner_requires_skip_cwd_after_size};

mod control;
pub use control::{FtpCommand, FtpCommandLine, FtpReplyBuffer, PendingCommand};

mod facts;
pub use facts::FtpRemoteFacts;

mod request;
pub use request::{FTP_ANONYMOUS_USER, FtpRequest, FtpTypeCode};

mod path;
pub use path::{FtpPathResolver, FtpPathStatus};

mod passive;
pub use passive::{FtpPassiveEndpoint, is_restricted_port};

mod machine;
pub use machine::{FtpAction, FtpControlMachine, FtpDataMode, FtpRequestSource};

mod transfer;
pub use transfer::{BlockModeDecoder, FtpTransferReceiver};

mod connection;
pub use connection::FtpConnectionProvider;

mod session;

mod manager;
pub use manager::FtpServerManager;
