/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod command;
pub use command::{FtpCommand, FtpCommandLine};

mod escape;
pub(crate) use escape::unescape_path;

mod pending;
pub use pending::PendingCommand;

mod reply;
pub use reply::FtpReplyBuffer;
pub(crate) use reply::{directory_message, parse_mdtm, parse_pwd_path, parse_size};
