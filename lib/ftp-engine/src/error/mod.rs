/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod kind;
mod passive;
mod reply;
mod session;

pub use kind::{FtpErrorKind, FtpRequestError};
pub use passive::FtpPassiveError;
pub use reply::FtpReplyError;
pub use session::FtpSessionError;
