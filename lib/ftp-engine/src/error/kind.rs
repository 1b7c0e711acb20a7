/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;

use thiserror::Error;

use super::{FtpPassiveError, FtpReplyError};

/// The terminal failure kind reported to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpErrorKind {
    ServiceUnavailable,
    NotLoggedIn,
    UserCredentials,
    NeedPassword,
    FileUnavailable,
    TransferAborted,
    CannotOpenPassiveDataConnection,
    InternalError,
    ConnectFailed,
    ConnectionClosed,
    Aborted,
}

impl FtpErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtpErrorKind::ServiceUnavailable => "service unavailable",
            FtpErrorKind::NotLoggedIn => "not logged in",
            FtpErrorKind::UserCredentials => "invalid user credentials",
            FtpErrorKind::NeedPassword => "password is needed",
            FtpErrorKind::FileUnavailable => "file unavailable",
            FtpErrorKind::TransferAborted => "transfer aborted",
            FtpErrorKind::CannotOpenPassiveDataConnection => {
                "cannot open passive data connection"
            }
            FtpErrorKind::InternalError => "internal error",
            FtpErrorKind::ConnectFailed => "failed to connect to server",
            FtpErrorKind::ConnectionClosed => "connection closed by server",
            FtpErrorKind::Aborted => "aborted",
        }
    }
}

impl fmt::Display for FtpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}{}", reply_suffix(.server_reply))]
pub struct FtpRequestError {
    kind: FtpErrorKind,
    server_reply: Option<String>,
}

fn reply_suffix(reply: &Option<String>) -> String {
    match reply {
        Some(s) => format!(": {}", s.trim_end()),
        None => String::new(),
    }
}

impl FtpRequestError {
    pub fn new(kind: FtpErrorKind) -> Self {
        FtpRequestError {
            kind,
            server_reply: None,
        }
    }

    pub fn with_server_reply(kind: FtpErrorKind, reply: &str) -> Self {
        FtpRequestError {
            kind,
            server_reply: Some(reply.to_string()),
        }
    }

    #[inline]
    pub fn kind(&self) -> FtpErrorKind {
        self.kind
    }

    /// The raw reply text the server sent along with the failure, if any.
    #[inline]
    pub fn server_reply(&self) -> Option<&str> {
        self.server_reply.as_deref()
    }
}

impl From<FtpErrorKind> for FtpRequestError {
    fn from(kind: FtpErrorKind) -> Self {
        FtpRequestError::new(kind)
    }
}

impl From<FtpPassiveError> for FtpRequestError {
    fn from(_: FtpPassiveError) -> Self {
        FtpRequestError::new(FtpErrorKind::CannotOpenPassiveDataConnection)
    }
}

impl From<FtpReplyError> for FtpRequestError {
    fn from(_: FtpReplyError) -> Self {
        FtpRequestError::new(FtpErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let e = FtpRequestError::new(FtpErrorKind::NotLoggedIn);
        assert_eq!(e.to_string(), "not logged in");

        let e = FtpRequestError::with_server_reply(
            FtpErrorKind::FileUnavailable,
            "550 No such file\r\n",
        );
        assert_eq!(e.to_string(), "file unavailable: 550 No such file");
        assert_eq!(e.server_reply(), Some("550 No such file\r\n"));
    }

    #[test]
    fn passive_maps_to_kind() {
        let e = FtpRequestError::from(FtpPassiveError::RestrictedPort(21));
        assert_eq!(e.kind(), FtpErrorKind::CannotOpenPassiveDataConnection);
    }
}
