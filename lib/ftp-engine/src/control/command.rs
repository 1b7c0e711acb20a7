/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpCommand(&'static str);

impl FtpCommand {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

macro_rules! ftp_commands {
    (
        $(
            $(#[$docs:meta])*
            ($konst:ident, $phrase:expr);
        )+
    ) => {
        impl FtpCommand {
        $(
            $(#[$docs])*
            pub const $konst: FtpCommand = FtpCommand($phrase);
        )+
        }
    };
}

ftp_commands! {
    (USER, "USER");
    (PASS, "PASS");
    (PWD, "PWD");
    (CWD, "CWD");
    (CDUP, "CDUP");
    (TYPE, "TYPE");
    (MODE, "MODE");
    (PASV, "PASV");
    (EPSV, "EPSV");
    (SIZE, "SIZE");
    (MDTM, "MDTM");
    (REST, "REST");
    (RETR, "RETR");
    (LIST, "LIST");
    (QUIT, "QUIT");
}

/// A complete command line, without the trailing CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpCommandLine {
    cmd: FtpCommand,
    line: String,
}

impl FtpCommandLine {
    pub fn new(cmd: FtpCommand) -> Self {
        FtpCommandLine {
            cmd,
            line: cmd.0.to_string(),
        }
    }

    pub fn with_param(cmd: FtpCommand, param: &str) -> Self {
        if param.is_empty() {
            return FtpCommandLine::new(cmd);
        }
        let mut line = String::with_capacity(cmd.0.len() + 1 + param.len());
        line.push_str(cmd.0);
        line.push(' ');
        line.push_str(param);
        FtpCommandLine { cmd, line }
    }

    #[inline]
    pub fn command(&self) -> FtpCommand {
        self.cmd
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// The bytes to put on the wire.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::with_capacity(self.line.len() + 2);
        buf.extend_from_slice(self.line.as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl fmt::Display for FtpCommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cmd == FtpCommand::PASS {
            f.write_str("PASS ****")
        } else {
            f.write_str(&self.line)
        }
    }
}
