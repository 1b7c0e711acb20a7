/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use super::FtpCommand;

/// The command a session is waiting the reply for.
///
/// Exactly one of these is active for a control connection. `Nothing` is used
/// before the greeting and between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCommand {
    Nothing,
    User,
    Pass,
    Pwd,
    /// CWD to the next path segment.
    Cwd,
    CwdRoot,
    /// CWD back to the login directory.
    CwdHome,
    /// CWD to the whole request path.
    CwdFull,
    Cdup,
    Type,
    /// The first TYPE I of a session.
    TypeInit,
    Mode,
    Pasv,
    Epsv,
    EpsvAll,
    /// SIZE of the next path segment.
    Size,
    /// SIZE of the rest of the path.
    SizeRest,
    SizeFull,
    Mdtm,
    MdtmFull,
    Restart,
    /// REST 0, to learn whether the server supports restart at all.
    RestartTest,
    Retr,
    RetrFull,
    List,
    Quit,
}

impl PendingCommand {
    pub fn command(&self) -> Option<FtpCommand> {
        let cmd = match self {
            PendingCommand::Nothing => return None,
            PendingCommand::User => FtpCommand::USER,
            PendingCommand::Pass => FtpCommand::PASS,
            PendingCommand::Pwd => FtpCommand::PWD,
            PendingCommand::Cwd
            | PendingCommand::CwdRoot
            | PendingCommand::CwdHome
            | PendingCommand::CwdFull => FtpCommand::CWD,
            PendingCommand::Cdup => FtpCommand::CDUP,
            PendingCommand::Type | PendingCommand::TypeInit => FtpCommand::TYPE,
            PendingCommand::Mode => FtpCommand::MODE,
            PendingCommand::Pasv => FtpCommand::PASV,
            PendingCommand::Epsv | PendingCommand::EpsvAll => FtpCommand::EPSV,
            PendingCommand::Size | PendingCommand::SizeRest | PendingCommand::SizeFull => {
                FtpCommand::SIZE
            }
            PendingCommand::Mdtm | PendingCommand::MdtmFull => FtpCommand::MDTM,
            PendingCommand::Restart | PendingCommand::RestartTest => FtpCommand::REST,
            PendingCommand::Retr | PendingCommand::RetrFull => FtpCommand::RETR,
            PendingCommand::List => FtpCommand::LIST,
            PendingCommand::Quit => FtpCommand::QUIT,
        };
        Some(cmd)
    }

    #[inline]
    pub(crate) fn is_passive(&self) -> bool {
        matches!(self, PendingCommand::Pasv | PendingCommand::Epsv)
    }

    #[inline]
    pub(crate) fn is_transfer(&self) -> bool {
        matches!(
            self,
            PendingCommand::Retr | PendingCommand::RetrFull | PendingCommand::List
        )
    }
}
