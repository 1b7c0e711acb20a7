/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::borrow::Cow;

use super::{FtpControlMachine, FtpDataMode, FtpTransferType};
use crate::control::unescape_path;
use crate::{FtpCommandLine, FtpTypeCode, PendingCommand};

fn join_cwd(cwd: &str, segment: &str) -> String {
    if cwd.is_empty() {
        segment.to_string()
    } else if cwd.ends_with('/') {
        format!("{cwd}{segment}")
    } else {
        format!("{cwd}/{segment}")
    }
}

fn parent_cwd(cwd: &str) -> String {
    let cwd = cwd.strip_suffix('/').unwrap_or(cwd);
    match memchr::memrchr(b'/', cwd.as_bytes()) {
        Some(0) => "/".to_string(),
        Some(p) => cwd[..p].to_string(),
        None => String::new(),
    }
}

impl FtpControlMachine {
    /// Whether the request path is to be resolved from the server root.
    pub(super) fn is_absolute(&self) -> bool {
        self.config.use_absolute_path || self.path.path().starts_with('/')
    }

    fn full_path_param(&self) -> Cow<'_, str> {
        let path = unescape_path(self.path.path());
        if self.config.use_absolute_path && !path.starts_with('/') {
            Cow::Owned(format!("/{path}"))
        } else {
            path
        }
    }

    pub(super) fn wanted_type(&self) -> FtpTransferType {
        match self.request.as_ref().map(|r| r.typecode()) {
            Some(FtpTypeCode::Ascii) => FtpTransferType::Ascii,
            _ => FtpTransferType::Image,
        }
    }

    /// Build the command line for `cmd` and record what it changes locally.
    pub(super) fn compose(&mut self, cmd: PendingCommand) -> Option<FtpCommandLine> {
        let ftp_cmd = cmd.command()?;
        let line = match cmd {
            PendingCommand::User => {
                let request = self.request.as_ref()?;
                FtpCommandLine::with_param(ftp_cmd, &unescape_path(request.username()))
            }
            PendingCommand::Pass => {
                let request = self.request.as_ref()?;
                let password = match request.password() {
                    Some(p) => unescape_path(p),
                    None => Cow::Borrowed(self.config.anonymous_password.as_str()),
                };
                FtpCommandLine::with_param(ftp_cmd, &password)
            }
            PendingCommand::Cwd => {
                let segment = unescape_path(self.path.segment()).into_owned();
                if segment.is_empty() {
                    self.new_cwd = "/".to_string();
                    FtpCommandLine::with_param(ftp_cmd, "/")
                } else {
                    self.new_cwd = join_cwd(&self.cwd, &segment);
                    FtpCommandLine::with_param(ftp_cmd, &segment)
                }
            }
            PendingCommand::CwdRoot => {
                self.new_cwd = "/".to_string();
                FtpCommandLine::with_param(ftp_cmd, "/")
            }
            PendingCommand::CwdHome => {
                self.new_cwd.clear();
                let request = self.request.as_ref()?;
                if let Some(start) = &self.start_path {
                    FtpCommandLine::with_param(ftp_cmd, start)
                } else if self.config.use_absolute_path
                    || request.password().is_none()
                    || request.is_anonymous()
                {
                    FtpCommandLine::with_param(ftp_cmd, "/")
                } else if self.caps.use_tilde_for_home() {
                    FtpCommandLine::with_param(ftp_cmd, "~")
                } else {
                    FtpCommandLine::new(ftp_cmd)
                }
            }
            PendingCommand::CwdFull => {
                let param = self.full_path_param().into_owned();
                let line = FtpCommandLine::with_param(ftp_cmd, &param);
                self.new_cwd = param;
                line
            }
            PendingCommand::Cdup => {
                self.new_cwd = parent_cwd(&self.cwd);
                FtpCommandLine::new(ftp_cmd)
            }
            PendingCommand::Type | PendingCommand::TypeInit => {
                let t = if cmd == PendingCommand::TypeInit {
                    FtpTransferType::Image
                } else {
                    self.wanted_type()
                };
                self.current_type = Some(t);
                FtpCommandLine::with_param(ftp_cmd, t.as_param())
            }
            PendingCommand::Mode => match self.data_mode {
                FtpDataMode::Block => FtpCommandLine::with_param(ftp_cmd, "B"),
                FtpDataMode::Stream => FtpCommandLine::with_param(ftp_cmd, "S"),
            },
            PendingCommand::EpsvAll => FtpCommandLine::with_param(ftp_cmd, "ALL"),
            PendingCommand::Size => {
                FtpCommandLine::with_param(ftp_cmd, &unescape_path(self.path.segment()))
            }
            PendingCommand::SizeRest | PendingCommand::Mdtm | PendingCommand::Retr => {
                FtpCommandLine::with_param(ftp_cmd, &unescape_path(self.path.remaining()))
            }
            PendingCommand::SizeFull | PendingCommand::MdtmFull | PendingCommand::RetrFull => {
                FtpCommandLine::with_param(ftp_cmd, &self.full_path_param())
            }
            PendingCommand::Restart => {
                let offset = self.request.as_ref()?.resume_offset();
                FtpCommandLine::with_param(ftp_cmd, &offset.to_string())
            }
            PendingCommand::RestartTest => FtpCommandLine::with_param(ftp_cmd, "0"),
            PendingCommand::Pwd
            | PendingCommand::Pasv
            | PendingCommand::Epsv
            | PendingCommand::List
            | PendingCommand::Quit
            | PendingCommand::Nothing => FtpCommandLine::new(ftp_cmd),
        };
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join() {
        assert_eq!(join_cwd("", "a"), "a");
        assert_eq!(join_cwd("/", "a"), "/a");
        assert_eq!(join_cwd("a", "b"), "a/b");
    }

    #[test]
    fn parent() {
        assert_eq!(parent_cwd("a/b"), "a");
        assert_eq!(parent_cwd("a/b/"), "a");
        assert_eq!(parent_cwd("/a"), "/");
        assert_eq!(parent_cwd("a"), "");
    }
}
