/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::mem;

use log::{debug, warn};

use super::{DataConnection, FtpAction, FtpControlMachine, FtpDataMode, FtpRequestSource};
use crate::capability::banner_requires_skip_cwd_after_size;
use crate::control::{parse_mdtm, parse_pwd_path, parse_size};
use crate::error::{FtpErrorKind, FtpRequestError};
use crate::path::FtpPathStatus;
use crate::{FtpPassiveEndpoint, PendingCommand};

/// What to do after a reply has been handled.
pub(super) enum Step {
    /// Send this command. `Nothing` keeps waiting for the final reply to the
    /// command in flight.
    Next(PendingCommand),
    /// Fail the current request, then send `Quit` or go on with the next
    /// request if `Nothing` is given.
    Fail(PendingCommand, FtpRequestError),
    Done,
}

impl FtpControlMachine {
    pub(super) fn on_reply(&mut self, code: u16, text: &str, src: &mut dyn FtpRequestSource) {
        debug!("ftp control: reply {code} to {:?}", self.pending);
        let step = if code == 221 {
            self.shutdown();
            Step::Done
        } else {
            match self.pending {
                PendingCommand::Nothing => self.on_idle_reply(code, text, src),
                PendingCommand::User => self.on_user_reply(code, text),
                PendingCommand::Pass => self.on_pass_reply(code, text),
                PendingCommand::Pwd => self.on_pwd_reply(code, text),
                PendingCommand::RestartTest => self.on_restart_test_reply(code, text),
                PendingCommand::TypeInit => self.on_type_init_reply(code, text),
                PendingCommand::Type => self.on_type_reply(code, text),
                PendingCommand::Mode => self.on_mode_reply(code, text),
                PendingCommand::EpsvAll => self.on_epsv_all_reply(code, text),
                PendingCommand::Epsv => self.on_epsv_reply(code, text),
                PendingCommand::Pasv => self.on_pasv_reply(code, text),
                PendingCommand::Size | PendingCommand::SizeRest => self.on_size_reply(code, text),
                PendingCommand::SizeFull => self.on_size_full_reply(code, text),
                PendingCommand::Mdtm | PendingCommand::MdtmFull => self.on_mdtm_reply(code, text),
                PendingCommand::Restart => self.on_restart_reply(code, text),
                PendingCommand::Cwd | PendingCommand::CwdRoot => self.on_cwd_reply(code, text),
                PendingCommand::CwdHome => self.on_cwd_home_reply(code, text),
                PendingCommand::CwdFull => self.on_cwd_full_reply(code, text),
                PendingCommand::Cdup => self.on_cdup_reply(code, text),
                PendingCommand::Retr | PendingCommand::RetrFull | PendingCommand::List => {
                    self.on_transfer_reply(code, text, src)
                }
                PendingCommand::Quit => {
                    self.close();
                    Step::Done
                }
            }
        };

        match step {
            Step::Next(PendingCommand::Nothing) | Step::Done => {}
            Step::Next(next) => self.send_step(next),
            Step::Fail(next, e) => self.fail_request(next, e, src),
        }
    }

    /// Detach the request and end the session.
    pub(super) fn shutdown(&mut self) {
        if let Some(request) = self.request.take() {
            if self.received_transfer_finished {
                self.actions.push(FtpAction::RequestFinished(request));
            } else {
                let kind = match self.pending {
                    PendingCommand::User | PendingCommand::Pass => FtpErrorKind::UserCredentials,
                    // refused before the greeting
                    PendingCommand::Nothing if !self.connection_active => {
                        FtpErrorKind::NotLoggedIn
                    }
                    _ => FtpErrorKind::ConnectionClosed,
                };
                self.actions.push(FtpAction::RequestFailed(
                    request,
                    FtpRequestError::new(kind),
                ));
            }
        }
        self.close();
    }

    /// The generic handling of replies which were not expected by the
    /// command in flight.
    fn map_status(&mut self, code: u16, text: &str) -> Step {
        let (kind, next) = match code {
            226 => {
                self.close_data_connection();
                return Step::Next(PendingCommand::Nothing);
            }
            100..=199 => return Step::Next(PendingCommand::Nothing),
            421 => (FtpErrorKind::ServiceUnavailable, PendingCommand::Quit),
            425 => (
                FtpErrorKind::CannotOpenPassiveDataConnection,
                PendingCommand::Nothing,
            ),
            426 | 451 => (FtpErrorKind::TransferAborted, PendingCommand::Nothing),
            332 | 530 | 531 => {
                if code != 531
                    && !matches!(self.pending, PendingCommand::User | PendingCommand::Pass)
                {
                    (FtpErrorKind::NotLoggedIn, PendingCommand::Quit)
                } else {
                    (FtpErrorKind::UserCredentials, PendingCommand::Quit)
                }
            }
            450 | 550 | 553 | 501 => {
                if matches!(
                    self.pending,
                    PendingCommand::Size
                        | PendingCommand::SizeRest
                        | PendingCommand::Retr
                        | PendingCommand::RetrFull
                        | PendingCommand::List
                        | PendingCommand::Cwd
                        | PendingCommand::CwdRoot
                ) {
                    (FtpErrorKind::FileUnavailable, PendingCommand::Nothing)
                } else {
                    (FtpErrorKind::UserCredentials, PendingCommand::Nothing)
                }
            }
            331 => (FtpErrorKind::NeedPassword, PendingCommand::Quit),
            _ => {
                let empty_password = self
                    .request
                    .as_ref()
                    .map(|r| r.password().is_none_or(|p| p.is_empty()))
                    .unwrap_or(false);
                if code >= 500 && self.pending == PendingCommand::Pass && empty_password {
                    (FtpErrorKind::UserCredentials, PendingCommand::Quit)
                } else {
                    (FtpErrorKind::InternalError, PendingCommand::Nothing)
                }
            }
        };

        let e = if kind == FtpErrorKind::NeedPassword {
            FtpRequestError::new(kind)
        } else {
            FtpRequestError::with_server_reply(kind, text)
        };
        Step::Fail(next, e)
    }

    fn on_idle_reply(&mut self, code: u16, text: &str, src: &mut dyn FtpRequestSource) -> Step {
        if !self.connection_active {
            return match code {
                220 => {
                    self.connection_active = true;
                    if banner_requires_skip_cwd_after_size(text) {
                        self.skip_cwd_after_size = true;
                        self.caps.set_skip_cwd_after_size();
                    }
                    if self.request.is_some() {
                        Step::Next(PendingCommand::User)
                    } else {
                        Step::Next(PendingCommand::Quit)
                    }
                }
                // refused, or not ready yet
                _ => self.map_status(code, text),
            };
        }

        match code {
            120 => Step::Next(PendingCommand::Nothing),
            226 | 250 => {
                if self.request.is_some() && self.need_transfer_finished {
                    self.transfer_complete(src);
                }
                Step::Done
            }
            421 => Step::Fail(
                PendingCommand::Quit,
                FtpRequestError::with_server_reply(FtpErrorKind::ServiceUnavailable, text),
            ),
            _ => {
                if self.request.is_some() {
                    self.make_dir_msg(text, code);
                    Step::Next(self.decide_type_or_mode(self.passive_command()))
                } else {
                    Step::Done
                }
            }
        }
    }

    fn after_login(&mut self) -> PendingCommand {
        if self.caps.epsv_disabled() {
            self.start_dir_actions()
        } else {
            PendingCommand::EpsvAll
        }
    }

    fn on_user_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            230 => Step::Next(PendingCommand::Pwd),
            331 if self.request.as_ref().is_some_and(|r| r.may_send_password()) => {
                Step::Next(PendingCommand::Pass)
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_pass_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            230 | 202 => Step::Next(PendingCommand::Pwd),
            _ => self.map_status(code, text),
        }
    }

    fn on_pwd_reply(&mut self, code: u16, text: &str) -> Step {
        if code == 421 {
            return self.map_status(code, text);
        }
        if code == 257
            && let Some(path) = parse_pwd_path(text)
        {
            debug!("ftp control: start path '{path}'");
            if let Some(request) = self.request.as_mut() {
                request.facts_mut().set_start_path(&path);
            }
            self.start_path = Some(path);
        }
        Step::Next(self.after_login())
    }

    fn on_epsv_all_reply(&mut self, code: u16, text: &str) -> Step {
        if code == 421 {
            return self.map_status(code, text);
        }
        if !matches!(code, 200 | 220) {
            self.caps.disable_epsv();
            self.caps.set_epsv_tested();
        }
        Step::Next(self.start_dir_actions())
    }

    fn on_restart_test_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            350 | 250 | 200 => self.caps.set_restart_tested(true),
            421 => return self.map_status(code, text),
            _ => {
                self.caps.set_restart_tested(false);
                if let Some(request) = self.request.as_mut() {
                    request.cancel_resume();
                }
            }
        }
        Step::Next(self.start_dir_actions())
    }

    fn on_type_init_reply(&mut self, code: u16, text: &str) -> Step {
        if code == 421 {
            return self.map_status(code, text);
        }
        Step::Next(self.start_dir_actions())
    }

    /// What follows once TYPE and MODE are settled.
    pub(super) fn after_type_or_mode(&mut self) -> PendingCommand {
        let size_known = self
            .request
            .as_ref()
            .is_some_and(|r| r.facts().size().is_some());
        if !self.full_path_active()
            && !self.caps.size_disabled()
            && !size_known
            && self.path.status() == FtpPathStatus::File
        {
            PendingCommand::SizeRest
        } else {
            self.passive_command()
        }
    }

    fn on_type_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            200 | 504 => {
                let next = self.after_type_or_mode();
                Step::Next(self.decide_type_or_mode(next))
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_mode_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            200 | 250 => Step::Next(self.after_type_or_mode()),
            202 | 500..=504 | 550 => {
                self.caps.disable_mode();
                self.data_mode = FtpDataMode::Stream;
                Step::Next(self.after_type_or_mode())
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_pasv_reply(&mut self, code: u16, text: &str) -> Step {
        if code != 227 {
            return self.map_status(code, text);
        }
        if self.request.is_none() {
            return Step::Next(PendingCommand::Quit);
        }
        match FtpPassiveEndpoint::parse_pasv(text).and_then(|ep| {
            ep.validate(self.control_peer, &self.config.permitted_ports)
                .map(|_| ep)
        }) {
            Ok(ep) => {
                self.passive_used = Some(PendingCommand::Pasv);
                Step::Next(self.activate_passive(ep))
            }
            Err(e) => {
                warn!("ftp control: {e}");
                Step::Fail(
                    PendingCommand::Quit,
                    FtpRequestError::with_server_reply(
                        FtpErrorKind::CannotOpenPassiveDataConnection,
                        text,
                    ),
                )
            }
        }
    }

    fn on_epsv_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            229 => {
                if self.request.is_none() {
                    return Step::Next(PendingCommand::Quit);
                }
                match FtpPassiveEndpoint::parse_epsv(text).and_then(|ep| {
                    ep.validate(None, &self.config.permitted_ports)
                        .map(|_| ep)
                }) {
                    Ok(ep) => {
                        self.passive_used = Some(PendingCommand::Epsv);
                        Step::Next(self.activate_passive(ep))
                    }
                    Err(e) => {
                        warn!("ftp control: {e}");
                        Step::Fail(
                            PendingCommand::Quit,
                            FtpRequestError::with_server_reply(
                                FtpErrorKind::CannotOpenPassiveDataConnection,
                                text,
                            ),
                        )
                    }
                }
            }
            100..=199 | 421 => self.map_status(code, text),
            _ => {
                // any other reply means EPSV is of no use with this server
                self.caps.disable_epsv();
                self.caps.set_epsv_tested();
                Step::Next(PendingCommand::Pasv)
            }
        }
    }

    fn on_size_reply(&mut self, code: u16, text: &str) -> Step {
        let rest = self.pending == PendingCommand::SizeRest;
        match code {
            213 | 250 if self.request.is_some() => {
                let size = parse_size(text);
                if let Some(request) = self.request.as_mut() {
                    request.facts_mut().set_size(size);
                }
                if rest || self.skip_cwd_after_size || self.caps.skip_cwd_after_size() {
                    Step::Next(self.mdtm_or_passive())
                } else {
                    Step::Next(PendingCommand::Cwd)
                }
            }
            500..=504 => {
                self.caps.disable_size();
                if rest {
                    Step::Next(self.mdtm_or_passive())
                } else {
                    Step::Next(PendingCommand::Cwd)
                }
            }
            550 | 553 if !rest => Step::Next(PendingCommand::Cwd),
            550 if rest => Step::Next(self.mdtm_or_passive()),
            _ => self.map_status(code, text),
        }
    }

    fn on_size_full_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            213 | 250 => {
                let size = parse_size(text);
                if let Some(request) = self.request.as_mut() {
                    request.facts_mut().set_size(size);
                }
                self.path.set_status(FtpPathStatus::File);
                if self.caps.mdtm_disabled() {
                    Step::Next(self.decide_type_or_mode(self.passive_command()))
                } else {
                    Step::Next(PendingCommand::MdtmFull)
                }
            }
            500..=504 if self.request.is_some() => {
                self.caps.disable_size();
                self.caps.disable_full_path();
                self.fall_back_to_segments();
                Step::Next(PendingCommand::CwdHome)
            }
            550 | 553 => Step::Next(PendingCommand::CwdFull),
            _ => self.map_status(code, text),
        }
    }

    fn on_mdtm_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            213 | 250 => {
                let mdtm = parse_mdtm(text);
                if let Some(request) = self.request.as_mut() {
                    request.update_mdtm(mdtm);
                }
                Step::Next(self.decide_type_or_mode(self.passive_command()))
            }
            550 | 553 => Step::Next(self.decide_type_or_mode(self.passive_command())),
            500..=504 => {
                self.caps.disable_mdtm();
                Step::Next(self.decide_type_or_mode(self.passive_command()))
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_restart_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            350 | 250 | 200 if self.request.is_some() => {
                if let Some(request) = self.request.as_mut() {
                    request.facts_mut().set_using_resume(true);
                }
                Step::Next(self.retr_command())
            }
            202 | 502 | 504 => {
                if let Some(request) = self.request.as_mut() {
                    request.cancel_resume();
                    request.facts_mut().set_using_resume(false);
                }
                Step::Next(self.retr_command())
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_cwd_reply(&mut self, code: u16, text: &str) -> Step {
        let Some(typecode) = self.request.as_ref().map(|r| r.typecode()) else {
            return self.map_status(code, text);
        };
        match code {
            250 | 200 | 257 => {
                self.cwd = mem::take(&mut self.new_cwd);
                if self.path.status() == FtpPathStatus::File {
                    // the last segment is a directory
                    self.make_dir_msg(text, code);
                    self.path.set_status(FtpPathStatus::Directory);
                    Step::Next(self.decide_type_or_mode(self.passive_command()))
                } else if self.path.parse_path(typecode) {
                    Step::Next(self.size_or_cwd())
                } else {
                    self.make_dir_msg(text, code);
                    Step::Next(self.file_or_passive())
                }
            }
            550 | 553 | 501 | 530
                if self.pending == PendingCommand::CwdRoot
                    || self.path.status() == FtpPathStatus::File =>
            {
                if self.pending == PendingCommand::Cwd {
                    // the last segment is a file
                    Step::Next(self.file_or_passive())
                } else if self.path.parse_path(typecode) {
                    Step::Next(self.size_or_cwd())
                } else {
                    Step::Next(self.file_or_passive())
                }
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_cwd_home_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            501 if self.start_path.is_none() && !self.caps.use_tilde_for_home() => {
                self.caps.set_use_tilde_for_home();
                Step::Next(PendingCommand::CwdHome)
            }
            250 | 200 | 257 | 550 | 553 | 501 | 530 => {
                self.cwd = mem::take(&mut self.new_cwd);
                self.make_dir_msg(text, code);
                Step::Next(self.start_dir_actions())
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_cwd_full_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            250 | 200 | 257 => {
                self.cwd = mem::take(&mut self.new_cwd);
                self.path.set_status(FtpPathStatus::Directory);
                self.make_dir_msg(text, code);
                Step::Next(self.decide_type_or_mode(self.passive_command()))
            }
            550 | 553 | 501 | 530 if self.request.is_some() => {
                self.fall_back_to_segments();
                Step::Next(PendingCommand::CwdHome)
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_cdup_reply(&mut self, code: u16, text: &str) -> Step {
        match code {
            250 | 200 | 257 => {
                self.cwd = mem::take(&mut self.new_cwd);
                self.make_dir_msg(text, code);
                self.path.set_status(FtpPathStatus::File);
                let next = if self.data_conn != DataConnection::None {
                    self.transfer_command()
                } else {
                    self.passive_command()
                };
                Step::Next(self.decide_type_or_mode(next))
            }
            _ => self.map_status(code, text),
        }
    }

    fn on_transfer_reply(&mut self, code: u16, text: &str, src: &mut dyn FtpRequestSource) -> Step {
        match code {
            125 | 150 => {
                if self.pending == PendingCommand::Retr && self.tried_full_path {
                    self.caps.disable_full_path();
                }
                self.send_header();
                Step::Next(PendingCommand::Nothing)
            }
            226 | 250 => {
                if self.pending == PendingCommand::List && self.tried_full_path {
                    self.caps.disable_full_path();
                }
                self.transfer_complete(src);
                Step::Done
            }
            550 if self.pending == PendingCommand::List
                && !self.cwd.is_empty()
                && self.cwd != "/" =>
            {
                // some servers let a CWD into a file succeed
                Step::Next(PendingCommand::Cdup)
            }
            100..=199 | 421 => self.map_status(code, text),
            _ if self.request.is_some()
                && self.pending != PendingCommand::Retr
                && self.full_path_active() =>
            {
                self.fall_back_to_segments();
                if self.pending == PendingCommand::List && self.is_absolute() {
                    Step::Next(PendingCommand::CwdRoot)
                } else {
                    Step::Next(PendingCommand::CwdHome)
                }
            }
            _ => self.map_status(code, text),
        }
    }

    /// Give up on full path addressing for the current request and walk the
    /// path from the start.
    fn fall_back_to_segments(&mut self) {
        debug!("ftp control: full path rejected, walking the path");
        self.close_data_connection();
        self.path.reset();
        self.tried_full_path = true;
    }
}
