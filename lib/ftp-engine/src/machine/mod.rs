/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::mem;
use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, warn};
use tokio::time::Instant;

use crate::control::directory_message;
use crate::error::{FtpErrorKind, FtpRequestError};
use crate::path::{FtpPathResolver, FtpPathStatus};
use crate::{
    FtpClientConfig, FtpPassiveEndpoint, FtpReplyBuffer, FtpRequest, FtpServerCapabilities,
    FtpTypeCode, PendingCommand,
};

mod action;
pub use action::{FtpAction, FtpDataMode, FtpRequestSource};

mod compose;
mod transition;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FtpTransferType {
    Ascii,
    Image,
}

impl FtpTransferType {
    fn as_param(&self) -> &'static str {
        match self {
            FtpTransferType::Ascii => "A",
            FtpTransferType::Image => "I",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataConnection {
    None,
    Connecting,
    Open,
}

/// The control connection protocol of one session, without any IO.
///
/// Every input returns the list of actions the driver has to carry out, in
/// order. The machine keeps at most one command in flight, and owns the
/// request it is working on until it is reported back through an action.
pub struct FtpControlMachine {
    config: Arc<FtpClientConfig>,
    caps: Arc<FtpServerCapabilities>,
    control_peer: Option<IpAddr>,
    replies: FtpReplyBuffer,

    pending: PendingCommand,
    request: Option<FtpRequest>,
    path: FtpPathResolver,
    cwd: String,
    new_cwd: String,
    start_path: Option<String>,

    current_type: Option<FtpTransferType>,
    data_mode: FtpDataMode,
    data_conn: DataConnection,
    passive_used: Option<PendingCommand>,

    tried_full_path: bool,
    connection_active: bool,
    accept_requests: bool,
    need_transfer_finished: bool,
    received_transfer_finished: bool,
    header_sent: bool,
    skip_cwd_after_size: bool,

    last_active: Instant,
    closed: bool,
    actions: Vec<FtpAction>,
}

impl FtpControlMachine {
    /// Create the machine for a new control connection, with the request
    /// that made the connection necessary.
    ///
    /// Nothing is sent before the greeting of the server.
    pub fn new(
        config: Arc<FtpClientConfig>,
        caps: Arc<FtpServerCapabilities>,
        control_peer: Option<IpAddr>,
        request: FtpRequest,
    ) -> Self {
        let replies = FtpReplyBuffer::new(config.control.max_reply_size);
        let mut machine = FtpControlMachine {
            config,
            caps,
            control_peer,
            replies,
            pending: PendingCommand::Nothing,
            request: None,
            path: FtpPathResolver::default(),
            cwd: String::new(),
            new_cwd: String::new(),
            start_path: None,
            current_type: None,
            data_mode: FtpDataMode::Stream,
            data_conn: DataConnection::None,
            passive_used: None,
            tried_full_path: false,
            connection_active: false,
            accept_requests: true,
            need_transfer_finished: false,
            received_transfer_finished: false,
            header_sent: false,
            skip_cwd_after_size: false,
            last_active: Instant::now(),
            closed: false,
            actions: Vec::new(),
        };
        machine.set_new_request(request, false);
        machine
    }

    #[inline]
    pub fn pending(&self) -> PendingCommand {
        self.pending
    }

    #[inline]
    pub fn current_request_id(&self) -> Option<u64> {
        self.request.as_ref().map(|r| r.id())
    }

    #[inline]
    pub fn data_mode(&self) -> FtpDataMode {
        self.data_mode
    }

    #[inline]
    pub fn control_peer(&self) -> Option<IpAddr> {
        self.control_peer
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The working directory relative to the login directory, or absolute if
    /// it starts with a slash.
    #[inline]
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Whether the session is logged in and waiting for a new request.
    pub fn is_idle(&self) -> bool {
        !self.closed
            && self.connection_active
            && self.accept_requests
            && self.request.is_none()
            && self.pending == PendingCommand::Nothing
    }

    fn take_actions(&mut self) -> Vec<FtpAction> {
        mem::take(&mut self.actions)
    }

    /// Bytes received on the control connection.
    pub fn feed(&mut self, data: &[u8], src: &mut dyn FtpRequestSource) -> Vec<FtpAction> {
        if self.closed {
            return Vec::new();
        }
        self.last_active = Instant::now();

        if let Err(e) = self.replies.append(data) {
            warn!("ftp control: {e}");
            self.fail_and_close(FtpRequestError::from(e));
            return self.take_actions();
        }

        while let Some(code) = self.replies.check_reply() {
            let text = self.replies.reply_text().into_owned();
            #[cfg(feature = "log-raw-io")]
            crate::debug::log_rsp(&text);
            self.on_reply(code, &text, src);
            self.replies.move_to_next_reply();
            if self.closed {
                break;
            }
        }
        self.take_actions()
    }

    pub fn on_data_connected(&mut self) -> Vec<FtpAction> {
        if self.data_conn == DataConnection::Connecting {
            self.data_conn = DataConnection::Open;
            self.last_active = Instant::now();
            if self.passive_used == Some(PendingCommand::Epsv) {
                self.caps.set_epsv_tested();
            }
        }
        self.take_actions()
    }

    /// Payload received on the data connection.
    pub fn on_data_received(&mut self) -> Vec<FtpAction> {
        self.last_active = Instant::now();
        if !self.header_sent && self.pending.is_transfer() {
            self.send_header();
        }
        self.take_actions()
    }

    /// The data connection reached its end.
    pub fn on_data_closed(&mut self, src: &mut dyn FtpRequestSource) -> Vec<FtpAction> {
        let was_open = self.data_conn != DataConnection::None;
        self.data_conn = DataConnection::None;
        if !was_open || self.closed {
            return self.take_actions();
        }

        if self.request.is_some() {
            if self.pending == PendingCommand::Nothing && self.received_transfer_finished {
                self.finish_request();
                self.start_next_request(src);
            } else if self.pending.is_transfer() {
                // an empty transfer, the 226 reply is yet to come
                self.send_header();
            }
        }
        self.take_actions()
    }

    /// The data connection could not be established, or broke.
    pub fn on_data_failed(&mut self, timed_out: bool) -> Vec<FtpAction> {
        let old = mem::replace(&mut self.data_conn, DataConnection::None);
        if old == DataConnection::None || self.closed {
            return self.take_actions();
        }

        if old == DataConnection::Connecting
            && self.passive_used == Some(PendingCommand::Epsv)
            && (timed_out || !self.caps.epsv_tested())
        {
            // the server accepts EPSV but the data connection can not be
            // made, let the request go to a session which will use PASV
            self.caps.disable_epsv();
            self.caps.set_epsv_tested();
            self.accept_requests = false;
            if let Some(request) = self.request.take() {
                debug!("ftp request {}: requeued after EPSV failure", request.id());
                self.actions.push(FtpAction::RequeueRequest(request));
            }
            return self.take_actions();
        }

        if let Some(request) = self.request.take() {
            let kind = if old == DataConnection::Connecting {
                FtpErrorKind::CannotOpenPassiveDataConnection
            } else {
                FtpErrorKind::TransferAborted
            };
            self.actions
                .push(FtpAction::RequestFailed(request, FtpRequestError::new(kind)));
        }
        // wait for the reply to the command in flight before quitting
        self.accept_requests = false;
        self.take_actions()
    }

    /// The server closed the control connection.
    pub fn on_control_closed(&mut self) -> Vec<FtpAction> {
        if !self.closed {
            self.shutdown();
        }
        self.take_actions()
    }

    /// Close the session if nothing happened on it for the idle timeout.
    pub fn check_idle(&mut self, now: Instant) -> Vec<FtpAction> {
        if self.closed || self.last_active + self.config.control.idle_timeout > now {
            return self.take_actions();
        }

        debug!("ftp control: idle timeout");
        if let Some(request) = self.request.take() {
            self.actions.push(FtpAction::RequestFailed(
                request,
                FtpRequestError::new(FtpErrorKind::TransferAborted),
            ));
        }
        self.send(PendingCommand::Quit);
        self.close();
        self.take_actions()
    }

    /// Pick up a new request if the session is idle.
    pub fn poll_request(&mut self, src: &mut dyn FtpRequestSource) -> Vec<FtpAction> {
        if self.is_idle()
            && let Some(request) = src.next_request()
        {
            self.set_new_request(request, true);
        }
        self.take_actions()
    }

    /// Stop everything. The current request fails as aborted.
    pub fn abort(&mut self) -> Vec<FtpAction> {
        if self.closed {
            return self.take_actions();
        }
        if let Some(request) = self.request.take() {
            self.actions.push(FtpAction::RequestFailed(
                request,
                FtpRequestError::new(FtpErrorKind::Aborted),
            ));
        }
        self.close();
        self.take_actions()
    }

    fn close(&mut self) {
        self.close_data_connection();
        self.actions.push(FtpAction::Close);
        self.accept_requests = false;
        self.closed = true;
    }

    fn fail_and_close(&mut self, e: FtpRequestError) {
        if let Some(request) = self.request.take() {
            self.actions.push(FtpAction::RequestFailed(request, e));
        }
        self.close();
    }

    fn close_data_connection(&mut self) {
        if self.data_conn != DataConnection::None {
            self.data_conn = DataConnection::None;
            self.actions.push(FtpAction::CloseDataConnection);
        }
    }

    fn send(&mut self, next: PendingCommand) {
        self.pending = next;
        if next == PendingCommand::Nothing {
            return;
        }
        if next.is_transfer()
            && let Some(request) = self.request.as_mut()
        {
            request
                .facts_mut()
                .set_listing(next == PendingCommand::List);
        }

        match self.compose(next) {
            Some(line) => {
                #[cfg(feature = "log-raw-io")]
                crate::debug::log_cmd(line.as_str());
                self.last_active = Instant::now();
                self.actions.push(FtpAction::Send(line));
            }
            None => {
                // the request this command was for is gone
                self.send(PendingCommand::Quit);
            }
        }
    }

    fn send_header(&mut self) {
        if self.header_sent {
            return;
        }
        let Some(request) = self.request.as_mut() else {
            return;
        };
        self.header_sent = true;
        if let Some(p) = &self.start_path {
            request.facts_mut().set_start_path(p);
        }
        self.actions.push(FtpAction::HeaderAvailable {
            request_id: request.id(),
            facts: request.facts().clone(),
        });
    }

    fn finish_request(&mut self) {
        if let Some(request) = self.request.take() {
            debug!("ftp request {}: finished", request.id());
            self.actions.push(FtpAction::RequestFinished(request));
        }
    }

    fn start_next_request(&mut self, src: &mut dyn FtpRequestSource) {
        self.need_transfer_finished = false;
        self.received_transfer_finished = false;

        let next = if self.accept_requests {
            src.next_request()
        } else {
            None
        };
        match next {
            Some(request) => self.set_new_request(request, true),
            None => {
                if !self.accept_requests || !self.config.allow_keep_alive() || !src.allow_idle()
                {
                    self.send(PendingCommand::Quit);
                } else {
                    self.pending = PendingCommand::Nothing;
                }
            }
        }
    }

    fn set_new_request(&mut self, mut request: FtpRequest, autostart: bool) {
        debug!(
            "ftp request {}: attached, path '{}'",
            request.id(),
            request.path()
        );
        self.need_transfer_finished = false;
        self.received_transfer_finished = false;
        self.header_sent = false;
        self.tried_full_path = false;
        self.passive_used = None;

        if request.use_resume() && self.caps.restart_tested() && !self.caps.restart_supported() {
            request.cancel_resume();
        }
        if let Some(p) = &self.start_path {
            request.facts_mut().set_start_path(p);
        }
        self.path.set_path(request.path());
        let typecode = request.typecode();
        self.request = Some(request);

        if !autostart {
            return;
        }

        if self.full_path_active() {
            let next = self.start_dir_actions();
            self.send_step(next);
            return;
        }

        let next = self.segment_start(typecode);
        self.send_step(next);
    }

    /// Where to begin a request walking the path one segment at a time,
    /// reusing the current directory if the path starts with it.
    fn segment_start(&mut self, typecode: FtpTypeCode) -> PendingCommand {
        let path_abs = self.is_absolute();
        let cwd_abs = self.cwd.starts_with('/');
        let cwd_rel = self.cwd.strip_prefix('/').unwrap_or(&self.cwd);

        if cwd_rel.is_empty() && cwd_abs == path_abs {
            return if path_abs {
                PendingCommand::CwdRoot
            } else if self.path.parse_path(typecode) {
                self.size_or_cwd()
            } else {
                self.file_or_passive()
            };
        }

        let reset = if path_abs {
            PendingCommand::CwdRoot
        } else {
            PendingCommand::CwdHome
        };
        if cwd_abs != path_abs || cwd_rel.is_empty() {
            return reset;
        }

        let path = self.path.path();
        let (path_rel, lead) = match path.strip_prefix('/') {
            Some(p) => (p, 1),
            None => (path, 0),
        };
        let Some(rest) = path_rel.strip_prefix(cwd_rel) else {
            return reset;
        };
        if rest.is_empty() || rest == "/" {
            self.path.set_status(FtpPathStatus::Directory);
            return self.decide_type_or_mode(self.passive_command());
        }
        if !rest.starts_with('/') {
            return reset;
        }

        let offset = lead + cwd_rel.len() + 1;
        if self.path.resume_at(offset, typecode) {
            self.size_or_cwd()
        } else {
            self.file_or_passive()
        }
    }

    fn send_step(&mut self, next: PendingCommand) {
        let next = if next.is_passive() && self.data_conn != DataConnection::None {
            self.transfer_command()
        } else {
            next
        };
        self.send(next);
    }

    #[inline]
    fn full_path_active(&self) -> bool {
        !self.tried_full_path && !self.caps.full_path_disabled() && !self.caps.size_disabled()
    }

    fn passive_command(&self) -> PendingCommand {
        if self.caps.epsv_disabled() {
            PendingCommand::Pasv
        } else {
            PendingCommand::Epsv
        }
    }

    fn size_or_cwd(&self) -> PendingCommand {
        if self.caps.size_disabled() || self.path.segment().is_empty() {
            PendingCommand::Cwd
        } else {
            PendingCommand::Size
        }
    }

    fn mdtm_or_passive(&mut self) -> PendingCommand {
        if self.caps.mdtm_disabled() {
            self.decide_type_or_mode(self.passive_command())
        } else {
            PendingCommand::Mdtm
        }
    }

    /// The command which starts the transfer, once a data connection is there.
    fn transfer_command(&self) -> PendingCommand {
        let Some(request) = &self.request else {
            return PendingCommand::Quit;
        };
        if request.typecode() == FtpTypeCode::Directory
            || self.path.status() != FtpPathStatus::File
        {
            PendingCommand::List
        } else if request.use_resume() {
            PendingCommand::Restart
        } else {
            self.retr_command()
        }
    }

    fn retr_command(&self) -> PendingCommand {
        if self.full_path_active() {
            PendingCommand::RetrFull
        } else {
            PendingCommand::Retr
        }
    }

    /// Put TYPE or MODE in front of `action` if the request needs them.
    fn decide_type_or_mode(&mut self, action: PendingCommand) -> PendingCommand {
        let Some((typecode, use_resume)) =
            self.request.as_ref().map(|r| (r.typecode(), r.use_resume()))
        else {
            return PendingCommand::Quit;
        };

        if typecode != FtpTypeCode::Directory {
            let wanted = self.wanted_type();
            let needs_type = match self.current_type {
                None => true,
                Some(current) => {
                    current != wanted
                        && !(current == FtpTransferType::Image && typecode == FtpTypeCode::Auto)
                }
            };
            if needs_type {
                return PendingCommand::Type;
            }
        }

        if !self.caps.mode_disabled() {
            if use_resume && self.data_mode == FtpDataMode::Block {
                self.close_data_connection();
                self.data_mode = FtpDataMode::Stream;
                return PendingCommand::Mode;
            }
            if self.config.transfer.try_block_mode
                && !use_resume
                && self.data_conn == DataConnection::None
                && self.data_mode != FtpDataMode::Block
            {
                self.data_mode = FtpDataMode::Block;
                return PendingCommand::Mode;
            }
        }
        action
    }

    /// The directory setup at the start of a request, after login.
    fn start_dir_actions(&mut self) -> PendingCommand {
        if !self.caps.restart_tested() {
            return PendingCommand::RestartTest;
        }
        if self.current_type.is_none() {
            return PendingCommand::TypeInit;
        }

        if self.full_path_active() {
            let absolute = self.is_absolute();
            if !self.cwd.is_empty() && !absolute {
                return PendingCommand::CwdHome;
            }
            if self.path.path().is_empty() {
                if absolute && self.cwd != "/" {
                    return PendingCommand::CwdRoot;
                }
                self.path.set_status(FtpPathStatus::Directory);
                return self.decide_type_or_mode(self.passive_command());
            }
            if self.path.is_directory_path() {
                self.path.set_status(FtpPathStatus::Directory);
                return PendingCommand::CwdFull;
            }
            self.path.set_status(FtpPathStatus::File);
            return PendingCommand::SizeFull;
        }

        self.path.reset();
        let Some(typecode) = self.request.as_ref().map(|r| r.typecode()) else {
            return PendingCommand::Quit;
        };
        if self.is_absolute() {
            PendingCommand::CwdRoot
        } else if self.path.parse_path(typecode) {
            self.size_or_cwd()
        } else {
            self.file_or_passive()
        }
    }

    /// Learn size and time of the file before going passive, if not known.
    fn file_or_passive(&mut self) -> PendingCommand {
        let next = self.after_type_or_mode();
        self.decide_type_or_mode(next)
    }

    /// Hand the passive endpoint to the driver and go on with the transfer.
    fn activate_passive(&mut self, endpoint: FtpPassiveEndpoint) -> PendingCommand {
        self.actions.push(FtpAction::OpenDataConnection {
            endpoint,
            mode: self.data_mode,
        });
        self.data_conn = DataConnection::Connecting;
        self.need_transfer_finished = true;
        self.transfer_command()
    }

    fn make_dir_msg(&mut self, text: &str, code: u16) {
        if let Some(request) = self.request.as_mut() {
            request
                .facts_mut()
                .set_directory_message(directory_message(text, code));
        }
    }

    /// The server confirmed the end of the transfer.
    fn transfer_complete(&mut self, src: &mut dyn FtpRequestSource) {
        self.received_transfer_finished = true;
        self.send_header();
        self.pending = PendingCommand::Nothing;
        if self.data_conn != DataConnection::None && self.data_mode == FtpDataMode::Stream {
            // the end of data is the close of the data connection
            return;
        }
        self.finish_request();
        self.start_next_request(src);
    }

    fn fail_request(
        &mut self,
        next: PendingCommand,
        e: FtpRequestError,
        src: &mut dyn FtpRequestSource,
    ) {
        if let Some(request) = self.request.take() {
            debug!("ftp request {}: failed: {e}", request.id());
            self.actions.push(FtpAction::RequestFailed(request, e));
        }
        self.close_data_connection();
        if next == PendingCommand::Quit
            || self.pending != PendingCommand::Nothing
            || !self.connection_active
        {
            self.send(PendingCommand::Quit);
        } else {
            self.start_next_request(src);
        }
    }
}
