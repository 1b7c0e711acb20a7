/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::error::Elapsed;
use tokio::time::{Instant, MissedTickBehavior};

use crate::manager::{BoxFtpTransferReceiver, FtpServerShared, FtpTransfer};
use crate::{
    BlockModeDecoder, FtpAction, FtpCommandLine, FtpConnectionProvider, FtpControlMachine,
    FtpDataMode, FtpErrorKind, FtpPassiveEndpoint, FtpRequest, FtpRequestError,
    FtpRequestSource, FtpServerAddr, FtpServerHost, FtpSessionError,
};

const CONTROL_READ_BUFFER_SIZE: usize = 4096;

type DataConnectFuture<'a, S, E> =
    Pin<Box<dyn Future<Output = Result<Result<S, E>, Elapsed>> + Send + 'a>>;

/// Requests for the machine come from the shared queue of the server, and
/// their receivers are kept by the session until the request is reported.
struct SessionSource<'s> {
    shared: &'s FtpServerShared,
    receivers: &'s mut FxHashMap<u64, BoxFtpTransferReceiver>,
    keep_idle: bool,
}

impl<'s> SessionSource<'s> {
    fn new(
        shared: &'s FtpServerShared,
        receivers: &'s mut FxHashMap<u64, BoxFtpTransferReceiver>,
        keep_idle: bool,
    ) -> Self {
        SessionSource {
            shared,
            receivers,
            keep_idle,
        }
    }
}

impl FtpRequestSource for SessionSource<'_> {
    fn next_request(&mut self) -> Option<FtpRequest> {
        let FtpTransfer { request, receiver } = self.shared.pop_transfer()?;
        self.receivers.insert(request.id(), receiver);
        Some(request)
    }

    fn allow_idle(&self) -> bool {
        self.keep_idle && self.shared.allow_idle_session()
    }
}

async fn read_data<S>(data: &mut Option<S>, buf: &mut [u8]) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    match data {
        Some(stream) => stream.read(buf).await,
        None => futures_util::future::pending().await,
    }
}

async fn wait_connect<S, E>(
    connecting: &mut Option<DataConnectFuture<'_, S, E>>,
) -> Result<Result<S, E>, Elapsed> {
    match connecting {
        Some(fut) => fut.await,
        None => futures_util::future::pending().await,
    }
}

async fn wait_request(shared: &FtpServerShared, idle: bool) {
    if idle {
        shared.notify.notified().await
    } else {
        futures_util::future::pending::<()>().await
    }
}

/// The IO side of one control connection, carrying out the actions of its
/// control machine.
pub(crate) struct FtpSession<'a, CP, S, E> {
    shared: &'a FtpServerShared,
    provider: &'a CP,
    keep_idle: bool,
    machine: FtpControlMachine,
    receivers: FxHashMap<u64, BoxFtpTransferReceiver>,

    control_reader: ReadHalf<S>,
    control_writer: WriteHalf<S>,
    control_buf: Vec<u8>,

    data: Option<S>,
    connecting: Option<DataConnectFuture<'a, S, E>>,
    data_mode: FtpDataMode,
    data_buf: Vec<u8>,
    decoder: BlockModeDecoder,
    /// Raw block mode bytes not decoded yet.
    stashed: Vec<u8>,
    decoded: Vec<u8>,
}

impl<'a, CP, S, E> FtpSession<'a, CP, S, E>
where
    CP: FtpConnectionProvider<S, E> + Sync,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'a,
    E: std::error::Error + Send + 'a,
{
    /// Open the control connection for the first request.
    ///
    /// If that fails the request is reported as failed right here.
    pub(crate) async fn connect(
        shared: &'a FtpServerShared,
        provider: &'a CP,
        transfer: FtpTransfer,
        keep_idle: bool,
    ) -> Result<Self, FtpSessionError<E>> {
        let FtpTransfer {
            request,
            mut receiver,
        } = transfer;

        let r = tokio::select! {
            biased;

            _ = shared.cancel.cancelled() => Err((FtpErrorKind::Aborted, FtpSessionError::Aborted)),
            r = tokio::time::timeout(
                shared.config.connect_timeout,
                provider.new_control_connection(&shared.server),
            ) => match r {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err((FtpErrorKind::ConnectFailed, FtpSessionError::ConnectIoError(e))),
                Err(_) => Err((FtpErrorKind::ConnectFailed, FtpSessionError::ConnectTimedOut)),
            },
        };
        let (stream, peer) = match r {
            Ok(v) => v,
            Err((kind, e)) => {
                warn!("ftp server {}: {e}", shared.server);
                receiver.on_failed(request, FtpRequestError::new(kind)).await;
                return Err(e);
            }
        };
        debug!(
            "ftp server {}: control connection established, peer {peer:?}",
            shared.server
        );

        let mut receivers = FxHashMap::default();
        receivers.insert(request.id(), receiver);
        let machine =
            FtpControlMachine::new(shared.config.clone(), shared.caps.clone(), peer, request);
        let (control_reader, control_writer) = tokio::io::split(stream);

        Ok(FtpSession {
            shared,
            provider,
            keep_idle,
            machine,
            receivers,
            control_reader,
            control_writer,
            control_buf: vec![0u8; CONTROL_READ_BUFFER_SIZE],
            data: None,
            connecting: None,
            data_mode: FtpDataMode::Stream,
            data_buf: vec![0u8; shared.config.transfer.read_buffer_size.max(512)],
            decoder: BlockModeDecoder::default(),
            stashed: Vec::new(),
            decoded: Vec::new(),
        })
    }

    pub(crate) async fn into_running(mut self) -> Result<(), FtpSessionError<E>> {
        let idle_timeout = self
            .shared
            .config
            .control
            .idle_timeout
            .max(Duration::from_secs(1));
        let mut idle_check = tokio::time::interval_at(Instant::now() + idle_timeout, idle_timeout);
        idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let idle = self.machine.is_idle();

            let actions = tokio::select! {
                biased;

                _ = self.shared.cancel.cancelled() => {
                    debug!("ftp server {}: session aborted", self.shared.server);
                    let actions = self.machine.abort();
                    self.handle_actions(actions).await?;
                    return Err(FtpSessionError::Aborted);
                }
                r = self.control_reader.read(&mut self.control_buf) => {
                    match r {
                        Ok(0) => {
                            debug!("ftp server {}: control connection closed by peer", self.shared.server);
                            self.machine.on_control_closed()
                        }
                        Ok(n) => {
                            let mut src = SessionSource::new(self.shared, &mut self.receivers, self.keep_idle);
                            self.machine.feed(&self.control_buf[..n], &mut src)
                        }
                        Err(e) => {
                            let actions = self.machine.on_control_closed();
                            self.handle_actions(actions).await?;
                            return Err(FtpSessionError::RecvFailed(e));
                        }
                    }
                }
                r = wait_connect(&mut self.connecting) => {
                    self.connecting = None;
                    match r {
                        Ok(Ok(stream)) => {
                            crate::log_msg!("data connection established, mode {:?}", self.data_mode);
                            self.data = Some(stream);
                            self.machine.on_data_connected()
                        }
                        Ok(Err(e)) => {
                            warn!("ftp server {}: data connection failed: {e}", self.shared.server);
                            self.machine.on_data_failed(false)
                        }
                        Err(_) => {
                            warn!("ftp server {}: timed out to open data connection", self.shared.server);
                            self.machine.on_data_failed(true)
                        }
                    }
                }
                r = read_data(&mut self.data, &mut self.data_buf) => {
                    match r {
                        Ok(0) => {
                            self.reset_data_connection();
                            let mut src = SessionSource::new(self.shared, &mut self.receivers, self.keep_idle);
                            self.machine.on_data_closed(&mut src)
                        }
                        Ok(n) => self.recv_data(n).await?,
                        Err(e) => {
                            warn!("ftp server {}: data connection read failed: {e}", self.shared.server);
                            self.reset_data_connection();
                            self.machine.on_data_failed(false)
                        }
                    }
                }
                _ = wait_request(self.shared, idle) => {
                    let mut src = SessionSource::new(self.shared, &mut self.receivers, self.keep_idle);
                    self.machine.poll_request(&mut src)
                }
                _ = idle_check.tick() => self.machine.check_idle(Instant::now()),
            };

            self.handle_actions(actions).await?;
            if self.machine.is_closed() {
                break;
            }
        }

        if let Err(e) = self.control_writer.shutdown().await {
            debug!(
                "ftp server {}: failed to shutdown control connection: {e}",
                self.shared.server
            );
        }
        Ok(())
    }

    fn reset_data_connection(&mut self) {
        self.data = None;
        self.connecting = None;
        self.decoder.reset();
        self.stashed.clear();
    }

    /// Handle `n` bytes read into the data buffer, returning what the machine
    /// wants done before the data is delivered.
    async fn recv_data(&mut self, n: usize) -> Result<Vec<FtpAction>, FtpSessionError<E>> {
        let Some(request_id) = self.machine.current_request_id() else {
            debug!(
                "ftp server {}: {n} bytes of data without request dropped",
                self.shared.server
            );
            return Ok(Vec::new());
        };

        match self.data_mode {
            FtpDataMode::Stream => {
                let actions = self.machine.on_data_received();
                self.handle_actions(actions).await?;
                if let Some(receiver) = self.receivers.get_mut(&request_id) {
                    receiver.recv_data(&self.data_buf[..n]).await;
                }
            }
            FtpDataMode::Block => {
                self.stashed.extend_from_slice(&self.data_buf[..n]);
                if self.decode_stashed() {
                    let actions = self.machine.on_data_received();
                    self.handle_actions(actions).await?;
                    self.deliver_decoded(request_id).await;
                }
            }
        }
        Ok(Vec::new())
    }

    /// Decode what belongs to the current file, returns whether there is
    /// payload to deliver.
    fn decode_stashed(&mut self) -> bool {
        self.decoded.clear();
        if self.decoder.end_of_file() {
            return false;
        }
        let consumed = self.decoder.decode(&self.stashed, &mut self.decoded);
        self.stashed.drain(..consumed);
        !self.decoded.is_empty()
    }

    async fn deliver_decoded(&mut self, request_id: u64) {
        if let Some(receiver) = self.receivers.get_mut(&request_id) {
            receiver.recv_data(&self.decoded).await;
        }
        self.decoded.clear();
    }

    /// The server has confirmed a block mode transfer, read the rest of its
    /// data. Returns false if the data connection is gone afterwards.
    async fn wait_block_end(&mut self, request_id: u64) -> bool {
        let end_wait = self.shared.config.transfer.end_wait_timeout;
        let r = tokio::time::timeout(end_wait, async {
            while !self.decoder.end_of_file() {
                let Some(data) = self.data.as_mut() else {
                    return false;
                };
                match data.read(&mut self.data_buf).await {
                    Ok(0) => return false,
                    Ok(n) => {
                        self.stashed.extend_from_slice(&self.data_buf[..n]);
                        if self.decode_stashed() {
                            self.deliver_decoded(request_id).await;
                        }
                    }
                    Err(e) => {
                        warn!(
                            "ftp server {}: data connection read failed: {e}",
                            self.shared.server
                        );
                        return false;
                    }
                }
            }
            true
        })
        .await;
        match r {
            Ok(keep) => keep,
            Err(_) => {
                warn!(
                    "ftp server {}: timed out to wait the end of block data",
                    self.shared.server
                );
                false
            }
        }
    }

    fn data_server_addr(&self, endpoint: &FtpPassiveEndpoint) -> FtpServerAddr {
        let host = match endpoint.ip().or(self.machine.control_peer()) {
            Some(ip) => FtpServerHost::Ip(ip),
            None => self.shared.server.host().clone(),
        };
        FtpServerAddr::new(host, endpoint.port())
    }

    async fn send_line(&mut self, line: &FtpCommandLine) -> io::Result<()> {
        self.control_writer.write_all(&line.to_wire()).await?;
        self.control_writer.flush().await
    }

    async fn handle_actions(&mut self, actions: Vec<FtpAction>) -> Result<(), FtpSessionError<E>> {
        let mut actions = VecDeque::from(actions);
        let mut send_error = None;

        while let Some(action) = actions.pop_front() {
            match action {
                FtpAction::Send(line) => {
                    if send_error.is_some() {
                        continue;
                    }
                    if let Err(e) = self.send_line(&line).await {
                        warn!(
                            "ftp server {}: failed to send {line}: {e}",
                            self.shared.server
                        );
                        actions.extend(self.machine.on_control_closed());
                        send_error = Some(e);
                    }
                }
                FtpAction::OpenDataConnection { endpoint, mode } => {
                    self.reset_data_connection();
                    self.data_mode = mode;
                    let addr = self.data_server_addr(&endpoint);
                    crate::log_msg!("connecting data connection to {}", addr);
                    let provider = self.provider;
                    let connect_timeout = self.shared.config.transfer.passive_connect_timeout;
                    self.connecting = Some(Box::pin(async move {
                        tokio::time::timeout(connect_timeout, provider.new_data_connection(&addr))
                            .await
                    }));
                }
                FtpAction::CloseDataConnection => self.reset_data_connection(),
                FtpAction::HeaderAvailable { request_id, facts } => {
                    if let Some(receiver) = self.receivers.get_mut(&request_id) {
                        receiver.on_header(&facts).await;
                    }
                }
                FtpAction::RequestFinished(request) => {
                    let request_id = request.id();
                    if self.data_mode == FtpDataMode::Block && !self.decoder.end_of_file() {
                        // the reply may be faster than the data connection
                        if self.data.is_none()
                            && let Some(connecting) = self.connecting.take()
                            && let Ok(Ok(stream)) = connecting.await
                        {
                            self.data = Some(stream);
                            actions.extend(self.machine.on_data_connected());
                        }
                        if !self.wait_block_end(request_id).await {
                            self.reset_data_connection();
                            let mut src = SessionSource::new(
                                self.shared,
                                &mut self.receivers,
                                self.keep_idle,
                            );
                            actions.extend(self.machine.on_data_closed(&mut src));
                        }
                    }
                    self.decoder.reset();
                    if let Some(mut receiver) = self.receivers.remove(&request_id) {
                        receiver.on_finished(request).await;
                    }
                }
                FtpAction::RequestFailed(request, e) => {
                    if let Some(mut receiver) = self.receivers.remove(&request.id()) {
                        receiver.on_failed(request, e).await;
                    }
                }
                FtpAction::RequeueRequest(request) => {
                    match self.receivers.remove(&request.id()) {
                        Some(receiver) => self.shared.requeue(FtpTransfer { request, receiver }),
                        None => warn!(
                            "ftp server {}: no receiver found for requeued request {}",
                            self.shared.server,
                            request.id()
                        ),
                    }
                }
                FtpAction::Close => self.reset_data_connection(),
            }
        }

        match send_error {
            Some(e) => Err(FtpSessionError::SendFailed(e)),
            None => Ok(()),
        }
    }
}
