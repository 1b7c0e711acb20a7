/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::session::FtpSession;
use crate::{
    FtpClientConfig, FtpConnectionProvider, FtpRequest, FtpServerAddr, FtpServerCapabilities,
    FtpSessionError, FtpTransferReceiver,
};

pub(crate) type BoxFtpTransferReceiver = Box<dyn FtpTransferReceiver + Send>;

pub(crate) struct FtpTransfer {
    pub(crate) request: FtpRequest,
    pub(crate) receiver: BoxFtpTransferReceiver,
}

pub(crate) struct FtpServerShared {
    pub(crate) server: FtpServerAddr,
    pub(crate) config: Arc<FtpClientConfig>,
    pub(crate) caps: Arc<FtpServerCapabilities>,
    queue: Mutex<VecDeque<FtpTransfer>>,
    pub(crate) notify: Notify,
    active_sessions: AtomicUsize,
    pub(crate) cancel: CancellationToken,
}

impl FtpServerShared {
    pub(crate) fn pop_transfer(&self) -> Option<FtpTransfer> {
        let mut queue = self.queue.lock().unwrap();
        queue.pop_front()
    }

    /// Put a request back at the head of the queue.
    pub(crate) fn requeue(&self, transfer: FtpTransfer) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_front(transfer);
        drop(queue);
        self.notify.notify_one();
    }

    fn queued(&self) -> usize {
        let queue = self.queue.lock().unwrap();
        queue.len()
    }

    #[inline]
    pub(crate) fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Whether a session may stay connected without a request, without going
    /// over the connection limit of the server.
    pub(crate) fn allow_idle_session(&self) -> bool {
        self.active_sessions() <= self.config.max_connections_per_host
    }
}

struct ActiveSessionGuard<'a> {
    shared: &'a FtpServerShared,
}

impl<'a> ActiveSessionGuard<'a> {
    fn new(shared: &'a FtpServerShared) -> Self {
        shared.active_sessions.fetch_add(1, Ordering::Relaxed);
        ActiveSessionGuard { shared }
    }
}

impl Drop for ActiveSessionGuard<'_> {
    fn drop(&mut self) {
        self.shared.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The request queue and the capabilities of one FTP server.
///
/// Sessions started from the same manager share the queue, so a session which
/// is done with its request picks up the next one over the same control
/// connection.
#[derive(Clone)]
pub struct FtpServerManager {
    shared: Arc<FtpServerShared>,
}

impl FtpServerManager {
    pub fn new(server: FtpServerAddr, config: Arc<FtpClientConfig>) -> Self {
        FtpServerManager {
            shared: Arc::new(FtpServerShared {
                server,
                config,
                caps: Arc::new(FtpServerCapabilities::default()),
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                active_sessions: AtomicUsize::new(0),
                cancel: CancellationToken::new(),
            }),
        }
    }

    #[inline]
    pub fn server(&self) -> &FtpServerAddr {
        &self.shared.server
    }

    #[inline]
    pub fn config(&self) -> &FtpClientConfig {
        &self.shared.config
    }

    #[inline]
    pub fn capabilities(&self) -> &Arc<FtpServerCapabilities> {
        &self.shared.caps
    }

    #[inline]
    pub fn active_sessions(&self) -> usize {
        self.shared.active_sessions()
    }

    pub fn pending_requests(&self) -> usize {
        self.shared.queued()
    }

    /// Queue a request, an idle session will be woken up to serve it.
    pub fn add_request(&self, request: FtpRequest, receiver: Box<dyn FtpTransferReceiver + Send>) {
        debug!(
            "ftp server {}: request {} queued",
            self.shared.server,
            request.id()
        );
        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(FtpTransfer { request, receiver });
        drop(queue);
        self.shared.notify.notify_one();
    }

    /// Abort all sessions. Requests attached to them fail as aborted.
    pub fn abort(&self) {
        self.shared.cancel.cancel();
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Run one session, beginning with the first queued request.
    ///
    /// With `keep_idle` set the session stays connected after the queue is
    /// drained, waiting for more requests until the idle timeout.
    pub async fn run_session<CP, S, E>(
        &self,
        provider: &CP,
        keep_idle: bool,
    ) -> Result<(), FtpSessionError<E>>
    where
        CP: FtpConnectionProvider<S, E> + Sync,
        S: AsyncRead + AsyncWrite + Unpin + Send,
        E: std::error::Error + Send,
    {
        let Some(transfer) = self.shared.pop_transfer() else {
            return Ok(());
        };
        let _guard = ActiveSessionGuard::new(&self.shared);
        FtpSession::connect(&self.shared, provider, transfer, keep_idle)
            .await?
            .into_running()
            .await
    }

    /// Serve all queued requests, with up to the per host connection limit of
    /// sessions in parallel, and return once the queue is empty.
    ///
    /// A new session is started whenever a slot is free and requests are
    /// queued, which includes requests put back by a session that gave up on
    /// them. Errors of single sessions have already been reported to the
    /// requests attached to them, so they are only logged here.
    pub async fn run_until_idle<CP, S, E>(&self, provider: &CP)
    where
        CP: FtpConnectionProvider<S, E> + Sync,
        S: AsyncRead + AsyncWrite + Unpin + Send,
        E: std::error::Error + Send,
    {
        let limit = self.shared.config.max_connections_per_host.max(1);
        let mut sessions = FuturesUnordered::new();

        loop {
            if self.is_aborted() {
                while let Some(r) = sessions.next().await {
                    self.log_session_end(r);
                }
                self.fail_queued().await;
                return;
            }

            let free = limit.saturating_sub(sessions.len());
            for _ in 0..self.pending_requests().min(free) {
                sessions.push(self.run_session(provider, false));
            }
            if sessions.is_empty() {
                return;
            }

            tokio::select! {
                Some(r) = sessions.next() => self.log_session_end(r),
                _ = self.shared.notify.notified() => {}
            }
        }
    }

    fn log_session_end<E: std::error::Error>(&self, r: Result<(), FtpSessionError<E>>) {
        if let Err(e) = r {
            debug!("ftp server {}: session ended: {e}", self.shared.server);
        }
    }

    async fn fail_queued(&self) {
        while let Some(mut transfer) = self.shared.pop_transfer() {
            transfer
                .receiver
                .on_failed(transfer.request, crate::FtpErrorKind::Aborted.into())
                .await;
        }
    }
}
