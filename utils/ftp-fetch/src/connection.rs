/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tokio::net::{TcpSocket, TcpStream};

use ftp_engine::{FtpConnectionProvider, FtpServerAddr, FtpServerHost};

#[derive(Default)]
pub(crate) struct LocalConnectionProvider {
    bind_ip: Option<IpAddr>,
}

impl LocalConnectionProvider {
    pub(crate) fn set_bind_ip(&mut self, ip: IpAddr) {
        self.bind_ip = Some(ip);
    }

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        if let Some(ip) = self.bind_ip {
            socket.bind(SocketAddr::new(ip, 0))?;
        }
        socket.connect(addr).await
    }
}

#[async_trait]
impl FtpConnectionProvider<TcpStream, io::Error> for LocalConnectionProvider {
    async fn new_control_connection(
        &self,
        server: &FtpServerAddr,
    ) -> io::Result<(TcpStream, Option<IpAddr>)> {
        let mut err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no addr resolved");
        for addr in tokio::net::lookup_host(server.to_string()).await? {
            match self.connect(addr).await {
                Ok(stream) => return Ok((stream, Some(addr.ip()))),
                Err(e) => err = e,
            }
        }

        Err(err)
    }

    async fn new_data_connection(&self, server_addr: &FtpServerAddr) -> io::Result<TcpStream> {
        match server_addr.host() {
            FtpServerHost::Ip(ip) => {
                self.connect(SocketAddr::new(*ip, server_addr.port()))
                    .await
            }
            FtpServerHost::Domain(_) => {
                let mut err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no addr resolved");
                for addr in tokio::net::lookup_host(server_addr.to_string()).await? {
                    match self.connect(addr).await {
                        Ok(stream) => return Ok(stream),
                        Err(e) => err = e,
                    }
                }
                Err(err)
            }
        }
    }
}
