/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

pub const FTP_DEFAULT_PORT: u16 = 21;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FtpServerAddrParseError {
    #[error("empty host")]
    EmptyHost,
    #[error("invalid port")]
    InvalidPort,
    #[error("invalid ipv6 literal")]
    InvalidIpv6,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FtpServerHost {
    Ip(IpAddr),
    Domain(Arc<str>),
}

impl fmt::Display for FtpServerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpServerHost::Ip(IpAddr::V4(ip)) => write!(f, "{ip}"),
            FtpServerHost::Ip(IpAddr::V6(ip)) => write!(f, "[{ip}]"),
            FtpServerHost::Domain(d) => f.write_str(d),
        }
    }
}

/// Address of an FTP server, the key every per server state is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FtpServerAddr {
    host: FtpServerHost,
    port: u16,
}

impl FtpServerAddr {
    pub fn new(host: FtpServerHost, port: u16) -> Self {
        FtpServerAddr { host, port }
    }

    #[inline]
    pub fn host(&self) -> &FtpServerHost {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The same host with another port, as used for passive data connections.
    pub fn with_port(&self, port: u16) -> Self {
        FtpServerAddr {
            host: self.host.clone(),
            port,
        }
    }
}

impl fmt::Display for FtpServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn parse_port(s: &str) -> Result<u16, FtpServerAddrParseError> {
    match u16::from_str(s) {
        Ok(0) | Err(_) => Err(FtpServerAddrParseError::InvalidPort),
        Ok(p) => Ok(p),
    }
}

impl FromStr for FtpServerAddr {
    type Err = FtpServerAddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FtpServerAddrParseError::EmptyHost);
        }

        if let Some(left) = s.strip_prefix('[') {
            let Some((ip6, rest)) = left.split_once(']') else {
                return Err(FtpServerAddrParseError::InvalidIpv6);
            };
            let ip = IpAddr::from_str(ip6).map_err(|_| FtpServerAddrParseError::InvalidIpv6)?;
            let port = match rest.strip_prefix(':') {
                Some(p) => parse_port(p)?,
                None if rest.is_empty() => FTP_DEFAULT_PORT,
                None => return Err(FtpServerAddrParseError::InvalidPort),
            };
            return Ok(FtpServerAddr::new(FtpServerHost::Ip(ip), port));
        }

        if let Ok(ip) = IpAddr::from_str(s) {
            // bare ipv6 literal without port
            return Ok(FtpServerAddr::new(FtpServerHost::Ip(ip), FTP_DEFAULT_PORT));
        }

        let (host, port) = match s.rsplit_once(':') {
            Some((h, p)) => (h, parse_port(p)?),
            None => (s, FTP_DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(FtpServerAddrParseError::EmptyHost);
        }
        let host = match IpAddr::from_str(host) {
            Ok(ip) => FtpServerHost::Ip(ip),
            Err(_) => FtpServerHost::Domain(Arc::from(host.to_ascii_lowercase())),
        };
        Ok(FtpServerAddr::new(host, port))
    }
}
