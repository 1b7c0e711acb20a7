/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv4Addr};

use crate::FtpPortSet;
use crate::error::FtpPassiveError;

/// Ports never connected to for data unless explicitly permitted.
const RESTRICTED_PORTS: &[u16] = &[
    1, 7, 9, 11, 13, 15, 17, 19, 20, 21, 22, 23, 25, 37, 42, 43, 53, 77, 79, 87, 95, 101, 102,
    103, 104, 109, 110, 111, 113, 115, 117, 119, 123, 135, 139, 143, 179, 389, 465, 512, 513, 514,
    515, 526, 530, 531, 532, 540, 556, 563, 587, 601,
];

const FTP_CONTROL_PORT: u16 = 21;

/// The endpoint the server is listening on for the data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpPassiveEndpoint {
    /// Only PASV replies carry an address, EPSV inherits the control peer.
    ip: Option<IpAddr>,
    port: u16,
}

impl FtpPassiveEndpoint {
    #[inline]
    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Parse a 227 reply.
    ///
    /// The six numbers are searched backward from the end of the reply, as
    /// servers differ in what they put around them.
    pub fn parse_pasv(reply: &str) -> Result<Self, FtpPassiveError> {
        let line = reply.lines().next().ok_or(FtpPassiveError::InvalidPasvReply)?;
        let b = line.as_bytes();

        let Some(last_digit) = b.iter().rposition(|c| c.is_ascii_digit()) else {
            return Err(FtpPassiveError::InvalidPasvReply);
        };
        let start = b[..=last_digit]
            .iter()
            .rposition(|c| !(c.is_ascii_digit() || *c == b','))
            .map(|p| p + 1)
            .unwrap_or(0);
        // the reply code itself is never part of the numbers
        if start == 0 {
            return Err(FtpPassiveError::InvalidPasvReply);
        }

        let mut nums = [0u8; 6];
        let mut count = 0;
        for part in line[start..=last_digit].split(',') {
            if count >= 6 {
                break;
            }
            nums[count] = part
                .parse::<u8>()
                .map_err(|_| FtpPassiveError::InvalidPasvReply)?;
            count += 1;
        }
        if count < 6 {
            return Err(FtpPassiveError::InvalidPasvReply);
        }

        let ip = Ipv4Addr::new(nums[0], nums[1], nums[2], nums[3]);
        let port = ((nums[4] as u16) << 8) | (nums[5] as u16);
        Ok(FtpPassiveEndpoint {
            ip: Some(IpAddr::V4(ip)),
            port,
        })
    }

    /// Parse a 229 reply, `(<d><d><d><port><d>)` with an optional host field
    /// between the first delimiters.
    pub fn parse_epsv(reply: &str) -> Result<Self, FtpPassiveError> {
        let line = reply.lines().next().ok_or(FtpPassiveError::InvalidEpsvReply)?;
        let Some(p) = memchr::memchr(b'(', line.as_bytes()) else {
            return Err(FtpPassiveError::InvalidEpsvReply);
        };
        let left = &line[p + 1..];
        let Some(delimiter) = left.chars().next() else {
            return Err(FtpPassiveError::InvalidEpsvReply);
        };
        if delimiter.is_ascii_digit() || delimiter == ')' {
            return Err(FtpPassiveError::InvalidEpsvReply);
        }
        let Some(end) = left.find(')') else {
            return Err(FtpPassiveError::InvalidEpsvReply);
        };

        let parts: Vec<&str> = left[..end].split(delimiter).collect();
        // "", proto, host, port, ""
        if parts.len() != 5 || !parts[0].is_empty() || !parts[4].is_empty() {
            return Err(FtpPassiveError::InvalidEpsvReply);
        }
        let port = parts[3]
            .parse::<u16>()
            .map_err(|_| FtpPassiveError::InvalidEpsvReply)?;
        if port == 0 {
            return Err(FtpPassiveError::InvalidEpsvReply);
        }
        Ok(FtpPassiveEndpoint { ip: None, port })
    }

    /// Check the endpoint before connecting to it.
    ///
    /// The address has to be the one of the control connection peer, and the
    /// port must not be a well known service port unless it is permitted.
    pub fn validate(
        &self,
        control_peer: Option<IpAddr>,
        permitted: &FtpPortSet,
    ) -> Result<(), FtpPassiveError> {
        if let (Some(ip), Some(peer)) = (self.ip, control_peer)
            && ip != to_canonical(peer)
        {
            return Err(FtpPassiveError::AddressMismatch(ip, peer));
        }
        check_data_port(self.port, permitted)
    }
}

fn to_canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => ip,
        },
        v4 => v4,
    }
}

pub fn is_restricted_port(port: u16) -> bool {
    RESTRICTED_PORTS.binary_search(&port).is_ok()
}

pub(crate) fn check_data_port(port: u16, permitted: &FtpPortSet) -> Result<(), FtpPassiveError> {
    if port == FTP_CONTROL_PORT {
        return Err(FtpPassiveError::RestrictedPort(port));
    }
    if is_restricted_port(port) && !permitted.contains(port) {
        return Err(FtpPassiveError::RestrictedPort(port));
    }
    Ok(())
}
