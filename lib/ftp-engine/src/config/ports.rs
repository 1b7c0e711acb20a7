/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use rustc_hash::FxHashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FtpPortSetParseError {
    #[error("#{0} is not a valid port")]
    InvalidPort(usize),
    #[error("#{0} has start port greater than end port")]
    ReversedRange(usize),
    #[error("#{0} contains too many '-'")]
    TooManyDash(usize),
}

/// Ports a server may use for data connections even though they are in the
/// restricted list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FtpPortSet(FxHashSet<u16>);

impl FtpPortSet {
    pub fn add_single(&mut self, port: u16) {
        self.0.insert(port);
    }

    pub fn add_range(&mut self, start: u16, end: u16) {
        self.0.extend(start..=end);
    }

    pub fn merge(&mut self, other: FtpPortSet) {
        self.0.extend(other.0);
    }

    #[inline]
    pub fn contains(&self, port: u16) -> bool {
        self.0.contains(&port)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for FtpPortSet {
    type Err = FtpPortSetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ports = FtpPortSet::default();
        if s.trim().is_empty() {
            return Ok(ports);
        }

        for (i, part) in s.split(',').enumerate() {
            let parse_port =
                |v: &str| u16::from_str(v.trim()).map_err(|_| FtpPortSetParseError::InvalidPort(i));

            let mut sd = part.split('-');
            let first = sd.next().unwrap_or_default();
            match (sd.next(), sd.next()) {
                (None, _) => ports.add_single(parse_port(first)?),
                (Some(second), None) => {
                    let start = parse_port(first)?;
                    let end = parse_port(second)?;
                    if start > end {
                        return Err(FtpPortSetParseError::ReversedRange(i));
                    }
                    ports.add_range(start, end);
                }
                (Some(_), Some(_)) => return Err(FtpPortSetParseError::TooManyDash(i)),
            }
        }

        Ok(ports)
    }
}
