/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::borrow::Cow;

use crate::error::FtpReplyError;

const BUFFER_GROW_SIZE: usize = 1024;
const BUFFER_MIN_FREE: usize = 513;

macro_rules! char_to_u16 {
    ($c:expr) => {
        ($c - b'0') as u16
    };
}

fn line_code(line: &[u8]) -> Option<u16> {
    if line.len() < 3 {
        return None;
    }
    if !(line[0].is_ascii_digit() && line[1].is_ascii_digit() && line[2].is_ascii_digit()) {
        return None;
    }
    let code = char_to_u16!(line[0]) * 100 + char_to_u16!(line[1]) * 10 + char_to_u16!(line[2]);
    if line.len() > 3 && line[3].is_ascii_digit() {
        return None;
    }
    Some(code)
}

/// Accumulates bytes from the control connection and frames them into replies.
///
/// A reply is found by [`check_reply`](Self::check_reply) and stays the
/// current one until [`move_to_next_reply`](Self::move_to_next_reply) drops
/// its bytes from the buffer.
pub struct FtpReplyBuffer {
    buf: Vec<u8>,
    reply_end: usize,
    code: Option<u16>,
    max_size: usize,
}

impl FtpReplyBuffer {
    pub fn new(max_size: usize) -> Self {
        FtpReplyBuffer {
            buf: Vec::with_capacity(BUFFER_GROW_SIZE),
            reply_end: 0,
            code: None,
            max_size,
        }
    }

    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn append(&mut self, data: &[u8]) -> Result<(), FtpReplyError> {
        if self.buf.len() + data.len() > self.max_size {
            return Err(FtpReplyError::ReplyTooLong(self.max_size));
        }
        let need = BUFFER_MIN_FREE.max(data.len());
        if self.buf.capacity() - self.buf.len() < need {
            self.buf
                .reserve_exact(need.next_multiple_of(BUFFER_GROW_SIZE));
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Get the code of the next complete reply.
    ///
    /// Calling this again without moving to the next reply returns the same
    /// code. Lines that do not start with a reply code are dropped.
    pub fn check_reply(&mut self) -> Option<u16> {
        if self.code.is_some() {
            return self.code;
        }

        loop {
            let first_end = memchr::memchr(b'\n', &self.buf)?;
            let Some(code) = line_code(&self.buf[..first_end]) else {
                self.buf.drain(..=first_end);
                continue;
            };

            if self.buf.get(3) != Some(&b'-') {
                self.reply_end = first_end + 1;
                self.code = Some(code);
                return self.code;
            }

            let mut offset = first_end + 1;
            while let Some(p) = memchr::memchr(b'\n', &self.buf[offset..]) {
                let line = &self.buf[offset..offset + p];
                offset += p + 1;
                if line_code(line) == Some(code) && line.get(3) == Some(&b' ') {
                    self.reply_end = offset;
                    self.code = Some(code);
                    return self.code;
                }
            }
            return None;
        }
    }

    /// The full text of the current reply.
    pub fn reply_text(&self) -> Cow<'_, str> {
        if self.code.is_none() {
            return Cow::Borrowed("");
        }
        String::from_utf8_lossy(&self.buf[..self.reply_end])
    }

    /// Drop the current reply and keep any bytes that follow it.
    pub fn move_to_next_reply(&mut self) {
        if self.code.take().is_none() {
            return;
        }
        if self.reply_end >= self.buf.len() {
            self.buf.clear();
        } else {
            let left = self.buf.len() - self.reply_end;
            self.buf.copy_within(self.reply_end.., 0);
            self.buf.truncate(left);
        }
        self.reply_end = 0;
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.reply_end = 0;
        self.code = None;
    }
}

fn second_token(text: &str) -> Option<&str> {
    let line = text.lines().next()?;
    line.split_ascii_whitespace().nth(1)
}

/// The directory in a 257 reply.
///
/// RFC 959 quotes the path and doubles quotes inside it. Replies without
/// quotes fall back to the first word after the code.
pub(crate) fn parse_pwd_path(text: &str) -> Option<String> {
    let line = text.lines().next()?;
    let Some(start) = memchr::memchr(b'"', line.as_bytes()) else {
        return second_token(text).map(|s| s.to_string());
    };

    let mut path = String::new();
    let mut chars = line[start + 1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                path.push('"');
            } else {
                return Some(path);
            }
        } else {
            path.push(c);
        }
    }
    None
}

/// The file size in a 213 reply.
pub(crate) fn parse_size(text: &str) -> Option<u64> {
    second_token(text)?.parse::<u64>().ok()
}

/// The time-val in a 213 reply to MDTM.
pub(crate) fn parse_mdtm(text: &str) -> Option<&str> {
    let token = second_token(text)?;
    if token.len() > 64 {
        return None;
    }
    Some(token)
}

/// The continuation lines of a multi-line reply, without the code prefix.
pub(crate) fn directory_message(text: &str, code: u16) -> String {
    let mut msg = String::new();
    for line in text.lines().skip(1) {
        let line_bytes = line.as_bytes();
        if line_code(line_bytes) == Some(code) {
            match line_bytes.get(3) {
                Some(b' ') => break,
                Some(b'-') => {
                    msg.push_str(line[4..].trim_end_matches('\r'));
                    msg.push('\n');
                    continue;
                }
                _ => {}
            }
        }
        msg.push_str(line.trim_end_matches('\r'));
        msg.push('\n');
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line() {
        let mut buf = FtpReplyBuffer::new(4096);
        buf.append(b"220 ready\r\n").unwrap();
        assert_eq!(buf.check_reply(), Some(220));
        assert_eq!(buf.reply_text(), "220 ready\r\n");
        buf.move_to_next_reply();
        assert_eq!(buf.check_reply(), None);
        assert_eq!(buf.buffered_len(), 0);
    }

    #[test]
    fn partial_line() {
        let mut buf = FtpReplyBuffer::new(4096);
        buf.append(b"220 rea").unwrap();
        assert_eq!(buf.check_reply(), None);
        buf.append(b"dy\r\n").unwrap();
        assert_eq!(buf.check_reply(), Some(220));
    }

    #[test]
    fn multi_line() {
        let mut buf = FtpReplyBuffer::new(4096);
        buf.append(b"230-Welcome\r\n 230 is not the end\r\n230-still\r\n")
            .unwrap();
        assert_eq!(buf.check_reply(), None);
        buf.append(b"230 done\r\n").unwrap();
        assert_eq!(buf.check_reply(), Some(230));
        assert_eq!(
            directory_message(&buf.reply_text(), 230),
            " 230 is not the end\nstill\n"
        );
    }

    #[test]
    fn idempotent() {
        let mut buf = FtpReplyBuffer::new(4096);
        buf.append(b"200 ok\r\n331-a\r\n331 b\r\n250 c\r\n").unwrap();

        let mut codes = Vec::new();
        while let Some(code) = buf.check_reply() {
            assert_eq!(buf.check_reply(), Some(code));
            codes.push(code);
            buf.move_to_next_reply();
        }
        assert_eq!(codes, vec![200, 331, 250]);
        assert_eq!(buf.check_reply(), None);
        assert_eq!(buf.check_reply(), None);
        buf.move_to_next_reply();
        assert_eq!(buf.check_reply(), None);
    }

    #[test]
    fn skip_malformed() {
        let mut buf = FtpReplyBuffer::new(4096);
        buf.append(b"garbage\r\n12\r\n220 ok\r\n").unwrap();
        assert_eq!(buf.check_reply(), Some(220));
        assert_eq!(buf.reply_text(), "220 ok\r\n");
    }

    #[test]
    fn keep_following_bytes() {
        let mut buf = FtpReplyBuffer::new(4096);
        buf.append(b"150 open\r\n226 do").unwrap();
        assert_eq!(buf.check_reply(), Some(150));
        buf.move_to_next_reply();
        assert_eq!(buf.buffered_len(), 6);
        assert_eq!(buf.check_reply(), None);
        buf.append(b"ne\r\n").unwrap();
        assert_eq!(buf.check_reply(), Some(226));
    }

    #[test]
    fn too_long() {
        let mut buf = FtpReplyBuffer::new(16);
        buf.append(b"220-0123456789").unwrap();
        assert_eq!(
            buf.append(b"0123456789"),
            Err(FtpReplyError::ReplyTooLong(16))
        );
    }

    #[test]
    fn pwd() {
        assert_eq!(
            parse_pwd_path("257 \"/home/x\" is current directory\r\n").as_deref(),
            Some("/home/x")
        );
        assert_eq!(
            parse_pwd_path("257 \"/a \"\"b\"\"\" created\r\n").as_deref(),
            Some("/a \"b\"")
        );
        assert_eq!(parse_pwd_path("257 /srv\r\n").as_deref(), Some("/srv"));
        assert_eq!(parse_pwd_path("257 \"/broken\r\n"), None);
    }

    #[test]
    fn size_and_mdtm() {
        assert_eq!(parse_size("213 1024\r\n"), Some(1024));
        assert_eq!(parse_size("213 \r\n"), None);
        assert_eq!(parse_size("213 big\r\n"), None);
        assert_eq!(parse_mdtm("213 20211201102030\r\n"), Some("20211201102030"));
        assert_eq!(parse_mdtm("213\r\n"), None);
    }
}
