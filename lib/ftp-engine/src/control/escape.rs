/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::borrow::Cow;

/// Remove percent escapes from a path parameter before it is put on the wire.
///
/// If the decoded path would contain a control character the path is used as
/// is, so that it can never inject CR or LF into the control connection.
pub(crate) fn unescape_path(s: &str) -> Cow<'_, str> {
    let decoded = percent_encoding::percent_decode_str(s).decode_utf8_lossy();
    if decoded.chars().any(|c| c.is_ascii_control()) {
        Cow::Borrowed(s)
    } else {
        decoded
    }
}
