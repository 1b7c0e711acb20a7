/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use log::info;

const RESTART_UNTESTED: u8 = 0;
const RESTART_SUPPORTED: u8 = 1;
const RESTART_UNSUPPORTED: u8 = 2;

/// Banner text of servers which fail on CWD into a file that SIZE already
/// found, so the CWD after a successful SIZE has to be skipped.
const SKIP_CWD_AFTER_SIZE_BANNER: &str = "WarFTPd";

/// Whether a greeting comes from a server that needs the CWD after SIZE to be
/// skipped.
pub fn banner_requires_skip_cwd_after_size(greeting: &str) -> bool {
    greeting.contains(SKIP_CWD_AFTER_SIZE_BANNER)
}

/// What one server has shown it can not do.
///
/// Shared by all sessions to the same server. Every flag only ever goes from
/// unset to set.
#[derive(Debug, Default)]
pub struct FtpServerCapabilities {
    size_disabled: AtomicBool,
    mode_disabled: AtomicBool,
    mdtm_disabled: AtomicBool,
    full_path_disabled: AtomicBool,
    epsv_disabled: AtomicBool,
    epsv_tested: AtomicBool,
    restart: AtomicU8,
    use_tilde_for_home: AtomicBool,
    skip_cwd_after_size: AtomicBool,
}

macro_rules! sticky_flag {
    ($get:ident, $set:ident, $field:ident, $msg:literal) => {
        #[inline]
        pub fn $get(&self) -> bool {
            self.$field.load(Ordering::Relaxed)
        }

        pub fn $set(&self) {
            if !self.$field.swap(true, Ordering::Relaxed) {
                info!($msg);
            }
        }
    };
}

impl FtpServerCapabilities {
    sticky_flag!(size_disabled, disable_size, size_disabled, "ftp server: SIZE disabled");
    sticky_flag!(mode_disabled, disable_mode, mode_disabled, "ftp server: MODE disabled");
    sticky_flag!(mdtm_disabled, disable_mdtm, mdtm_disabled, "ftp server: MDTM disabled");
    sticky_flag!(
        full_path_disabled,
        disable_full_path,
        full_path_disabled,
        "ftp server: full path addressing disabled"
    );
    sticky_flag!(epsv_disabled, disable_epsv, epsv_disabled, "ftp server: EPSV disabled");
    sticky_flag!(epsv_tested, set_epsv_tested, epsv_tested, "ftp server: EPSV tested");
    sticky_flag!(
        use_tilde_for_home,
        set_use_tilde_for_home,
        use_tilde_for_home,
        "ftp server: use ~ as home directory"
    );
    sticky_flag!(
        skip_cwd_after_size,
        set_skip_cwd_after_size,
        skip_cwd_after_size,
        "ftp server: skip CWD after SIZE"
    );

    #[inline]
    pub fn restart_tested(&self) -> bool {
        self.restart.load(Ordering::Relaxed) != RESTART_UNTESTED
    }

    #[inline]
    pub fn restart_supported(&self) -> bool {
        self.restart.load(Ordering::Relaxed) == RESTART_SUPPORTED
    }

    pub fn set_restart_tested(&self, supported: bool) {
        let v = if supported {
            RESTART_SUPPORTED
        } else {
            RESTART_UNSUPPORTED
        };
        if self
            .restart
            .compare_exchange(RESTART_UNTESTED, v, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            info!("ftp server: restart supported: {supported}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky() {
        let caps = FtpServerCapabilities::default();
        assert!(!caps.size_disabled());
        caps.disable_size();
        assert!(caps.size_disabled());
        caps.disable_size();
        assert!(caps.size_disabled());
        assert!(!caps.mdtm_disabled());
    }

    #[test]
    fn restart() {
        let caps = FtpServerCapabilities::default();
        assert!(!caps.restart_tested());
        caps.set_restart_tested(false);
        assert!(caps.restart_tested());
        assert!(!caps.restart_supported());
        caps.set_restart_tested(true);
        assert!(!caps.restart_supported());
    }

    #[test]
    fn banner() {
        assert!(banner_requires_skip_cwd_after_size(
            "220 WarFTPd 1.82.00-RC11 Ready\r\n"
        ));
        assert!(!banner_requires_skip_cwd_after_size("220 vsFTPd 3.0.3\r\n"));
    }
}
