/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use super::action::VecRequestSource;
use super::*;
use crate::FtpErrorKind;

struct Harness {
    machine: FtpControlMachine,
    src: VecRequestSource,
}

impl Harness {
    fn new(config: FtpClientConfig, caps: Arc<FtpServerCapabilities>, request: FtpRequest) -> Self {
        let machine = FtpControlMachine::new(
            Arc::new(config),
            caps,
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            request,
        );
        Harness {
            machine,
            src: VecRequestSource {
                requests: VecDeque::new(),
                allow_idle: false,
            },
        }
    }

    fn reply(&mut self, s: &str) -> Vec<FtpAction> {
        self.machine.feed(s.as_bytes(), &mut self.src)
    }

    /// Feed a reply and expect exactly one command to be sent.
    fn expect(&mut self, s: &str, cmd: &str) {
        let actions = self.reply(s);
        assert_eq!(sent(&actions), vec![cmd.to_string()], "after reply {s:?}");
    }

    fn login(&mut self) {
        self.expect("220 ready\r\n", "USER anonymous");
        self.expect("331 send password\r\n", "PASS anonymous@");
        self.expect("230 logged in\r\n", "PWD");
    }
}

fn sent(actions: &[FtpAction]) -> Vec<String> {
    actions
        .iter()
        .filter_map(|a| match a {
            FtpAction::Send(line) => Some(line.as_str().to_string()),
            _ => None,
        })
        .collect()
}

fn failed_kind(actions: &[FtpAction]) -> Option<FtpErrorKind> {
    actions.iter().find_map(|a| match a {
        FtpAction::RequestFailed(_, e) => Some(e.kind()),
        _ => None,
    })
}

fn finished(actions: &[FtpAction]) -> bool {
    actions
        .iter()
        .any(|a| matches!(a, FtpAction::RequestFinished(_)))
}

#[test]
fn full_path_retrieve() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let request = FtpRequest::new("pub/file.txt");
    let id = request.id();
    let mut h = Harness::new(FtpClientConfig::default(), caps.clone(), request);

    h.login();
    h.expect("257 \"/home/ftp\" is current directory\r\n", "EPSV ALL");
    h.expect("200 EPSV ALL ok\r\n", "REST 0");
    h.expect("350 restarting at 0\r\n", "TYPE I");
    h.expect("200 type set to I\r\n", "SIZE pub/file.txt");
    h.expect("213 1234\r\n", "MDTM pub/file.txt");
    h.expect("213 20200101000000\r\n", "MODE B");
    h.expect("200 mode set to B\r\n", "EPSV");

    let actions = h.reply("229 Entering Extended Passive Mode (|||5000|)\r\n");
    assert!(matches!(
        actions[0],
        FtpAction::OpenDataConnection {
            mode: FtpDataMode::Block,
            ..
        }
    ));
    assert_eq!(sent(&actions), vec!["RETR pub/file.txt".to_string()]);
    assert!(h.machine.on_data_connected().is_empty());
    assert!(caps.restart_supported());
    assert!(caps.epsv_tested());

    let actions = h.reply("150 opening data connection\r\n");
    let facts = actions.iter().find_map(|a| match a {
        FtpAction::HeaderAvailable { request_id, facts } => {
            assert_eq!(*request_id, id);
            Some(facts.clone())
        }
        _ => None,
    });
    let facts = facts.unwrap();
    assert_eq!(facts.size(), Some(1234));
    assert_eq!(facts.mdtm(), Some("20200101000000"));
    assert_eq!(facts.start_path(), Some("/home/ftp"));
    assert!(!facts.listing());

    let actions = h.reply("226 transfer complete\r\n");
    assert!(finished(&actions));
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);

    let actions = h.reply("221 bye\r\n");
    assert!(matches!(actions.last(), Some(FtpAction::Close)));
    assert!(h.machine.is_closed());
}

#[test]
fn size_unsupported_is_remembered() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut h = Harness::new(
        FtpClientConfig::default(),
        caps.clone(),
        FtpRequest::new("pub/file.txt"),
    );
    h.login();
    h.expect("257 \"/home/ftp\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "SIZE pub/file.txt");
    h.expect("502 command not implemented\r\n", "CWD /home/ftp");
    assert!(caps.size_disabled());
    assert!(caps.full_path_disabled());
    h.expect("250 ok\r\n", "CWD pub");

    // a later session to the same server never sends SIZE
    let mut h = Harness::new(FtpClientConfig::default(), caps, FtpRequest::new("pub/file.txt"));
    h.login();
    h.expect("257 \"/home/ftp\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "CWD pub");
    h.expect("250 ok\r\n", "CWD file.txt");
    h.expect("550 not a directory\r\n", "MODE B");
    h.expect("200 ok\r\n", "EPSV");
}

#[test]
fn full_path_cwd_rejected() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut h = Harness::new(
        FtpClientConfig::default(),
        caps.clone(),
        FtpRequest::new("pub/dir/"),
    );
    h.login();
    h.expect("257 \"/home/ftp\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "CWD pub/dir/");
    h.expect("550 no such directory\r\n", "CWD /home/ftp");
    // the walk starts over from the first segment
    h.expect("250 ok\r\n", "SIZE pub");
    h.expect("550 not a file\r\n", "CWD pub");
    h.expect("250 ok\r\n", "SIZE dir");
    h.expect("550 not a file\r\n", "CWD dir");
    h.expect("250 ok\r\n", "MODE B");
    h.expect("200 ok\r\n", "EPSV");

    let actions = h.reply("229 (|||5000|)\r\n");
    assert_eq!(sent(&actions), vec!["LIST".to_string()]);
    assert_eq!(h.machine.cwd(), "pub/dir");
    assert!(!caps.full_path_disabled());
}

#[test]
fn segment_walk() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_full_path();
    let request = FtpRequest::new("a/b.txt").with_typecode(FtpTypeCode::Image);
    let mut h = Harness::new(FtpClientConfig::default(), caps, request);
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "SIZE a");
    h.expect("550 not a file\r\n", "CWD a");
    h.expect("250 ok\r\n", "MODE B");
    h.expect("200 ok\r\n", "SIZE b.txt");
    h.expect("213 10\r\n", "MDTM b.txt");
    h.expect("213 20200101000000\r\n", "EPSV");
    let actions = h.reply("229 (|||5000|)\r\n");
    assert_eq!(sent(&actions), vec!["RETR b.txt".to_string()]);
}

#[test]
fn epsv_unsupported_falls_back_to_pasv() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config, caps.clone(), FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "EPSV");
    h.expect("500 unknown command\r\n", "PASV");
    assert!(caps.epsv_disabled());

    let actions = h.reply("227 Entering Passive Mode (127,0,0,1,19,136)\r\n");
    match &actions[0] {
        FtpAction::OpenDataConnection { endpoint, mode } => {
            assert_eq!(endpoint.port(), 5000);
            assert_eq!(*mode, FtpDataMode::Stream);
        }
        a => panic!("unexpected action {a:?}"),
    }
    assert_eq!(sent(&actions), vec!["LIST".to_string()]);
}

#[test]
fn pasv_restricted_port() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_epsv();
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config, caps, FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "PASV");

    let actions = h.reply("227 Entering Passive Mode (127,0,0,1,0,23)\r\n");
    assert_eq!(
        failed_kind(&actions),
        Some(FtpErrorKind::CannotOpenPassiveDataConnection)
    );
    assert!(
        !actions
            .iter()
            .any(|a| matches!(a, FtpAction::OpenDataConnection { .. }))
    );
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);
}

#[test]
fn stream_mode_waits_for_data_end() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config, caps, FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "LIST");
    h.machine.on_data_connected();
    h.reply("150 here it comes\r\n");

    let actions = h.reply("226 done\r\n");
    assert!(!finished(&actions));
    assert!(sent(&actions).is_empty());

    let actions = h.machine.on_data_closed(&mut h.src);
    assert!(finished(&actions));
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);
}

#[test]
fn keep_alive_takes_next_request() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_mode();
    let mut h = Harness::new(FtpClientConfig::default(), caps, FtpRequest::new("a.txt"));
    h.src.allow_idle = true;
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "SIZE a.txt");
    h.expect("213 3\r\n", "MDTM a.txt");
    h.expect("550 no time\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "RETR a.txt");
    h.machine.on_data_connected();
    h.machine.on_data_closed(&mut h.src);

    h.src.requests.push_back(FtpRequest::new("b.txt"));
    let actions = h.reply("226 done\r\n");
    assert!(finished(&actions));
    assert_eq!(sent(&actions), vec!["SIZE b.txt".to_string()]);
}

#[test]
fn idle_session_is_kept() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_mode();
    let mut h = Harness::new(FtpClientConfig::default(), caps, FtpRequest::new(""));
    h.src.allow_idle = true;
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "LIST");
    h.machine.on_data_connected();
    h.machine.on_data_closed(&mut h.src);
    let actions = h.reply("226 done\r\n");
    assert!(finished(&actions));
    assert!(sent(&actions).is_empty());
    assert!(h.machine.is_idle());

    h.src.requests.push_back(FtpRequest::new("c.txt"));
    let actions = h.machine.poll_request(&mut h.src);
    assert_eq!(sent(&actions), vec!["SIZE c.txt".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn idle_timeout() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut h = Harness::new(FtpClientConfig::default(), caps, FtpRequest::new(""));
    h.login();

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(h.machine.check_idle(Instant::now()).is_empty());

    tokio::time::advance(Duration::from_secs(31)).await;
    let actions = h.machine.check_idle(Instant::now());
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::TransferAborted));
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);
    assert!(matches!(actions.last(), Some(FtpAction::Close)));
    assert!(h.machine.is_closed());
}

#[test]
fn refused_before_greeting() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut h = Harness::new(FtpClientConfig::default(), caps, FtpRequest::new("a"));
    let actions = h.machine.on_control_closed();
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::NotLoggedIn));
    assert!(matches!(actions.last(), Some(FtpAction::Close)));
}

#[test]
fn login_rejected() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut h = Harness::new(FtpClientConfig::default(), caps, FtpRequest::new("a"));
    h.expect("220 ready\r\n", "USER anonymous");
    let actions = h.reply("530 anonymous access denied\r\n");
    let e = actions
        .iter()
        .find_map(|a| match a {
            FtpAction::RequestFailed(_, e) => Some(e.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(e.kind(), FtpErrorKind::UserCredentials);
    assert_eq!(e.server_reply(), Some("530 anonymous access denied\r\n"));
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);
}

#[test]
fn password_needed() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let request = FtpRequest::new("a").with_user("bob", None);
    let mut h = Harness::new(FtpClientConfig::default(), caps, request);
    h.expect("220 ready\r\n", "USER bob");
    let actions = h.reply("331 password required for bob\r\n");
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::NeedPassword));
}

#[test]
fn service_unavailable() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut h = Harness::new(FtpClientConfig::default(), caps, FtpRequest::new("a"));
    let actions = h.reply("421 too many users\r\n");
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::ServiceUnavailable));
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);
}

#[test]
fn file_unavailable() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_full_path();
    caps.disable_mode();
    caps.set_restart_tested(true);
    let request = FtpRequest::new("nope.txt").with_typecode(FtpTypeCode::Image);
    let mut h = Harness::new(FtpClientConfig::default(), caps, request);
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "SIZE nope.txt");
    h.expect("550 no such file\r\n", "MDTM nope.txt");
    h.expect("550 no such file\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "RETR nope.txt");
    let actions = h.reply("550 no such file\r\n");
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::FileUnavailable));
    assert!(
        actions
            .iter()
            .any(|a| matches!(a, FtpAction::CloseDataConnection))
    );
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);
}

#[test]
fn epsv_data_timeout_requeues() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_mode();
    let mut h = Harness::new(FtpClientConfig::default(), caps.clone(), FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "LIST");

    let actions = h.machine.on_data_failed(true);
    assert!(matches!(actions[0], FtpAction::RequeueRequest(_)));
    assert!(caps.epsv_disabled());
    assert!(caps.epsv_tested());

    // the reply to LIST then ends the session
    let actions = h.reply("425 can't open data connection\r\n");
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);
}

#[test]
fn resume_with_restart() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_full_path();
    caps.set_restart_tested(true);
    let request = FtpRequest::new("big.iso")
        .with_typecode(FtpTypeCode::Image)
        .with_resume(1000, Some("20200101000000"));
    let mut h = Harness::new(FtpClientConfig::default(), caps, request);
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "SIZE big.iso");
    h.expect("213 5000\r\n", "MDTM big.iso");
    h.expect("213 20200101000000\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "REST 1000");
    h.expect("350 restarting at 1000\r\n", "RETR big.iso");

    let actions = h.reply("150 opening\r\n");
    let using_resume = actions.iter().find_map(|a| match a {
        FtpAction::HeaderAvailable { facts, .. } => Some(facts.using_resume()),
        _ => None,
    });
    assert_eq!(using_resume, Some(true));
}

#[test]
fn resume_cancelled_by_new_mdtm() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_full_path();
    caps.disable_mode();
    caps.set_restart_tested(true);
    let request = FtpRequest::new("big.iso")
        .with_typecode(FtpTypeCode::Image)
        .with_resume(1000, Some("20200101000000"));
    let mut h = Harness::new(FtpClientConfig::default(), caps, request);
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "SIZE big.iso");
    h.expect("213 5000\r\n", "MDTM big.iso");
    h.expect("213 20210101000000\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "RETR big.iso");
}

#[test]
fn skip_cwd_after_size_banner() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_full_path();
    caps.disable_mode();
    caps.set_restart_tested(true);
    let mut h = Harness::new(FtpClientConfig::default(), caps.clone(), FtpRequest::new("f.txt"));
    h.expect("220 WarFTPd 1.82 Ready\r\n", "USER anonymous");
    h.expect("331 send password\r\n", "PASS anonymous@");
    h.expect("230 logged in\r\n", "PWD");
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "SIZE f.txt");
    h.expect("213 7\r\n", "MDTM f.txt");
    assert!(caps.skip_cwd_after_size());
}

#[test]
fn abort_is_idempotent() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut h = Harness::new(FtpClientConfig::default(), caps, FtpRequest::new("a"));
    h.expect("220 ready\r\n", "USER anonymous");
    let actions = h.machine.abort();
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::Aborted));
    assert!(matches!(actions.last(), Some(FtpAction::Close)));
    assert!(h.machine.abort().is_empty());
    assert!(h.reply("331 send password\r\n").is_empty());
}

#[test]
fn reply_too_long() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut config = FtpClientConfig::default();
    config.control.max_reply_size = 16;
    let mut h = Harness::new(config, caps, FtpRequest::new("a"));
    let actions = h.reply("220-this greeting never ends\r\n");
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::InternalError));
    assert!(h.machine.is_closed());
}

#[test]
fn epsv_rejected_with_other_code_is_remembered() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config.clone(), caps.clone(), FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "EPSV");
    h.expect("425 can't open data connection\r\n", "PASV");
    assert!(caps.epsv_disabled());
    assert!(caps.epsv_tested());

    let mut h = Harness::new(config, caps, FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "TYPE I");
    h.expect("200 ok\r\n", "PASV");
}

#[test]
fn epsv_all_superfluous_disables_epsv() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config, caps.clone(), FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("202 command not implemented, superfluous\r\n", "REST 0");
    assert!(caps.epsv_disabled());
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "PASV");
}

#[test]
fn epsv_all_service_unavailable() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut h = Harness::new(FtpClientConfig::default(), caps.clone(), FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    let actions = h.reply("421 closing control connection\r\n");
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::ServiceUnavailable));
    assert_eq!(sent(&actions), vec!["QUIT".to_string()]);
    assert!(!caps.epsv_disabled());
}

#[test]
fn list_on_file_retries_with_cdup() {
    let caps = Arc::new(FtpServerCapabilities::default());
    caps.disable_size();
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config, caps, FtpRequest::new("pub/file.txt"));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "CWD pub");
    h.expect("250 ok\r\n", "CWD file.txt");
    // the server lets the CWD into a file succeed
    h.expect("250 ok\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "LIST");
    h.machine.on_data_connected();
    assert_eq!(h.machine.cwd(), "pub/file.txt");
    h.expect("550 not a directory\r\n", "CDUP");
    h.expect("250 ok\r\n", "RETR file.txt");
    assert_eq!(h.machine.cwd(), "pub");
}

#[test]
fn full_path_retr_rejected_walks_segments() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config, caps, FtpRequest::new("pub/file.txt"));
    h.login();
    h.expect("257 \"/home/ftp\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "SIZE pub/file.txt");
    h.expect("213 3\r\n", "MDTM pub/file.txt");
    h.expect("213 20200101000000\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "RETR pub/file.txt");
    h.machine.on_data_connected();

    let actions = h.reply("451 local error in processing\r\n");
    assert_eq!(failed_kind(&actions), None);
    assert!(
        actions
            .iter()
            .any(|a| matches!(a, FtpAction::CloseDataConnection))
    );
    assert_eq!(sent(&actions), vec!["CWD /home/ftp".to_string()]);
    h.expect("250 ok\r\n", "SIZE pub");
}

#[test]
fn server_closes_mid_transfer() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config, caps, FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "LIST");
    h.machine.on_data_connected();
    h.reply("150 here it comes\r\n");

    let actions = h.reply("221 bye\r\n");
    assert_eq!(failed_kind(&actions), Some(FtpErrorKind::ConnectionClosed));
    assert!(sent(&actions).is_empty());
    assert!(matches!(actions.last(), Some(FtpAction::Close)));
    assert!(h.machine.is_closed());
}

#[test]
fn server_closes_after_transfer_complete() {
    let caps = Arc::new(FtpServerCapabilities::default());
    let mut config = FtpClientConfig::default();
    config.transfer.try_block_mode = false;
    let mut h = Harness::new(config, caps, FtpRequest::new(""));
    h.login();
    h.expect("257 \"/\"\r\n", "EPSV ALL");
    h.expect("200 ok\r\n", "REST 0");
    h.expect("350 ok\r\n", "TYPE I");
    h.expect("200 ok\r\n", "EPSV");
    h.expect("229 (|||5000|)\r\n", "LIST");
    h.machine.on_data_connected();
    h.reply("150 here it comes\r\n");
    h.reply("226 done\r\n");

    // the data connection is still draining
    let actions = h.reply("221 bye\r\n");
    assert!(finished(&actions));
    assert_eq!(failed_kind(&actions), None);
    assert!(h.machine.is_closed());
}
