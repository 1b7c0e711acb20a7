/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};

use ftp_engine::{FtpServerManager, FtpTypeCode};

use super::UserInfo;
use crate::connection::LocalConnectionProvider;
use crate::receiver::{Output, OutputReceiver};

pub(super) const COMMAND: &str = "list";

const COMMAND_ARG_PATH: &str = "path";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("list a remote directory")
        .arg(
            Arg::new(COMMAND_ARG_PATH)
                .help("directory path")
                .num_args(1),
        )
}

pub(super) async fn run(
    manager: &FtpServerManager,
    conn_provider: &LocalConnectionProvider,
    user: &UserInfo,
    args: &ArgMatches,
) -> anyhow::Result<()> {
    let path = args
        .get_one::<String>(COMMAND_ARG_PATH)
        .map(|s| s.trim_start_matches('/'))
        .unwrap_or_default();
    let path = if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    };

    let request = user
        .new_request(&path)
        .with_typecode(FtpTypeCode::Directory);

    let (receiver, result) = OutputReceiver::new(Output::Stdout(tokio::io::stdout()), false);
    manager.add_request(request, Box::new(receiver));
    manager.run_until_idle(conn_provider).await;

    let facts = result
        .await
        .map_err(|_| anyhow!("the listing was dropped before it finished"))??;
    let message = facts.directory_message();
    if !message.is_empty() {
        eprint!("{message}");
    }
    Ok(())
}
