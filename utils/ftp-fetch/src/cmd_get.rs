/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use log::info;
use tokio::fs::OpenOptions;

use ftp_engine::{FtpServerManager, FtpTypeCode};

use super::UserInfo;
use crate::connection::LocalConnectionProvider;
use crate::receiver::{Output, OutputReceiver};

pub(super) const COMMAND: &str = "get";

const COMMAND_ARG_PATH: &str = "path";
const COMMAND_ARG_ASCII: &str = "ascii";
const COMMAND_ARG_RESUME_FROM: &str = "resume-from";
const COMMAND_ARG_OUTPUT: &str = "output";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("fetch a remote file")
        .arg(
            Arg::new(COMMAND_ARG_PATH)
                .help("file path")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_ASCII)
                .help("transfer in ascii mode")
                .action(ArgAction::SetTrue)
                .long(COMMAND_ARG_ASCII),
        )
        .arg(
            Arg::new(COMMAND_ARG_RESUME_FROM)
                .help("resume the transfer from this offset")
                .num_args(1)
                .value_name("OFFSET")
                .value_parser(value_parser!(u64))
                .long(COMMAND_ARG_RESUME_FROM),
        )
        .arg(
            Arg::new(COMMAND_ARG_OUTPUT)
                .help("write to this file instead of stdout")
                .num_args(1)
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .short('o')
                .long(COMMAND_ARG_OUTPUT),
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
        .ok_or_else(|| anyhow!("no path set"))?;
    let path = path.trim_start_matches('/');
    if path.is_empty() || path.ends_with('/') {
        return Err(anyhow!("{path} is not a file path"));
    }

    let mut request = user.new_request(path);
    if args.get_flag(COMMAND_ARG_ASCII) {
        request = request.with_typecode(FtpTypeCode::Ascii);
    }
    let resume_from = args
        .get_one::<u64>(COMMAND_ARG_RESUME_FROM)
        .copied()
        .unwrap_or_default();
    if resume_from > 0 {
        request = request.with_resume(resume_from, None);
    }

    let output = match args.get_one::<PathBuf>(COMMAND_ARG_OUTPUT) {
        Some(p) => {
            let mut options = OpenOptions::new();
            options.create(true);
            if resume_from > 0 {
                options.append(true);
            } else {
                options.write(true).truncate(true);
            }
            let file = options
                .open(p)
                .await
                .map_err(|e| anyhow!("failed to open output file {}: {e}", p.display()))?;
            Output::File(file)
        }
        None => Output::Stdout(tokio::io::stdout()),
    };

    let (receiver, result) = OutputReceiver::new(output, resume_from > 0);
    manager.add_request(request, Box::new(receiver));
    manager.run_until_idle(conn_provider).await;

    let facts = result
        .await
        .map_err(|_| anyhow!("the transfer was dropped before it finished"))??;
    if let Some(mdtm) = facts.mdtm() {
        info!("mdtm record: {mdtm}");
    }
    Ok(())
}
