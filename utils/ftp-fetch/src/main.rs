/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, Command, value_parser};
use clap_complete::Shell;
use percent_encoding::{AsciiSet, CONTROLS};
use yaml_rust::YamlLoader;

use ftp_engine::{FtpClientConfig, FtpRequest, FtpServerAddr, FtpServerManager};

mod connection;
mod logger;
mod receiver;

mod cmd_get;
mod cmd_list;

const GLOBAL_ARG_COMPLETION: &str = "completion";
const GLOBAL_ARG_SERVER: &str = "server";
const GLOBAL_ARG_CONFIG: &str = "config";
const GLOBAL_ARG_USERNAME: &str = "username";
const GLOBAL_ARG_PASSWORD: &str = "password";
const GLOBAL_ARG_SOURCE_IP: &str = "source-ip";
const GLOBAL_ARG_ABSOLUTE_PATH: &str = "absolute-path";
const GLOBAL_ARG_NO_BLOCK_MODE: &str = "no-block-mode";
const GLOBAL_ARG_VERBOSE: &str = "verbose";

/// The engine unescapes request paths, so a literal '%' has to be escaped.
const PATH_ESCAPE_SET: &AsciiSet = &CONTROLS.add(b'%');

fn build_cli_args() -> Command {
    Command::new("ftp-fetch")
        .arg(
            Arg::new(GLOBAL_ARG_COMPLETION)
                .num_args(1)
                .value_name("SHELL")
                .long("completion")
                .value_parser(value_parser!(Shell))
                .exclusive(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_SERVER)
                .help("FTP server address")
                .num_args(1)
                .value_name("SERVER ADDRESS")
                .required_unless_present(GLOBAL_ARG_COMPLETION),
        )
        .arg(
            Arg::new(GLOBAL_ARG_CONFIG)
                .help("load client config from this yaml file")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_parser(value_parser!(PathBuf))
                .long("config")
                .short('c')
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_USERNAME)
                .help("FTP username")
                .num_args(1)
                .value_name("USERNAME")
                .short('u')
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_PASSWORD)
                .help("FTP password")
                .num_args(1)
                .value_name("PASSWORD")
                .short('p')
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_SOURCE_IP)
                .help("source ip address")
                .num_args(1)
                .value_name("IP ADDRESS")
                .value_parser(value_parser!(IpAddr))
                .long("source")
                .short('s')
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_ABSOLUTE_PATH)
                .help("resolve paths from the root directory instead of the login directory")
                .action(ArgAction::SetTrue)
                .long("absolute-path")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_NO_BLOCK_MODE)
                .help("never try MODE B for data transfers")
                .action(ArgAction::SetTrue)
                .long("no-block-mode")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_VERBOSE)
                .help("show verbose message")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .global(true),
        )
        .subcommand(cmd_get::command())
        .subcommand(cmd_list::command())
}

pub(crate) struct UserInfo {
    username: Option<String>,
    password: Option<String>,
}

impl UserInfo {
    pub(crate) fn new_request(&self, path: &str) -> FtpRequest {
        let path = percent_encoding::utf8_percent_encode(path, PATH_ESCAPE_SET).to_string();
        let request = FtpRequest::new(&path);
        match &self.username {
            Some(username) => request.with_user(username, self.password.as_deref()),
            None => request,
        }
    }
}

fn load_config(path: &PathBuf) -> anyhow::Result<FtpClientConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {e}", path.display()))?;
    let docs = YamlLoader::load_from_str(&content)
        .map_err(|e| anyhow!("invalid yaml file {}: {e}", path.display()))?;
    match docs.first() {
        Some(doc) => FtpClientConfig::parse_yaml(doc)
            .context(format!("invalid ftp client config in {}", path.display())),
        None => Ok(FtpClientConfig::default()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = build_cli_args().get_matches();

    if let Some(target) = args.get_one::<Shell>(GLOBAL_ARG_COMPLETION) {
        let mut app = build_cli_args();
        let bin_name = app.get_name().to_string();
        clap_complete::generate(*target, &mut app, bin_name, &mut io::stdout());
        return Ok(());
    }

    let verbose_level = args
        .get_one::<u8>(GLOBAL_ARG_VERBOSE)
        .copied()
        .unwrap_or_default();
    let logger = logger::SyncLogger::new(verbose_level);
    logger
        .into_global_logger()
        .map_err(|e| anyhow!("failed to set logger: {e}"))?;

    let server = args
        .get_one::<String>(GLOBAL_ARG_SERVER)
        .ok_or_else(|| anyhow!("no server address set"))?;
    let server = FtpServerAddr::from_str(server)
        .map_err(|e| anyhow!("invalid server address {server}: {e}"))?;

    let user = UserInfo {
        username: args.get_one::<String>(GLOBAL_ARG_USERNAME).cloned(),
        password: args.get_one::<String>(GLOBAL_ARG_PASSWORD).cloned(),
    };

    let mut conn_provider = connection::LocalConnectionProvider::default();
    if let Some(ip) = args.get_one::<IpAddr>(GLOBAL_ARG_SOURCE_IP) {
        conn_provider.set_bind_ip(*ip);
    }

    let mut config = match args.get_one::<PathBuf>(GLOBAL_ARG_CONFIG) {
        Some(p) => load_config(p)?,
        None => FtpClientConfig::default(),
    };
    if args.get_flag(GLOBAL_ARG_ABSOLUTE_PATH) {
        config.use_absolute_path = true;
    }
    if args.get_flag(GLOBAL_ARG_NO_BLOCK_MODE) {
        config.transfer.try_block_mode = false;
    }
    config.no_keep_alive = true;
    let manager = FtpServerManager::new(server, Arc::new(config));

    if let Some((subcommand, args)) = args.subcommand() {
        match subcommand {
            cmd_get::COMMAND => cmd_get::run(&manager, &conn_provider, &user, args).await,
            cmd_list::COMMAND => cmd_list::run(&manager, &conn_provider, &user, args).await,
            cmd => Err(anyhow!("invalid subcommand {cmd}")),
        }
    } else {
        Err(anyhow!("no subcommand found"))
    }
}
