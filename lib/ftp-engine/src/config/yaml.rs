/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::ParseError;
use humanize_rs::bytes::Bytes;
use yaml_rust::{Yaml, yaml};

use super::{FtpClientConfig, FtpControlConfig, FtpPortSet, FtpTransferConfig};

fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace('-', "_")
}

fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(ParseError::MissingUnit) => {
                let u = u64::from_str(value).map_err(|_| anyhow!("invalid duration string"))?;
                Ok(Duration::from_secs(u))
            }
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => {
            let u = u64::try_from(*value).map_err(|_| anyhow!("negative duration value"))?;
            Ok(Duration::from_secs(u))
        }
        _ => Err(anyhow!(
            "yaml value type for humanize duration should be 'string' or 'integer'"
        )),
    }
}

fn as_humanize_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(value) => {
            let v = value.parse::<Bytes>()?;
            Ok(v.size())
        }
        Yaml::Integer(value) => Ok(usize::try_from(*value)?),
        _ => Err(anyhow!(
            "yaml value type for humanize usize should be 'string' or 'integer'"
        )),
    }
}

fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid yaml string value for 'bool': {s}")),
        },
        Yaml::Boolean(value) => Ok(*value),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!(
            "yaml value type for 'bool' should be 'boolean' / 'string' / 'integer'"
        )),
    }
}

fn as_port_set(v: &Yaml) -> anyhow::Result<FtpPortSet> {
    match v {
        Yaml::String(s) => Ok(FtpPortSet::from_str(s)?),
        Yaml::Integer(i) => {
            let port = u16::try_from(*i)?;
            let mut ports = FtpPortSet::default();
            ports.add_single(port);
            Ok(ports)
        }
        Yaml::Array(seq) => {
            let mut ports = FtpPortSet::default();
            for (i, v) in seq.iter().enumerate() {
                let part = as_port_set(v).context(format!("invalid port value for #{i}"))?;
                ports.merge(part);
            }
            Ok(ports)
        }
        _ => Err(anyhow!(
            "yaml value type for port set should be 'string' / 'integer' / 'array'"
        )),
    }
}

impl FtpControlConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpControlConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "max_reply_size" => {
                    config.max_reply_size = as_humanize_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "idle_timeout" => {
                    config.idle_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

impl FtpTransferConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpTransferConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "passive_connect_timeout" => {
                    config.passive_connect_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "try_block_mode" => {
                    config.try_block_mode =
                        as_bool(v).context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "read_buffer_size" => {
                    config.read_buffer_size = as_humanize_usize(v)
                        .context(format!("invalid humanize usize value for key {k}"))?;
                    Ok(())
                }
                "end_wait_timeout" => {
                    config.end_wait_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

impl FtpClientConfig {
    pub fn parse_yaml(value: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = value {
            let mut config = FtpClientConfig::default();
            foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                "control" => {
                    config.control = FtpControlConfig::parse_yaml(v).context(format!(
                        "invalid ftp control connection config value for key {k}"
                    ))?;
                    Ok(())
                }
                "transfer" => {
                    config.transfer = FtpTransferConfig::parse_yaml(v).context(format!(
                        "invalid ftp transfer connection config value for key {k}"
                    ))?;
                    Ok(())
                }
                "connect_timeout" => {
                    config.connect_timeout = as_duration(v)
                        .context(format!("invalid humanize duration value for key {k}"))?;
                    Ok(())
                }
                "use_absolute_path" => {
                    config.use_absolute_path =
                        as_bool(v).context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "no_keep_alive" => {
                    config.no_keep_alive =
                        as_bool(v).context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "offline_mode" => {
                    config.offline_mode =
                        as_bool(v).context(format!("invalid bool value for key {k}"))?;
                    Ok(())
                }
                "max_connections_per_host" => {
                    config.max_connections_per_host =
                        as_usize(v).context(format!("invalid usize value for key {k}"))?;
                    Ok(())
                }
                "permitted_ports" => {
                    config.permitted_ports =
                        as_port_set(v).context(format!("invalid port set value for key {k}"))?;
                    Ok(())
                }
                "anonymous_password" => {
                    if let Yaml::String(s) = v {
                        config.anonymous_password.clone_from(s);
                        Ok(())
                    } else {
                        Err(anyhow!("invalid string value for key {k}"))
                    }
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            Ok(config)
        } else {
            Err(anyhow!("invalid yaml type"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    fn yaml_doc(s: &str) -> Yaml {
        YamlLoader::load_from_str(s).unwrap().remove(0)
    }

    #[test]
    fn ftp_control_config_parse_ok() {
        let yaml = yaml_doc(
            r#"
                max_reply_size: "8KB"
                idle-timeout: "90s"
            "#,
        );
        let config = FtpControlConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.max_reply_size, 8000);
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
    }

    #[test]
    fn ftp_control_config_parse_err() {
        let yaml = yaml_doc("invalid_key: value");
        assert!(FtpControlConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc("max_reply_size: 8KBX");
        assert!(FtpControlConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc("idle_timeout: -1");
        assert!(FtpControlConfig::parse_yaml(&yaml).is_err());

        let yaml = Yaml::String("invalid".to_string());
        assert!(FtpControlConfig::parse_yaml(&yaml).is_err());
    }

    #[test]
    fn ftp_transfer_config_parse_ok() {
        let yaml = yaml_doc(
            r#"
                passive_connect_timeout: 5
                try_block_mode: off
                read_buffer_size: 32768
                end_wait_timeout: "500ms"
            "#,
        );
        let config = FtpTransferConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.passive_connect_timeout, Duration::from_secs(5));
        assert!(!config.try_block_mode);
        assert_eq!(config.read_buffer_size, 32768);
        assert_eq!(config.end_wait_timeout, Duration::from_millis(500));
    }

    #[test]
    fn ftp_transfer_config_parse_err() {
        let yaml = yaml_doc("try_block_mode: maybe");
        assert!(FtpTransferConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc("passive_connect_timeout: 5x");
        assert!(FtpTransferConfig::parse_yaml(&yaml).is_err());
    }

    #[test]
    fn ftp_client_config_parse_ok() {
        let yaml = yaml_doc(
            r#"
                control:
                  idle_timeout: "2m"
                transfer:
                  passive_connect_timeout: "15s"
                connect_timeout: "10s"
                use_absolute_path: true
                no_keep_alive: yes
                offline_mode: false
                max_connections_per_host: 2
                permitted_ports: "22,100-110"
                anonymous_password: "guest@example.net"
            "#,
        );
        let config = FtpClientConfig::parse_yaml(&yaml).unwrap();
        assert_eq!(config.control.idle_timeout, Duration::from_secs(120));
        assert_eq!(
            config.transfer.passive_connect_timeout,
            Duration::from_secs(15)
        );
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.use_absolute_path);
        assert!(config.no_keep_alive);
        assert!(!config.offline_mode);
        assert_eq!(config.max_connections_per_host, 2);
        assert!(config.permitted_ports.contains(22));
        assert!(config.permitted_ports.contains(105));
        assert!(!config.permitted_ports.contains(23));
        assert_eq!(config.anonymous_password, "guest@example.net");
    }

    #[test]
    fn ftp_client_config_port_list() {
        let yaml = yaml_doc(
            r#"
                permitted_ports:
                  - 22
                  - "110-111"
            "#,
        );
        let config = FtpClientConfig::parse_yaml(&yaml).unwrap();
        assert!(config.permitted_ports.contains(22));
        assert!(config.permitted_ports.contains(111));
        assert!(!config.permitted_ports.contains(23));
    }

    #[test]
    fn ftp_client_config_parse_err() {
        let yaml = yaml_doc("permitted_ports: \"1-2-3\"");
        assert!(FtpClientConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc("anonymous_password: 1");
        assert!(FtpClientConfig::parse_yaml(&yaml).is_err());

        let yaml = yaml_doc(
            r#"
                control:
                  max_line_len: 1
            "#,
        );
        assert!(FtpClientConfig::parse_yaml(&yaml).is_err());
    }
}
