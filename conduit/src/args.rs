use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use conduit_telemetry::LogFormat;

/// Conduit LLM gateway
#[derive(Debug, Parser)]
#[command(name = "conduit", about = "OpenAI-compatible gateway in front of many LLM providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "conduit.toml", env = "CONDUIT_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "CONDUIT_LISTEN")]
    pub listen_address: Option<SocketAddr>,

    /// Log filter directives (e.g. "info,conduit_llm=debug")
    #[arg(long, default_value = "info", env = "CONDUIT_LOG")]
    pub log: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogStyle::Text, env = "CONDUIT_LOG_FORMAT")]
    pub log_format: LogStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogStyle {
    Text,
    Json,
}

impl From<LogStyle> for LogFormat {
    fn from(style: LogStyle) -> Self {
        match style {
            LogStyle::Text => Self::Text,
            LogStyle::Json => Self::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["conduit"]).unwrap();

        assert_eq!(args.config, PathBuf::from("conduit.toml"));
        assert!(args.listen_address.is_none());
        assert_eq!(args.log, "info");
        assert_eq!(args.log_format, LogStyle::Text);
    }

    #[test]
    fn overrides() {
        let args = Args::try_parse_from([
            "conduit",
            "-c",
            "/etc/conduit.toml",
            "--listen-address",
            "127.0.0.1:8080",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("/etc/conduit.toml"));
        assert_eq!(args.listen_address.unwrap().port(), 8080);
        assert_eq!(LogFormat::from(args.log_format), LogFormat::Json);
    }
}
