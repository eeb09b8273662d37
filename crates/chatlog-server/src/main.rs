use std::path::PathBuf;

use anyhow::Context;
use chatlog_core::OverflowPolicy;
use chatlog_logging::ChatlogSubscriberBuilder;
use chatlog_server::{Server, ServerConfig};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "chatlog", version, about = "Per-user chat message logger with log rotation")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Interface to listen on
    #[arg(long, env = "CHATLOG_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, short, env = "PORT")]
    port: Option<u16>,

    /// Messages per user before rotation
    #[arg(long)]
    capacity: Option<usize>,

    /// Directory for rotation files and the snapshot
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// HTML document served at /
    #[arg(long)]
    ui: Option<PathBuf>,

    /// Discard the oldest message instead of rotating when a queue is full
    #[arg(long)]
    drop_oldest: bool,

    /// Human-readable console logs instead of JSONL
    #[arg(long)]
    pretty: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Layer command-line overrides on top of the file configuration
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(capacity) = self.capacity {
            config.log.capacity = capacity;
        }
        if let Some(log_dir) = self.log_dir {
            config.log.log_dir = log_dir;
        }
        if let Some(ui) = self.ui {
            config.ui_path = ui;
        }
        if self.drop_oldest {
            config.log.overflow = OverflowPolicy::DropOldest;
        }
        if self.pretty {
            config.logging.console.pretty = true;
            config.logging.console.ansi = true;
        }
        if let Some(level) = self.log_level {
            config.logging.default_level = level;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    let config = cli.apply(config);

    let _guard = ChatlogSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init();

    let server = Server::start(config).context("starting server")?;
    println!("Chatlog listening on http://{}", server.local_addr());
    println!("Snapshot: {}", server.manager().snapshot_path().display());

    let report = server.coordinator().run().await?;
    if !report.is_complete() {
        anyhow::bail!(
            "{} queue(s) could not be flushed and remain in the snapshot",
            report.failed.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "chatlog",
            "--host",
            "127.0.0.1",
            "--port",
            "9001",
            "--capacity",
            "3",
            "--log-dir",
            "/tmp/chat",
            "--drop-oldest",
            "--pretty",
        ])
        .unwrap();

        let config = cli.apply(ServerConfig::default());
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9001);
        assert_eq!(config.log.capacity, 3);
        assert_eq!(config.log.log_dir, PathBuf::from("/tmp/chat"));
        assert_eq!(config.log.overflow, OverflowPolicy::DropOldest);
        assert!(config.logging.console.pretty);
    }

    #[test]
    fn test_unset_flags_keep_file_values() {
        let cli = Cli::try_parse_from(["chatlog", "--capacity", "4"]).unwrap();
        let base = ServerConfig::default().with_ui_path("custom.html");

        let config = cli.apply(base);
        assert_eq!(config.log.capacity, 4);
        assert_eq!(config.ui_path, PathBuf::from("custom.html"));
        assert_eq!(config.log.overflow, OverflowPolicy::Rotate);
    }
}
