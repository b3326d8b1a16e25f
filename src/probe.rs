//! Connectivity Probe
//!
//! Checks that a configuration can be connected, optionally running one command,
//! without blocking the caller's async runtime. The whole connection lifecycle runs
//! on a tokio blocking worker:
//!
//! ```text
//! probe() ──spawn_blocking──> connect ─> execute ─> disconnect
//!    ▲                                                  │
//!    └──────────────── ProbeReport ◄────────────────────┘
//! ```

use crate::backends::{BackendKind, Embedded, Memory, Remote};
use crate::commands::Executor;
use crate::config::BackendConfig;
use crate::connection::{Backend, Connection};
use crate::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub success: bool,
    /// Time from the start of the probe to its report
    pub elapsed: Duration,
    /// Text of the executed command's result tree (empty without a command)
    pub output: String,
    pub error: Option<String>,
}

/// Connects with `config`, runs `command` if given, then disconnects.
pub async fn probe<B: Backend>(config: B::Config, command: Option<String>) -> ProbeReport {
    let started = Instant::now();
    debug!(backend = %B::KIND, "Starting probe");

    let outcome = tokio::task::spawn_blocking(move || run::<B>(config, command.as_deref())).await;
    let (output, error) = match outcome {
        Ok(outcome) => outcome,
        Err(e) => (String::new(), Some(format!("probe worker failed: {}", e))),
    };

    let report = ProbeReport {
        success: error.is_none(),
        elapsed: started.elapsed(),
        output,
        error,
    };
    info!(
        backend = %B::KIND,
        success = report.success,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Probe finished"
    );
    report
}

/// Probes the `kind` backend with a configuration string.
pub async fn probe_kind(kind: BackendKind, config: &str, command: Option<String>) -> ProbeReport {
    match kind {
        BackendKind::Memory => probe_str::<Memory>(config, command).await,
        BackendKind::Embedded => probe_str::<Embedded>(config, command).await,
        BackendKind::Remote => probe_str::<Remote>(config, command).await,
    }
}

async fn probe_str<B: Backend>(config: &str, command: Option<String>) -> ProbeReport {
    match B::Config::parse(config) {
        Ok(config) => probe::<B>(config, command).await,
        Err(e) => ProbeReport {
            success: false,
            elapsed: Duration::ZERO,
            output: String::new(),
            error: Some(e.to_string()),
        },
    }
}

fn run<B: Backend>(config: B::Config, command: Option<&str>) -> (String, Option<String>) {
    let connection = match Connection::<B>::open(config) {
        Ok(connection) => connection,
        Err(e) => return (String::new(), Some(e.to_string())),
    };
    let mut executor = Executor::new(connection);

    let (output, mut error) = match command {
        Some(line) => {
            let tree = executor.execute(line);
            (tree.to_text(), tree.error().map(Error::to_string))
        }
        None => (String::new(), None),
    };

    if let Err(e) = executor.connection_mut().disconnect() {
        error.get_or_insert_with(|| e.to_string());
    }
    (output, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryConfig, RemoteConfig};

    #[tokio::test]
    async fn test_probe_runs_command() {
        let command = Some("INCR hits 5".to_string());
        let report = probe::<Memory>(MemoryConfig::default(), command).await;
        assert!(report.success);
        assert_eq!(report.output, "5\n");
        assert_eq!(report.error, None);
    }

    #[tokio::test]
    async fn test_probe_without_command() {
        let report = probe_kind(BackendKind::Memory, "-d ;", None).await;
        assert!(report.success);
        assert!(report.output.is_empty());
    }

    #[tokio::test]
    async fn test_probe_reports_command_errors() {
        let report = probe::<Memory>(MemoryConfig::default(), Some("NOPE".to_string())).await;
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("unknown command 'NOPE'"));
    }

    #[test]
    fn test_probe_reports_connect_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = RemoteConfig {
            port,
            ..RemoteConfig::default()
        };

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let report = runtime.block_on(probe::<Remote>(config, None));
        assert!(!report.success);
        assert!(report.error.unwrap().starts_with("connect error"));
    }

    #[test]
    fn test_probe_rejects_bad_config() {
        let report = tokio_test::block_on(probe_kind(
            BackendKind::Remote,
            "-h 'unterminated",
            None,
        ));
        assert!(!report.success);
        assert!(report.error.unwrap().starts_with("config parse error"));
    }
}
