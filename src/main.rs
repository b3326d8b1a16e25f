//! kvbridge - line-oriented shell over one key-value backend
//!
//! Connects to the selected backend, then reads command lines from stdin and prints
//! each result tree. With `--probe`, runs a single connectivity check instead.

use kvbridge::backends::{BackendKind, Session};
use kvbridge::probe::probe_kind;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Shell configuration
struct Config {
    /// Backend to connect to
    backend: BackendKind,
    /// Backend argument string
    config: String,
    /// Command to run as a connectivity probe
    probe: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            config: String::new(),
            probe: None,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--backend" | "-b" => {
                    if i + 1 < args.len() {
                        config.backend = args[i + 1].parse().unwrap_or_else(|e| {
                            eprintln!("Error: {}", e);
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --backend requires a value");
                        std::process::exit(1);
                    }
                }
                "--config" | "-c" => {
                    if i + 1 < args.len() {
                        config.config = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --config requires a value");
                        std::process::exit(1);
                    }
                }
                "--probe" => {
                    if i + 1 < args.len() {
                        config.probe = Some(args[i + 1].clone());
                        i += 2;
                    } else {
                        eprintln!("Error: --probe requires a command");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("kvbridge version {}", kvbridge::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }
}

fn print_help() {
    println!(
        r#"
kvbridge - one command shell over many key-value backends

USAGE:
    kvbridge [OPTIONS]

OPTIONS:
    -b, --backend <KIND>      memory, embedded or remote (default: memory)
    -c, --config <STRING>     Backend argument string (default: empty)
        --probe <COMMAND>     Connect, run COMMAND, disconnect and report
    -v, --version             Print version information
        --help                Print this help message

BACKEND FLAGS:
    all:       -d <delimiter>  -ns <namespace separator>
    memory:    -m <max keys>
    embedded:  -f <path>  -e <flags: 1 read-only, 2 temporary>
    remote:    -h <host>  -p <port>  -a <password>

EXAMPLES:
    kvbridge                                  # In-memory shell
    kvbridge -b embedded -c "-f /tmp/kv.db"   # On-disk database
    kvbridge -b remote -c "-p 6380"           # Redis-style server on port 6380
    kvbridge -b remote --probe PING           # Connectivity check

SESSION:
    > SET name "Ariz"
    OK
    > HELP GET
    GET key
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging (RUST_LOG overrides the default level)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if let Some(command) = config.probe {
        let report = probe_kind(config.backend, &config.config, Some(command)).await;
        print!("{}", report.output);
        match report.error {
            None => {
                println!("probe ok ({} ms)", report.elapsed.as_millis());
                return Ok(());
            }
            Some(error) => anyhow::bail!(
                "probe failed after {} ms: {}",
                report.elapsed.as_millis(),
                error
            ),
        }
    }

    let mut session = Session::connect(config.backend, &config.config)?;
    info!(backend = %session.kind(), config = %session.config_string(), "Session started");

    // The shell blocks on stdin between commands
    tokio::task::block_in_place(|| repl(&mut session))?;

    if session.is_connected() {
        if let Err(e) = session.disconnect() {
            warn!(error = %e, "Disconnect failed");
        }
    }
    Ok(())
}

/// Reads command lines until EOF or QUIT.
fn repl(session: &mut Session) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "{}> ", session.kind())?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(stdout)?;
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tree = session.execute(line);
        let text = tree.to_text();
        write!(stdout, "{}", text)?;
        if !text.is_empty() && !text.ends_with('\n') {
            writeln!(stdout)?;
        }
        if let Some(error) = tree.error() {
            writeln!(stdout, "(error) {}", error)?;
        }

        let is_quit = line
            .split_whitespace()
            .next()
            .is_some_and(|name| name.eq_ignore_ascii_case("QUIT"));
        if is_quit && tree.is_ok() {
            return Ok(());
        }
    }
}
