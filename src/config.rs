//! CLI configuration (C12).
//!
//! The server's own entry point is in scope even though reverse
//! engineering an external CLI's contract is not (SPEC_FULL.md §4.11):
//! this is the argument surface of *this* binary, not a backend's.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Standard input/output framed with `Content-Length` headers.
    Stdio,
    /// A TCP socket, for editors that launch the server out-of-process
    /// and connect to it.
    Tcp,
    /// A Unix domain socket on Unix, a named pipe on Windows.
    Pipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Top-level server configuration, parsed once at startup.
#[derive(Debug, Parser, Clone)]
#[command(name = "polyglot-lsp", about = "Multi-backend LSP dispatch core")]
pub struct ServerConfig {
    #[arg(long, value_enum, default_value = "stdio")]
    pub transport: Transport,

    /// Port to listen on when `--transport tcp`.
    #[arg(long, default_value_t = 9257)]
    pub port: u16,

    /// Unix domain socket / named pipe path when `--transport pipe`.
    #[arg(long)]
    pub pipe_path: Option<PathBuf>,

    /// Directory to write log files to; logs also go to stderr.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Overrides `RUST_LOG`-style filtering (e.g. `polyglot_lsp=debug`).
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Path to the compile-driven backend executable. Falls back to
    /// `$PATH` lookup when unset.
    #[arg(long)]
    pub compile_driven_backend: Option<PathBuf>,

    /// Path to the C-family backend executable.
    #[arg(long)]
    pub cfamily_backend: Option<PathBuf>,

    /// Disables work-done progress reporting, even if the client
    /// advertises support for it.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl ServerConfig {
    pub fn parse_args() -> Self {
        Self::resolve_env_fallbacks(ServerConfig::parse())
    }

    /// Fills in unset fields from environment variables, mirroring the
    /// fallback pattern the teacher uses for its own node-address flags.
    fn resolve_env_fallbacks(mut config: Self) -> Self {
        if let Ok(level) = std::env::var("POLYGLOT_LSP_LOG_LEVEL") {
            config.log_filter.get_or_insert(level);
        }
        if config.compile_driven_backend.is_none() {
            if let Ok(path) = std::env::var("POLYGLOT_LSP_COMPILE_BACKEND_PATH") {
                config.compile_driven_backend = Some(PathBuf::from(path));
            }
        }
        if config.cfamily_backend.is_none() {
            if let Ok(path) = std::env::var("POLYGLOT_LSP_CLANG_BACKEND_PATH") {
                config.cfamily_backend = Some(PathBuf::from(path));
            }
        }
        config
    }

    /// Validates transport-dependent required fields that `clap` alone
    /// cannot express against a `value_enum`-selected transport.
    pub fn validate(&self) -> Result<(), String> {
        match self.transport {
            Transport::Pipe if self.pipe_path.is_none() => {
                Err("--pipe-path is required when --transport pipe is used".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stdio_and_pretty() {
        let config = ServerConfig::parse_from(["polyglot-lsp"]);
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.no_progress);
    }

    #[test]
    fn tcp_transport_accepts_port_override() {
        let config = ServerConfig::parse_from(["polyglot-lsp", "--transport", "tcp", "--port", "4000"]);
        assert_eq!(config.transport, Transport::Tcp);
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn pipe_transport_without_path_fails_validation() {
        let config = ServerConfig::parse_from(["polyglot-lsp", "--transport", "pipe"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn pipe_transport_with_path_passes_validation() {
        let config = ServerConfig::parse_from(["polyglot-lsp", "--transport", "pipe", "--pipe-path", "/tmp/x.sock"]);
        assert!(config.validate().is_ok());
    }
}
