use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::{TcpListener, UnixListener};
use tower_lsp::{LspService, Server};
use tracing::{error, info};

use polyglot_lsp::config::{ServerConfig, Transport};
use polyglot_lsp::logging;
use polyglot_lsp::registry::BackendPaths;
use polyglot_lsp::scheduler::{self, Scheduler};
use polyglot_lsp::PolyglotBackend;

/// Resolves a configured backend executable path, falling back to a
/// `$PATH` lookup by the backend's conventional binary name the way the
/// teacher's `ServerConfig` resolves its own external dependencies.
fn resolve_backend_path(configured: Option<PathBuf>, default_name: &str) -> PathBuf {
    configured.unwrap_or_else(|| PathBuf::from(default_name))
}

async fn run_stdio(scheduler: Arc<Scheduler>, service: LspService<PolyglotBackend>, socket: tower_lsp::ClientSocket) -> io::Result<()> {
    info!("listening on stdio");
    let stdin = scheduler::intercept(scheduler, tokio::io::stdin());
    let stdout = tokio::io::stdout();
    Server::new(stdin, stdout, socket).serve(service).await;
    Ok(())
}

async fn run_tcp(
    port: u16,
    make_service: impl Fn(Arc<Scheduler>) -> (LspService<PolyglotBackend>, tower_lsp::ClientSocket),
) -> io::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    info!(%port, "listening on tcp");
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "accepted connection");
        let (read, write) = tokio::io::split(stream);
        let scheduler = Scheduler::new();
        let sniffed = scheduler::intercept(scheduler.clone(), read);
        let (service, socket) = make_service(scheduler);
        tokio::spawn(async move {
            Server::new(sniffed, write, socket).serve(service).await;
        });
    }
}

#[cfg(unix)]
async fn run_pipe(
    path: PathBuf,
    make_service: impl Fn(Arc<Scheduler>) -> (LspService<PolyglotBackend>, tower_lsp::ClientSocket),
) -> io::Result<()> {
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    let listener = UnixListener::bind(&path)?;
    let cleanup_path = path.clone();
    let _cleanup = scopeguard::guard((), move |_| {
        let _ = std::fs::remove_file(&cleanup_path);
    });
    info!(path = %path.display(), "listening on unix socket");
    loop {
        let (stream, _addr) = listener.accept().await?;
        let (read, write) = tokio::io::split(stream);
        let scheduler = Scheduler::new();
        let sniffed = scheduler::intercept(scheduler.clone(), read);
        let (service, socket) = make_service(scheduler);
        tokio::spawn(async move {
            Server::new(sniffed, write, socket).serve(service).await;
        });
    }
}

#[cfg(windows)]
async fn run_pipe(
    path: PathBuf,
    make_service: impl Fn(Arc<Scheduler>) -> (LspService<PolyglotBackend>, tower_lsp::ClientSocket),
) -> io::Result<()> {
    use tokio::net::windows::named_pipe::ServerOptions;

    let pipe_name = path.to_string_lossy().to_string();
    loop {
        let server = ServerOptions::new().create(&pipe_name)?;
        server.connect().await?;
        let (read, write) = tokio::io::split(server);
        let scheduler = Scheduler::new();
        let sniffed = scheduler::intercept(scheduler.clone(), read);
        let (service, socket) = make_service(scheduler);
        tokio::spawn(async move {
            Server::new(sniffed, write, socket).serve(service).await;
        });
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let config = ServerConfig::parse_args();
    if let Err(message) = config.validate() {
        eprintln!("invalid configuration: {message}");
        std::process::exit(2);
    }

    logging::init(config.log_format, config.log_filter.as_deref());
    info!(transport = ?config.transport, "starting polyglot-lsp");

    let backend_paths = BackendPaths {
        compile_driven: resolve_backend_path(config.compile_driven_backend.clone(), "sourcekit-lsp"),
        cfamily: resolve_backend_path(config.cfamily_backend.clone(), "clangd"),
    };
    let no_progress = config.no_progress;

    let result = match config.transport {
        Transport::Stdio => {
            let scheduler = Scheduler::new();
            let backend_scheduler = scheduler.clone();
            let (service, socket) = LspService::build(move |client| {
                PolyglotBackend::with_scheduler(client, backend_paths.clone(), no_progress, backend_scheduler.clone())
            })
            .finish();
            run_stdio(scheduler, service, socket).await
        }
        Transport::Tcp => {
            run_tcp(config.port, move |scheduler| {
                let backend_paths = backend_paths.clone();
                LspService::build(move |client| PolyglotBackend::with_scheduler(client, backend_paths.clone(), no_progress, scheduler.clone())).finish()
            })
            .await
        }
        Transport::Pipe => {
            let path = config.pipe_path.clone().expect("validated above");
            run_pipe(path, move |scheduler| {
                let backend_paths = backend_paths.clone();
                LspService::build(move |client| PolyglotBackend::with_scheduler(client, backend_paths.clone(), no_progress, scheduler.clone())).finish()
            })
            .await
        }
    };

    if let Err(err) = &result {
        error!(%err, "server terminated with an error");
    }
    result
}
