use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use isoserve::config::{AppState, Cli, Config};
use isoserve::server::{Server, ShutdownSignal};
use isoserve::{logger, ServerError};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), ServerError> {
    let cfg = Config::load(cli)?;
    logger::init(&cfg)?;
    let state = Arc::new(AppState::new(cfg)?);

    // Thread count follows server.workers, default is one per CPU core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = state.config.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build().map_err(ServerError::Runtime)?;

    runtime.block_on(async_main(state))
}

async fn async_main(state: Arc<AppState>) -> Result<(), ServerError> {
    let server = Server::bind(Arc::clone(&state))?;
    let shutdown = ShutdownSignal::register().map_err(ServerError::Signal)?;
    let addr = server.local_addr();

    logger::log_server_start(&addr, &state.root, &state.config);
    println!("Listening on port {}. Press Ctrl+C to stop.", addr.port());

    server.run_until(shutdown.recv()).await;
    Ok(())
}
