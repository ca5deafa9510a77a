mod cli;
mod logging;
mod server;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    let _log_guard = logging::init(&cli.log_level, cli.log_dir.as_deref());
    let config = cli.into_config();

    if let Err(err) = server::run(config) {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}
