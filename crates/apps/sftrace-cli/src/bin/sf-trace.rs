use clap::Parser;
use sftrace_cli::logging;
use sftrace_cli::{run_cli, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.verbose, cli.quiet) {
        // Commands still run; only diagnostics are lost.
        eprintln!("sf-trace: logging disabled: {err}");
    }
    if let Err(err) = run_cli(cli).await {
        eprintln!("sf-trace: {err:#}");
        std::process::exit(1);
    }
}
