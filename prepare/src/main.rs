use clap::Parser;
use prepare::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let mut cmd: Cli = Cli::parse();

    let level = match cmd.verbosity() {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cmd.run_program() {
        tracing::error!("{e}");
        eprintln!("错误: {e}");
        std::process::exit(1);
    }
}
