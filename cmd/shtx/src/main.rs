use clap::Parser;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber, filter::Directive};

mod cli;

fn init_tracing(log_level: Level) {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(log_level))
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }
}

fn main() {
    let cli = cli::ShtxCLI::parse();
    init_tracing(cli.log_level);
    if let Err(e) = cli::start(cli) {
        tracing::error!("{e:?}");
        std::process::exit(1);
    }
}
