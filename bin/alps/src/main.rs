use clap::Parser;
use clap_handler::Handler;
use tracing_subscriber::filter::LevelFilter;

mod commands;

#[derive(Parser, Clone)]
#[clap(name = "alps", version, about)]
struct AlpsArgs {
    /// Debug output
    #[clap(long, global = true, alias = "debug")]
    verbose: bool,

    #[clap(subcommand)]
    command: commands::AlpsCommand,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AlpsArgs::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    args.command.run().await
}
