use clap::{Parser, Subcommand};

mod commands;
mod context;

use commands::{
    ClosePositionArgs, ExitPolicyArgs, OpenPositionArgs, ResetArgs, RunDeskArgs, StatusArgs,
};

#[derive(Parser, Debug)]
#[command(name = "gex-desk")]
#[command(about = "Paper straddle desk with live mark-to-market against Deribit", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    config: String,

    /// Profile overlay (loads Config.<profile>.toml next to the config file)
    #[arg(long, global = true, env = "GEX_DESK_PROFILE")]
    profile: Option<String>,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MTM poller and exit policy until Ctrl+C
    Run(RunDeskArgs),
    /// Open a paper straddle at live quotes
    Open(OpenPositionArgs),
    /// Close a paper straddle
    Close(ClosePositionArgs),
    /// Show open and closed positions with equity
    Status(StatusArgs),
    /// Configure take-profit / stop-loss
    ExitPolicy(ExitPolicyArgs),
    /// Drop every position and restore starting cash
    Reset(ResetArgs),
}

fn init_logging(log_file: Option<&str>) -> anyhow::Result<()> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_file.as_deref())?;

    let ctx = context::DeskContext::build(&cli.config, cli.profile.as_deref())?;

    match cli.command {
        Commands::Run(args) => commands::run_desk(ctx, args).await?,
        Commands::Open(args) => commands::run_open_position(&ctx, args).await?,
        Commands::Close(args) => commands::run_close_position(&ctx, args).await?,
        Commands::Status(args) => commands::run_status(&ctx, args).await?,
        Commands::ExitPolicy(args) => commands::run_exit_policy(&ctx, args)?,
        Commands::Reset(args) => commands::run_reset(&ctx, args)?,
    }

    Ok(())
}
