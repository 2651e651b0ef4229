use crate::demo::{run_evaluation_demo, run_violations_demo, EvaluateArgs, ViolationsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};

use call_qc::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Call Quality Control",
    about = "Run the sales-call quality control service and its demo commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Evaluate the seeded demo dataset and print the resulting scores
    Evaluate(EvaluateArgs),
    /// Scan the seeded demo dataset for compliance violations
    Violations(ViolationsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Evaluate(args) => run_evaluation_demo(args).await,
        Command::Violations(args) => run_violations_demo(args).await,
    }
}
