use crate::demo::{run_demo, run_shifts, DemoArgs, ShiftsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use yard_tracker::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Yard Tracker",
    about = "Track car scans, shift windows and overdue status for a vehicle yard",
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
    /// Print the configured shift scheme and the shift in effect at a given time
    Shifts(ShiftsArgs),
    /// Run a scripted in-memory scan session and print the resulting yard view
    Demo(DemoArgs),
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
        Command::Shifts(args) => run_shifts(args),
        Command::Demo(args) => run_demo(args),
    }
}
