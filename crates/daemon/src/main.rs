// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Cleanup, Directory, Download, Init, Lookup, Mirror, New, Store};
use hoard_daemon::process::{init_logging, LogConfig};

command_enum! {
    (Init, Init),
    (New, New),
    (Store, Store),
    (Lookup, Lookup),
    (Mirror, Mirror),
    (Download, Download),
    (Cleanup, Cleanup),
    (Directory, Directory),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging follows config.toml once hoard is initialized
    let guards = init_logging(&LogConfig::resolve(args.config_path.clone()));

    let ctx = cli::op::OpContext::new(args.port, args.config_path);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush buffered log lines before exiting
    drop(guards);
    std::process::exit(code);
}
