pub use clap::Parser;

use std::path::PathBuf;

use hoard_daemon::DEFAULT_DIRECTORY_PORT;

#[derive(Parser, Debug)]
#[command(name = "hoard")]
#[command(about = "Publish, discover and back up files across a peer-to-peer swarm")]
pub struct Args {
    /// Port of the directory node
    #[arg(long, global = true, default_value_t = DEFAULT_DIRECTORY_PORT)]
    pub port: u16,

    /// Path to the hoard state directory (defaults to ~/.hoard)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
