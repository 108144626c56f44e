use clap::{Args, Subcommand};

pub mod serve;

use crate::cli::op::Op;

crate::command_enum! {
    (Serve, serve::Serve),
}

// Rename the generated Command to DirectoryCommand for clarity
pub type DirectoryCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Directory {
    #[command(subcommand)]
    pub command: DirectoryCommand,
}

#[async_trait::async_trait]
impl Op for Directory {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
