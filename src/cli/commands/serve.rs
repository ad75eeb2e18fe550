//! `serve` command

use anyhow::Result;
use clap::Args;

use crate::config::CloakstreamConfig;
use crate::server;

#[derive(Args)]
pub struct ServeArgs {
    /// Bind address, overriding the configured one
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Uploads directory, overriding the configured one
    #[arg(short, long)]
    pub uploads_dir: Option<String>,
}

pub async fn execute(args: ServeArgs, mut config: CloakstreamConfig) -> Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(uploads_dir) = args.uploads_dir {
        config.uploads_dir = uploads_dir;
    }
    server::serve(config).await
}
