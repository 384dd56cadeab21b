use clap::Parser;
use fhub_server::{Args, Server};

#[fhub_runtime::main(high_performance, thread_name = "fhub-server")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    Server::from_args(&args)?.run().await?;
    Ok(())
}
