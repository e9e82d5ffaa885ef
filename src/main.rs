use std::io::{self, BufWriter};
use std::process::ExitCode;

use clap::Parser;

use blocksync::{serve, Outcome, ServeOptions};

/// Command-line interface for the remote half of blocksync.
///
/// The local peer launches this over ssh and talks to it through
/// stdin/stdout, so nothing but protocol bytes may go to stdout.
#[derive(Parser, Debug)]
#[command(name = "blocksync", version, about = "Remote side of a block-level file synchronizer")]
struct Cli {
    /// Expect the older header layout without a start block offset
    #[arg(long)]
    no_offset: bool,

    /// Answer block requests in lockstep with the digest stream
    #[arg(long)]
    serial: bool,

    /// Packets buffered ahead of the output writer
    #[arg(
        long,
        value_name = "PACKETS",
        default_value_t = 64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    queue_depth: u64,
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the protocol. Filter via BLOCKSYNC_LOG.
    env_logger::Builder::from_env(env_logger::Env::new().filter("BLOCKSYNC_LOG")).init();

    let cli = Cli::parse();
    let options = ServeOptions {
        offset_supported: !cli.no_offset,
        concurrent_serving: !cli.serial,
        queue_depth: cli.queue_depth as usize,
    };

    match serve(io::stdin(), BufWriter::new(io::stdout()), &options) {
        Ok(report) => {
            if let Outcome::Truncated { blocks, .. } = report.outcome {
                log::warn!("File shrank during scan after {} blocks", blocks);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Session failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
