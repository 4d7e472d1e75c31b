//! commitlog CLI
//!
//! Operates a commit log directory from the command line.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Buf;
use clap::{Parser, Subcommand};
use commitlog::storage::LEN_WIDTH;
use commitlog::{Config, Follower, Log, Record};
use tracing_subscriber::{fmt, EnvFilter};

/// commitlog CLI
#[derive(Parser, Debug)]
#[command(name = "commitlog")]
#[command(about = "Inspect and drive a segmented commit log")]
#[command(version)]
struct Args {
    /// Log directory
    #[arg(short, long, default_value = "./commitlog_data")]
    dir: PathBuf,

    /// Store size in bytes at which a segment rotates
    #[arg(long, default_value = "1024")]
    max_store_bytes: u64,

    /// Index capacity in bytes (12 bytes per record)
    #[arg(long, default_value = "1024")]
    max_index_bytes: u64,

    /// First offset of a brand-new log
    #[arg(long, default_value = "0")]
    initial_offset: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append one record per value
    Append {
        /// Values to append
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Read the record at an offset
    Read {
        /// The offset to read
        offset: u64,
    },

    /// Show offsets and segments
    Info,

    /// Decode every record from the raw store bytes
    Dump,

    /// Remove segments whose records are all at or below an offset
    Truncate {
        /// Highest offset that may be discarded
        lowest: u64,
    },

    /// Delete all data and start over
    Reset,

    /// Print records as they are appended
    Tail {
        /// Offset to start from (defaults to the lowest retained offset)
        #[arg(short, long)]
        from: Option<u64>,

        /// Stop after this many records
        #[arg(short, long)]
        count: Option<usize>,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "200")]
        poll_ms: u64,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,commitlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("commitlog v{}", commitlog::VERSION);
    tracing::info!("Log directory: {}", args.dir.display());

    let config = Config::builder()
        .max_store_bytes(args.max_store_bytes)
        .max_index_bytes(args.max_index_bytes)
        .initial_offset(args.initial_offset)
        .build();

    let log = match Log::open(&args.dir, config) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            tracing::error!("Failed to open log: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&log, args.command) {
        tracing::error!("Command failed: {}", e);
        let _ = log.close();
        std::process::exit(1);
    }

    if let Err(e) = log.close() {
        tracing::error!("Failed to close log: {}", e);
        std::process::exit(1);
    }
}

fn run(log: &Arc<Log>, command: Commands) -> commitlog::Result<()> {
    match command {
        Commands::Append { values } => {
            for value in values {
                let offset = log.append(Record::new(value))?;
                println!("{}", offset);
            }
        }
        Commands::Read { offset } => {
            let record = log.read(offset)?;
            println!("{}\t{}", record.offset, String::from_utf8_lossy(&record.value));
        }
        Commands::Info => {
            println!("lowest offset:  {}", log.lowest_offset());
            println!("highest offset: {}", log.highest_offset());
            println!("segments:       {:?}", log.segment_base_offsets());
        }
        Commands::Dump => {
            let mut raw = Vec::new();
            log.reader().read_to_end(&mut raw)?;

            let mut buf = &raw[..];
            while buf.remaining() >= LEN_WIDTH as usize {
                let len = buf.get_u64() as usize;
                if buf.remaining() < len {
                    tracing::warn!("Truncated frame at end of dump ({} of {} bytes)", buf.remaining(), len);
                    break;
                }
                let record = Record::decode(&buf[..len])?;
                buf.advance(len);
                println!("{}\t{}", record.offset, String::from_utf8_lossy(&record.value));
            }
        }
        Commands::Truncate { lowest } => {
            log.truncate(lowest)?;
            println!("lowest offset now {}", log.lowest_offset());
        }
        Commands::Reset => {
            log.reset()?;
            println!("log reset");
        }
        Commands::Tail { from, count, poll_ms } => {
            let from = from.unwrap_or_else(|| log.lowest_offset());
            let follower = Follower::spawn(Arc::clone(log), from, Duration::from_millis(poll_ms))?;

            let mut seen = 0usize;
            while count.map_or(true, |c| seen < c) {
                match follower.recv() {
                    Some(record) => {
                        println!("{}\t{}", record.offset, String::from_utf8_lossy(&record.value));
                        seen += 1;
                    }
                    None => break,
                }
            }
            follower.stop()?;
        }
    }
    Ok(())
}
