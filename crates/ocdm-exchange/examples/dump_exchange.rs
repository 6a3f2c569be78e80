//! Dump the administration record and payload of a live exchange region.
//!
//! Usage:
//!   cargo run --example dump_exchange -p ocdm-exchange -- ocdm-session-1
//!   cargo run --example dump_exchange -p ocdm-exchange -- ocdm-session-1 --bytes 256

use anyhow::{Context, Result};
use clap::Parser;
use ocdm_exchange::DataExchange;

#[derive(Debug, Parser)]
#[command(name = "dump_exchange", about = "Print the contents of an OCDM exchange region")]
struct Args {
    /// Region name, as passed to `DataExchange::create`
    name: String,

    /// Number of payload bytes to hex dump
    #[arg(long, default_value_t = 64)]
    bytes: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let exchange = DataExchange::open(&args.name)
        .with_context(|| format!("failed to open exchange region {}", args.name))?;
    let record = exchange
        .administration()
        .context("administration area is truncated")?;

    println!("Region:          {}", exchange.name());
    println!("Payload:         {} / {} bytes", exchange.payload_len(), exchange.payload_capacity());
    println!("Status:          {}", record.status);
    match record.key_id() {
        Some(key_id) => println!("Key id:          {}", hex::encode(key_id)),
        None => println!("Key id:          (none)"),
    }
    println!("IV ({:>2} bytes):   {}", record.iv_length, hex::encode(record.iv()));
    println!("Sub-samples:     {} bytes", record.sub_length);
    if !record.sub_sample_data().is_empty() {
        for line in record.sub_sample_data().chunks(16) {
            println!("    {}", hex::encode(line));
        }
    }
    println!("InitWithLast15:  {}", record.init_with_last_15);

    let mut payload = vec![0u8; args.bytes.min(exchange.payload_len())];
    let copied = exchange.read(&mut payload);
    if copied > 0 {
        println!("--- Payload (first {copied} bytes) ---");
        for (row, line) in payload[..copied].chunks(16).enumerate() {
            println!("  {:08x}  {}", row * 16, hex::encode(line));
        }
    }

    Ok(())
}
