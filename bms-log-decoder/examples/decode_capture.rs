//! Standalone candump capture decoder
//!
//! Decodes a candump log with the two BMS parameter group layouts and prints
//! every frame, then a summary of the arbitration IDs seen.
//!
//! Usage:
//!   decode_capture <candump.log> [--limit <count>] [--verbose]
//!
//! Example:
//!   decode_capture bench_run.log --limit 100 --verbose

use bms_log_decoder::{decode_frame, format_hex, FrameSource, ReplaySource, SourcePoll};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Default)]
struct CaptureStats {
    total_frames: usize,
    decoded: usize,
    decode_errors: usize,
    ignored: usize,
    unique_ids: HashMap<u32, usize>,
}

impl CaptureStats {
    fn print_summary(&self) {
        println!("\n=== DECODING SUMMARY ===");
        println!("Total frames: {}", self.total_frames);
        println!("Decoded: {}", self.decoded);
        println!("Decode errors: {}", self.decode_errors);
        println!("Ignored (unknown ID): {}", self.ignored);
        println!("Unique arbitration IDs: {}", self.unique_ids.len());

        if !self.unique_ids.is_empty() {
            println!("\nTop 10 Most Frequent IDs:");
            let mut sorted: Vec<_> = self.unique_ids.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1));
            for (id, count) in sorted.iter().take(10) {
                println!("  0x{:08X}: {} times", id, count);
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Library diagnostics (e.g. RUST_LOG=bms_log_decoder=debug)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <candump.log> [--limit <count>] [--verbose]", args[0]);
        std::process::exit(1);
    }

    let capture = PathBuf::from(&args[1]);
    let mut limit: Option<usize> = None;
    let mut verbose = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => {
                i += 1;
                if i < args.len() {
                    limit = Some(args[i].parse()?);
                }
            }
            "--verbose" | "-v" => verbose = true,
            other => eprintln!("Unknown argument: {}", other),
        }
        i += 1;
    }

    println!("=== BMS Capture Decoder ===");
    println!("Capture: {:?}\n", capture);

    let mut source = ReplaySource::open(&capture)?;
    let mut stats = CaptureStats::default();

    while let SourcePoll::Frame(frame) = source.poll(Duration::ZERO)? {
        if let Some(max) = limit {
            if stats.total_frames >= max {
                println!("\n... (limit of {} frames reached)", max);
                break;
            }
        }

        stats.total_frames += 1;
        *stats.unique_ids.entry(frame.arbitration_id).or_insert(0) += 1;

        match decode_frame(&frame) {
            Some(Ok(reading)) => {
                stats.decoded += 1;
                println!("0x{:08X} [{}] {}", frame.arbitration_id, format_hex(&frame.payload), reading);
            }
            Some(Err(e)) => {
                stats.decode_errors += 1;
                eprintln!("0x{:08X} error: {}", frame.arbitration_id, e);
            }
            None => {
                stats.ignored += 1;
                if verbose {
                    println!("0x{:08X} [{}] (ignored)", frame.arbitration_id, format_hex(&frame.payload));
                }
            }
        }
    }

    source.close();
    stats.print_summary();

    Ok(())
}
