//! Twinport Benchmark Binary
//!
//! - Ring buffer latency (single thread)
//! - Echo round-trip lewat dua `Endpoint` di dua thread
//!
//! Usage:
//!   cargo run --release --bin twinport_bench [OPTIONS]

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing_subscriber::EnvFilter;
use twinport::core::RingBuffer;
use twinport::{Channel, Endpoint, Result};

/// Benchmark configuration
struct BenchConfig {
    messages: usize,
    payload_size: usize,
    verbose: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            messages: 100_000,
            payload_size: 64,
            verbose: false,
        }
    }
}

fn parse_args() -> BenchConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = BenchConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--messages" | "-n" => {
                if i + 1 < args.len() {
                    config.messages = args[i + 1].parse().unwrap_or(100_000);
                    i += 1;
                }
            }
            "--size" | "-s" => {
                if i + 1 < args.len() {
                    config.payload_size = args[i + 1].parse().unwrap_or(64);
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("Twinport Bench - Bounded Two-Port Duplex Channel\n");
                println!("Usage: twinport_bench [OPTIONS]\n");
                println!("Options:");
                println!("  -n, --messages <N>    Messages per run (default: 100000)");
                println!("  -s, --size <BYTES>    Payload size in bytes (default: 64)");
                println!("  -v, --verbose         Debug logging (RUST_LOG overrides)");
                println!("  -h, --help            Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "twinport=debug" } else { "twinport=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn benchmark_ring_buffer(iterations: usize) {
    println!("📊 Ring Buffer Benchmark (Lock-Free SPSC)");
    println!("-----------------------------------------");

    let mut rb: RingBuffer<u64, 65536> = RingBuffer::new();

    let start = Instant::now();
    for i in 0..iterations {
        if rb.try_push(i as u64).is_err() {
            rb.pop();
            let _ = rb.try_push(i as u64);
        }
    }
    let push_duration = start.elapsed();

    while rb.pop().is_some() {}
    for i in 0..iterations.min(rb.capacity()) {
        let _ = rb.try_push(i as u64);
    }

    let filled = rb.len();
    let start = Instant::now();
    while rb.pop().is_some() {}
    let pop_duration = start.elapsed();

    let push_ns = push_duration.as_nanos() as f64 / iterations.max(1) as f64;
    let pop_ns = pop_duration.as_nanos() as f64 / filled.max(1) as f64;

    println!("  Operations: {}", iterations);
    println!("  Push latency: {:.2} ns/op", push_ns);
    println!("  Pop latency:  {:.2} ns/op", pop_ns);
    println!();
}

fn benchmark_echo(config: &BenchConfig) -> Result<()> {
    println!("📊 Echo Benchmark (two threads, two ports)");
    println!("------------------------------------------");

    let channel = Channel::new();
    let messages = config.messages;

    let echo_channel = Arc::clone(&channel);
    let echo = thread::spawn(move || -> Result<usize> {
        let mut endpoint = Endpoint::connect(&echo_channel)?;
        let mut echoed = 0;
        while let Some(payload) = endpoint.recv() {
            endpoint.send(payload)?;
            echoed += 1;
        }
        endpoint.close()?;
        Ok(echoed)
    });

    let mut client = Endpoint::connect(&channel)?;
    let payload: Arc<[u8]> = vec![0xAB; config.payload_size].into();

    let start = Instant::now();
    let mut received = 0;
    let mut sent = 0;
    while received < messages {
        // Kirim sebanyak mungkin tanpa blocking, lalu tunggu balasan
        while sent < messages && client.try_send(Arc::clone(&payload)).is_ok() {
            sent += 1;
        }
        match client.recv() {
            Some(_) => received += 1,
            None => break,
        }
    }
    let elapsed = start.elapsed();
    client.close()?;

    let echoed = match echo.join() {
        Ok(result) => result?,
        Err(_) => {
            eprintln!("❌ Echo thread panicked");
            0
        }
    };

    let rate = received as f64 / elapsed.as_secs_f64();
    println!("  Messages: {} (echoed {})", received, echoed);
    println!("  Payload:  {} bytes", config.payload_size);
    println!("  Elapsed:  {:.3} s", elapsed.as_secs_f64());
    println!("  Rate:     {:.0} round-trips/sec", rate);
    println!();

    Ok(())
}

fn main() {
    let config = parse_args();
    init_tracing(config.verbose);

    println!("🚀 Twinport - Bounded Duplex Channel");
    println!("====================================\n");

    benchmark_ring_buffer(config.messages);

    if let Err(e) = benchmark_echo(&config) {
        eprintln!("❌ Benchmark error: {}", e);
        std::process::exit(1);
    }

    println!("✅ All benchmarks complete!");
}
