//! Standalone host binary.
//!
//! Usage:
//!   cargo run -p canvas_host -- [--config cache.json] [--threads 4] [--rounds 2000] [--bitmaps 8]
//!
//! Creates one device and a set of bitmaps, then lets several worker threads
//! wrap random bitmaps, hold or release the wrappers, and occasionally close
//! them. Each worker checks that whatever it still holds is the wrapper the
//! cache hands back. Cache statistics are printed as JSON at the end.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use canvas_core::prelude::*;
use rand::Rng;
use tracing::{info, warn};

struct HostArgs {
    config: Option<PathBuf>,
    threads: usize,
    rounds: usize,
    bitmaps: usize,
}

fn parse_args() -> HostArgs {
    let mut args = HostArgs {
        config: None,
        threads: 4,
        rounds: 2000,
        bitmaps: 8,
    };
    let argv: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--config" if i + 1 < argv.len() => {
                args.config = Some(PathBuf::from(&argv[i + 1]));
                i += 2;
            }
            "--threads" if i + 1 < argv.len() => {
                args.threads = argv[i + 1].parse().unwrap_or(4);
                i += 2;
            }
            "--rounds" if i + 1 < argv.len() => {
                args.rounds = argv[i + 1].parse().unwrap_or(2000);
                i += 2;
            }
            "--bitmaps" if i + 1 < argv.len() => {
                args.bitmaps = argv[i + 1].parse().unwrap_or(8);
                i += 2;
            }
            _ => i += 1,
        }
    }
    args
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CacheConfig> {
    let Some(path) = path else {
        return Ok(CacheConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    CacheConfig::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
}

/// Per-worker outcome.
#[derive(Debug, Default)]
struct WorkerReport {
    acquired: usize,
    closed: usize,
    identity_violations: usize,
}

fn run_worker(
    resources: CanvasResources,
    natives: Arc<Vec<NativeHandle<NativeBitmap>>>,
    rounds: usize,
) -> WorkerReport {
    let mut rng = rand::thread_rng();
    let mut held: Vec<Option<Arc<CanvasBitmap>>> = vec![None; natives.len()];
    let mut report = WorkerReport::default();

    for _ in 0..rounds {
        let slot = rng.gen_range(0..natives.len());
        match resources.bitmaps.get_or_create(&natives[slot]) {
            Ok(wrapper) => {
                report.acquired += 1;
                if let Some(previous) = &held[slot] {
                    // Only a wrapper closed elsewhere may be replaced while held.
                    if !Arc::ptr_eq(previous, &wrapper) && !previous.is_closed() {
                        report.identity_violations += 1;
                    }
                }
                held[slot] = Some(wrapper);
            }
            Err(e) => warn!(error = %e, "get_or_create failed"),
        }

        match rng.gen_range(0..100) {
            0..=29 => held[slot] = None,
            30 => {
                if let Some(wrapper) = held[slot].take() {
                    wrapper.close();
                    report.closed += 1;
                }
            }
            _ => {}
        }
    }
    report
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args();
    let cfg = load_config(args.config.as_ref())?;
    info!(
        threads = args.threads,
        rounds = args.rounds,
        bitmaps = args.bitmaps,
        prune_threshold = cfg.prune_threshold,
        "Starting canvas host"
    );

    let resources = CanvasResources::new(cfg);
    let device = resources.create_device("host").context("create device")?;
    let native_device = device.native().context("device native")?;

    let mut natives = Vec::with_capacity(args.bitmaps.max(1));
    for n in 0..args.bitmaps.max(1) {
        let shade = (n * 31 % 256) as u8;
        let bitmap = NativeBitmap::filled(&native_device, 16, 16, [shade, shade, shade, 255])
            .with_context(|| format!("create bitmap {n}"))?;
        natives.push(NativeHandle::new(bitmap));
    }
    let natives = Arc::new(natives);

    let mut workers = Vec::with_capacity(args.threads);
    for _ in 0..args.threads.max(1) {
        let resources = resources.clone();
        let natives = natives.clone();
        let rounds = args.rounds;
        workers.push(tokio::task::spawn_blocking(move || {
            run_worker(resources, natives, rounds)
        }));
    }

    let mut total = WorkerReport::default();
    for worker in workers {
        let report = worker.await.context("worker panicked")?;
        total.acquired += report.acquired;
        total.closed += report.closed;
        total.identity_violations += report.identity_violations;
    }

    let pruned = resources.prune_expired();
    info!(
        acquired = total.acquired,
        closed = total.closed,
        pruned,
        "Workers finished"
    );
    println!("{}", serde_json::to_string_pretty(&resources.stats())?);

    anyhow::ensure!(
        total.identity_violations == 0,
        "{} identity violations observed",
        total.identity_violations
    );
    Ok(())
}
