// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use attila_emu::core::config::EmulatorConfig;
use attila_emu::core::error::Result;
use attila_emu::core::gpu::{GpuEmulator, PngSink, StopReason, Units};
use attila_emu::core::trace::TraceReader;
use clap::Parser;
use log::{error, info, warn};

/// ATTILA GPU trace player
#[derive(Parser)]
#[command(name = "attila-emu")]
#[command(about = "Replays an ATTILA GPU command trace", long_about = None)]
struct Args {
    /// Path to the trace file
    trace_file: PathBuf,

    /// Emulator configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(short = 'f', long)]
    frames: Option<u32>,

    /// Directory receiving a PNG of every swapped frame
    #[arg(short = 'd', long)]
    dump_dir: Option<PathBuf>,

    /// Only update state and counters on draw calls
    #[arg(long)]
    skip_batches: bool,

    /// Record validation logs and save them as JSON next to the dumps
    #[arg(long)]
    validation: bool,

    /// Save a snapshot into this directory when the trace stops
    #[arg(short = 's', long)]
    snapshot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger with default level INFO
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("attila-emu v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            EmulatorConfig::load(path)?
        }
        None => EmulatorConfig::default(),
    };
    config.debug.skip_batches |= args.skip_batches;
    config.debug.validation |= args.validation;

    let mut gpu = GpuEmulator::new(&config, Units::detached())?;
    if let Some(dir) = &args.dump_dir {
        info!("Writing frames to: {}", dir.display());
        gpu.set_frame_sink(Box::new(PngSink::new(dir)?));
    }

    let abort = gpu.abort_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        // A second Ctrl-C exits at once
        if abort.swap(true, Ordering::Relaxed) {
            std::process::exit(130);
        }
    }) {
        warn!("Ctrl-C will not stop the replay cleanly: {}", e);
    }

    info!("Replaying trace: {}", args.trace_file.display());
    let mut trace = TraceReader::open(&args.trace_file)?;

    let outcome = match gpu.run(&mut trace, args.frames) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(
                "Error at frame {} batch {} after {} transactions: {}",
                gpu.frame_counter(),
                gpu.batch_counter(),
                trace.transactions_read(),
                e
            );
            return Err(e);
        }
    };

    let reason = match outcome.reason {
        StopReason::EndOfTrace => "end of trace",
        StopReason::FrameLimit => "frame limit",
        StopReason::Aborted => "aborted",
    };
    info!(
        "Stopped ({}): {} transactions, {} frames",
        reason, outcome.transactions, outcome.frames
    );

    let stats = gpu.stats();
    info!(
        "Draws: {} ({} skipped) | Triangles: {} | Stamps shaded: {}",
        stats.draws, stats.skipped_draws, stats.triangles_rasterized, stats.stamps_shaded
    );

    let validation_dir = args.dump_dir.as_deref().unwrap_or(Path::new("."));
    gpu.save_run_outputs(validation_dir, args.snapshot_dir.as_deref())
}
