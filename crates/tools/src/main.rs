//! Nestor CLI
//!
//! Runs reference workloads under a policy chosen on the command line.
//!
//! Usage: `nestor run <workload> --policy <seq|dynamic|static|device> [--size N]`

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use nestor_runtime::{ForallPolicy, HostStatic, KernelPolicy, Runtime, RuntimeConfig, SeqExec};
use nestor_tools::workloads;

/// Chunk size used by `--policy static`.
const STATIC_CHUNK: usize = 256;

/// Workgroup size used by `--policy device`.
const DEVICE_WORKGROUP: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "nestor")]
#[command(about = "Run portable loop-nest workloads on a chosen execution policy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a reference workload and report its result and timing
    Run {
        workload: Workload,

        /// Execution policy
        #[arg(long, value_enum, default_value = "dynamic")]
        policy: PolicyKind,

        /// Vector length, or matrix side for `frobenius` and `histogram`
        #[arg(long, default_value = "1000000")]
        size: usize,

        /// Grain size for the dynamic policy; sized from the pool if omitted
        #[arg(long)]
        grain: Option<usize>,

        /// JSON runtime configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Read device limits from the GPU adapter (needs the `gpu` feature)
        #[arg(long)]
        probe_device: bool,
    },

    /// Print the default runtime configuration as JSON
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Workload {
    Dot,
    MinLoc,
    Frobenius,
    Histogram,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyKind {
    Seq,
    Dynamic,
    Static,
    Device,
}

fn main() {
    nestor_tools::init_logging();

    match Cli::parse().command {
        Command::Config => match serde_json::to_string_pretty(&RuntimeConfig::default()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to serialize configuration: {}", e);
                process::exit(1);
            }
        },
        Command::Run {
            workload,
            policy,
            size,
            grain,
            config,
            probe_device,
        } => {
            let mut config = match config {
                Some(path) => match RuntimeConfig::from_path(&path) {
                    Ok(config) => {
                        info!("Loaded configuration from {}", path.display());
                        config
                    }
                    Err(e) => {
                        error!("Failed to load configuration '{}': {}", path.display(), e);
                        process::exit(1);
                    }
                },
                None => RuntimeConfig::default(),
            };
            if let Some(grain) = grain {
                config.grain_size = grain;
            }
            if probe_device && nestor_gpu::configure_device_limits(&mut config) {
                info!(limits = ?config.device, "Using probed device limits");
            }

            let runtime = match Runtime::new(config) {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start runtime: {}", e);
                    process::exit(1);
                }
            };

            let outcome = match policy {
                PolicyKind::Seq => run(&runtime, &SeqExec, workload, size),
                PolicyKind::Dynamic => {
                    let dynamic = if grain.is_some() {
                        runtime.dynamic_policy()
                    } else {
                        runtime.auto_dynamic_policy(size)
                    };
                    run(&runtime, &dynamic, workload, size)
                }
                PolicyKind::Static => run(&runtime, &HostStatic::<STATIC_CHUNK>, workload, size),
                PolicyKind::Device => {
                    let device = runtime.device_policy::<DEVICE_WORKGROUP>();
                    run(&runtime, &device, workload, size)
                }
            };

            if let Err(e) = outcome {
                error!("Workload failed: {}", e);
                process::exit(1);
            }
        }
    }
}

fn run<P>(
    runtime: &Runtime,
    policy: &P,
    workload: Workload,
    size: usize,
) -> nestor_runtime::Result<()>
where
    P: ForallPolicy + KernelPolicy,
{
    info!(
        ?workload,
        policy = P::NAME,
        size,
        workers = runtime.num_workers(),
        "Running workload"
    );
    let layout = runtime.config().layout;
    let start = Instant::now();

    runtime.install(|| -> nestor_runtime::Result<()> {
        match workload {
            Workload::Dot => {
                let value = workloads::dot(policy, &layout, size)?;
                info!(value, "dot product");
            }
            Workload::MinLoc => {
                let min = workloads::min_loc(policy, size)?;
                info!(value = min.value, loc = min.loc, "minimum");
            }
            Workload::Frobenius => {
                let norm = workloads::frobenius(policy, size)?;
                info!(norm, "frobenius norm");
            }
            Workload::Histogram => {
                let bins = workloads::histogram(policy, size)?;
                info!(?bins, "histogram");
            }
        }
        Ok(())
    })?;

    info!(elapsed_ms = start.elapsed().as_secs_f64() * 1e3, "Workload complete");
    Ok(())
}
