use clap::Parser;
use env_logger::Env;
use log::{error, info};

use district_zonal_stats::cli::Args;
use district_zonal_stats::{pipeline, Result};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== District Zonal Statistics ===");

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()?;
        info!("Using {} threads", n_threads);
    } else {
        info!("Using all available threads");
    }

    let summary = pipeline::run(&args)?;

    for (code, path) in &summary.succeeded {
        info!("District {}: {}", code, path.display());
    }
    if !summary.is_success() {
        for (code, reason) in &summary.failed {
            error!("District {}: {}", code, reason);
        }
        std::process::exit(1);
    }

    info!("=== Done! ===");
    Ok(())
}
