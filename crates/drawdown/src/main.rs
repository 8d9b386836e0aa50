use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{WrapErr, eyre};
use drawdown::{ExperimentFile, Summary, init_logging};
use drawdown_core::Country;

#[derive(Parser, Debug)]
#[command(name = "drawdown")]
#[command(about = "Monte Carlo evaluation of retirement withdrawal strategies")]
struct Args {
    /// Path to a YAML experiment file
    #[arg(required_unless_present = "demo")]
    experiment: Option<PathBuf>,

    /// Run a synthetic demo experiment instead of reading a file
    #[arg(long, conflicts_with = "experiment")]
    demo: bool,

    /// Override the experiment seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the default repeat count
    #[arg(long)]
    repeats: Option<usize>,

    /// Print the report as JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mut file = match &args.experiment {
        Some(path) => ExperimentFile::load(path)?,
        None => ExperimentFile::demo(args.seed.unwrap_or(42))?,
    };
    if let Some(seed) = args.seed {
        file.config.seed = seed;
    }
    if let Some(repeats) = args.repeats {
        file.config.repeats = repeats;
    }

    if file.models.is_empty() {
        return Err(eyre!("experiment defines no models"));
    }

    let report = file.run().wrap_err("experiment failed")?;

    let countries: Vec<Country> = file.countries.iter().map(|s| s.country.clone()).collect();
    let summary = Summary::new(report, &countries, &file.config);

    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{summary}");
    }

    tracing::info!("done");
    Ok(())
}
