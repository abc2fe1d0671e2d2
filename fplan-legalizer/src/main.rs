use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use fplan_common::{Floorplan, FloorplanSpec};
use fplan_legalizer::config::{IOConfig, LegalizerConfig};
use fplan_legalizer::legalizer::{DfsLegalizer, LegalizeResult, Legalizer, SelectionPolicy};

struct Config {
    io: IOConfig,
    legalizer: LegalizerConfig,
    policy: SelectionPolicy,
}

fn parse_args() -> Result<Config> {
    use clap::{App, Arg};
    let matches = App::new("Floorplan Legalizer")
        .version(env!("CARGO_PKG_VERSION"))
        .author(clap::crate_authors!())
        .about("Removes overlaps between floorplan blocks by migrating area along cheap paths")
        .arg(
            Arg::with_name("INPUT")
                .help("Input floorplan, as JSON")
                .index(1)
                .required(true),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Output file location")
                .index(2)
                .required(true),
        )
        .arg(
            Arg::with_name("CONFIG")
                .long("config")
                .takes_value(true)
                .help("Cost weights and driver settings, one `key = value` per line"),
        )
        .arg(
            Arg::with_name("MODE")
                .long("mode")
                .takes_value(true)
                .default_value("largest")
                .help("Overlap selection policy: largest, smallest, nearest, nearest-manhattan, farthest, random, or 0-5"),
        )
        .arg(
            Arg::with_name("OUTPUT_LEVEL")
                .long("output-level")
                .takes_value(true)
                .help("Log verbosity, 0 (errors only) to 4"),
        )
        .get_matches();

    let policy = matches
        .value_of("MODE")
        .ok_or_else(|| anyhow!("Missing MODE"))?
        .parse::<SelectionPolicy>()?;
    Ok(Config {
        io: IOConfig::from_args(&matches)?,
        legalizer: LegalizerConfig::from_args(&matches)?,
        policy,
    })
}

fn main() -> Result<()> {
    let config = parse_args()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.legalizer.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let fp = {
        let text = std::fs::read_to_string(&config.io.input_file)
            .with_context(|| anyhow!("Reading {}", config.io.input_file.display()))?;
        Floorplan::from_spec(&FloorplanSpec::from_json(&text)?)?
    };

    let mut legalizer = DfsLegalizer::new(fp, config.legalizer)?;
    let result = legalizer.legalize(config.policy)?;

    {
        let outf = std::fs::File::create(&config.io.output_file)
            .with_context(|| anyhow!("Creating {}", config.io.output_file.display()))?;
        serde_json::ser::to_writer(
            outf,
            &serde_json::json!({
                "result": result,
                "floorplan": legalizer.floorplan(),
            }),
        )?;
    }

    if result != LegalizeResult::Success {
        log::error!("Legalization failed: {}", result);
        std::process::exit(1);
    }
    Ok(())
}
