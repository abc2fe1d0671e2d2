//! Configuration of the legalizer: cost model weights, search limits, and driver knobs.
//!
//! Values come from [LegalizerConfig::default], optionally overridden by a flat `key = value`
//! file and then by command line arguments.

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

/// Configuration variables related to input/output operations
#[derive(Clone, Debug)]
pub struct IOConfig {
    /// Input floorplan, in the JSON interchange format
    pub input_file: PathBuf,
    /// Where to write the legalized floorplan
    pub output_file: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LegalizerConfig {
    /// Partial paths at or above this cost are not extended, and sinks at or above it are not
    /// accepted.
    pub max_cost_cutoff: f64,

    /// Overlap to block: weight of overlap area over the block area left without it
    pub ob_area_weight: f64,
    /// Overlap to block: weight of how far the block's utilization is from 1 without the overlap
    pub ob_util_weight: f64,
    /// Overlap to block: weight of the 4th power of the block's aspect ratio deviation
    pub ob_asp_weight: f64,
    /// Overlap to block: multiplier on the utilization gain when dropping the overlap improves it
    pub ob_util_pos_rein: f64,

    /// Block to blank: weight of how far utilization is from 1 after growing
    pub bw_util_weight: f64,
    /// Block to blank: multiplier on the utilization gain when growing improves it
    pub bw_util_pos_rein: f64,
    /// Block to blank: weight of the 4th power of the aspect ratio deviation after growing
    pub bw_asp_weight: f64,

    /// Block to block: weight of donor area over victim area
    pub bb_area_weight: f64,
    pub bb_from_util_weight: f64,
    pub bb_from_util_pos_rein: f64,
    /// Applied to the square of the victim's utilization deviation
    pub bb_to_util_weight: f64,
    pub bb_to_util_pos_rein: f64,
    /// Applied linearly to the donor's aspect ratio deviation
    pub bb_asp_weight: f64,
    /// Added once to every block to block edge
    pub bb_flat_cost: f64,
    /// Added when taking the rectangle would split the victim in two
    pub fragment_penalty: f64,

    /// Lay migrated area out as full-length rows plus a remainder strip instead of one compact
    /// rectangle where one fits. Either way exactly the resolvable area moves
    pub exact_area_migration: bool,
    /// 0 errors, 1 warnings, 2 info, 3 debug, 4 trace
    pub output_level: u8,
    /// Driver iterations between full graph rebuilds
    pub rebuild_interval: usize,
    /// Driver iterations between statistics reports
    pub stats_interval: usize,
    /// Seed for the random overlap selection policy
    pub random_seed: u64,
}

impl Default for LegalizerConfig {
    fn default() -> Self {
        Self {
            max_cost_cutoff: 5000.0,
            ob_area_weight: 750.0,
            ob_util_weight: 1000.0,
            ob_asp_weight: 100.0,
            ob_util_pos_rein: -500.0,
            bw_util_weight: 1500.0,
            bw_util_pos_rein: -500.0,
            bw_asp_weight: 90.0,
            bb_area_weight: 150.0,
            bb_from_util_weight: 900.0,
            bb_from_util_pos_rein: -500.0,
            bb_to_util_weight: 1750.0,
            bb_to_util_pos_rein: -100.0,
            bb_asp_weight: 30.0,
            bb_flat_cost: 150.0,
            fragment_penalty: 100000.0,
            exact_area_migration: false,
            output_level: 2,
            rebuild_interval: 30,
            stats_interval: 10,
            random_seed: 69,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        _ => bail!("Expected a boolean, got {:?}", value),
    }
}

impl LegalizerConfig {
    /// Override a single knob by name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let float = || -> Result<f64> {
            value
                .parse()
                .with_context(|| anyhow!("Parsing {} = {:?}", key, value))
        };
        match key {
            "max_cost_cutoff" => self.max_cost_cutoff = float()?,
            "ob_area_weight" => self.ob_area_weight = float()?,
            "ob_util_weight" => self.ob_util_weight = float()?,
            "ob_asp_weight" => self.ob_asp_weight = float()?,
            "ob_util_pos_rein" => self.ob_util_pos_rein = float()?,
            "bw_util_weight" => self.bw_util_weight = float()?,
            "bw_util_pos_rein" => self.bw_util_pos_rein = float()?,
            "bw_asp_weight" => self.bw_asp_weight = float()?,
            "bb_area_weight" => self.bb_area_weight = float()?,
            "bb_from_util_weight" => self.bb_from_util_weight = float()?,
            "bb_from_util_pos_rein" => self.bb_from_util_pos_rein = float()?,
            "bb_to_util_weight" => self.bb_to_util_weight = float()?,
            "bb_to_util_pos_rein" => self.bb_to_util_pos_rein = float()?,
            "bb_asp_weight" => self.bb_asp_weight = float()?,
            "bb_flat_cost" => self.bb_flat_cost = float()?,
            "fragment_penalty" => self.fragment_penalty = float()?,
            "exact_area_migration" => {
                self.exact_area_migration =
                    parse_bool(value).with_context(|| anyhow!("Parsing {}", key))?
            }
            "output_level" => {
                self.output_level = value
                    .parse()
                    .with_context(|| anyhow!("Parsing {} = {:?}", key, value))?
            }
            "rebuild_interval" => {
                self.rebuild_interval = value
                    .parse()
                    .with_context(|| anyhow!("Parsing {} = {:?}", key, value))?
            }
            "stats_interval" => {
                self.stats_interval = value
                    .parse()
                    .with_context(|| anyhow!("Parsing {} = {:?}", key, value))?
            }
            "random_seed" => {
                self.random_seed = value
                    .parse()
                    .with_context(|| anyhow!("Parsing {} = {:?}", key, value))?
            }
            _ => bail!("Unknown configuration key {:?}", key),
        }
        Ok(())
    }

    /// Apply every `key = value` line of `text` on top of `self`. Blank lines and `#` comments
    /// are skipped.
    pub fn merge_str(&mut self, text: &str) -> Result<()> {
        for (lineno, line) in text.lines().enumerate() {
            let line = match line.find('#') {
                Some(i) => &line[..i],
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("Line {}: expected `key = value`, got {:?}", lineno + 1, line))?;
            self.set(key.trim(), value)
                .with_context(|| anyhow!("Line {}", lineno + 1))?;
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| anyhow!("Reading config file {}", path.display()))?;
        let mut config = Self::default();
        config
            .merge_str(&text)
            .with_context(|| anyhow!("In config file {}", path.display()))?;
        Ok(config)
    }

    /// Construct the configuration from the clap argument matches: defaults, then the optional
    /// `--config` file, then `--output-level`.
    pub fn from_args(matches: &clap::ArgMatches) -> Result<Self> {
        let mut config = match matches.value_of_os("CONFIG") {
            Some(path) => Self::from_file(Path::new(path))?,
            None => Self::default(),
        };
        if let Some(level) = matches.value_of("OUTPUT_LEVEL") {
            config.set("output_level", level)?;
        }
        Ok(config)
    }

    /// Default `tracing_subscriber` filter directive for [LegalizerConfig::output_level].
    pub fn log_filter(&self) -> &'static str {
        match self.output_level {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
    }
}

impl IOConfig {
    pub fn from_args(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(IOConfig {
            input_file: PathBuf::from(
                matches
                    .value_of_os("INPUT")
                    .ok_or_else(|| anyhow!("Missing INPUT"))?,
            ),
            output_file: PathBuf::from(
                matches
                    .value_of_os("OUTPUT")
                    .ok_or_else(|| anyhow!("Missing OUTPUT"))?,
            ),
        })
    }
}
