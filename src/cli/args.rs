//! Command-line argument definitions for the ENA archive sorter
//!
//! This module defines the complete CLI interface using the clap derive
//! API: the `sort`, `tensor` and `scan` subcommands plus the shared
//! selection and logging flags.

use crate::app::models::InstructionVariant;
use crate::config::{FileConfig, GroupingPolicy, HexPolicy, SelectionConfig};
use crate::constants::{
    FILE_FAMILIES, HI_QUALIFIER_NAMES, LO_QUALIFIER_NAMES, QUATERNION_EXTENSIONS, SPECIES_NAMES,
};
use crate::{Error, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// CLI arguments for the ENA archive sorter
///
/// Filters ENA instrument telemetry archives against good-times
/// instructions and sinks matching records into a SQLite table or
/// batched numeric tensor files.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ena-sorter",
    version,
    about = "Filter ENA telemetry archives into SQLite tables or numeric tensor files",
    long_about = "Scans an archive tree of instrument telemetry, qualifies directories by \
                  their quaternion companion files, filters records against time-windowed \
                  quality/channel instructions, and sinks matching records into a SQLite \
                  table or size-bounded Parquet tensor files."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the sorter
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Filter records into a SQLite table (main command)
    Sort(SortArgs),
    /// Accumulate filtered records into batched tensor files
    Tensor(TensorArgs),
    /// Report qualifying directories without sinking any records
    Scan(ScanArgs),
}

/// Instrument variant as a CLI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    Hi,
    Lo,
}

impl VariantArg {
    pub fn to_variant(self) -> InstructionVariant {
        match self {
            VariantArg::Hi => InstructionVariant::Hi,
            VariantArg::Lo => InstructionVariant::Lo,
        }
    }
}

/// Logging verbosity flags shared by every subcommand
#[derive(Debug, Clone, Parser)]
pub struct LoggingArgs {
    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl LoggingArgs {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

/// Selection flags shared by the sort and tensor subcommands
#[derive(Debug, Clone, Parser)]
pub struct SelectionArgs {
    /// Path to configuration file
    ///
    /// TOML file with selection defaults. If not specified, looks for
    /// the platform config directory's ena-sorter/config.toml.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Instrument variant driving the instruction layout and code tables
    #[arg(long = "variant", value_enum, help = "Instrument variant (hi or lo)")]
    pub variant: Option<VariantArg>,

    /// Path to the good-times instruction file
    ///
    /// Defaults to the variant's conventional file name in the working
    /// directory (HiCullGoodTimes.txt or LoGoodTimes.txt).
    #[arg(
        long = "instruction",
        value_name = "FILE",
        help = "Path to the good-times instruction file"
    )]
    pub instruction_file: Option<PathBuf>,

    /// Primary quaternion marker extension (.attdba or .attd2a)
    #[arg(
        long = "quaternion",
        value_name = "EXT",
        help = "Primary quaternion marker extension"
    )]
    pub quaternion_ext: Option<String>,

    /// Quality qualifiers to select (comma-separated list)
    ///
    /// Hi variant: Q-ABC, Q-AB, Q-BC, Q-AC, None (selections union).
    /// Lo variant: TOF0..TOF3 (selections intersect the universal set).
    #[arg(
        long = "qualifiers",
        value_name = "LIST",
        help = "Comma-separated quality qualifiers"
    )]
    pub qualifiers: Option<QualifierList>,

    /// Channels to select (comma-separated numbers, or All)
    #[arg(
        long = "channels",
        value_name = "LIST",
        help = "Comma-separated channel numbers, or All"
    )]
    pub channels: Option<ChannelList>,

    /// Particle species to select (comma-separated, Lo variant only)
    #[arg(
        long = "species",
        value_name = "LIST",
        help = "Comma-separated species (Hydrogen, Oxygen)"
    )]
    pub species: Option<SpeciesList>,

    /// File family tokens to admit (comma-separated)
    #[arg(
        long = "file-types",
        value_name = "LIST",
        help = "Comma-separated file types (hide, lode, hihb, lohb)"
    )]
    pub file_types: Option<FileTypeList>,

    /// Filter by time window only, skipping the ty/ch code checks
    #[arg(
        long = "time-window-only",
        help = "Disable the quality/event code membership checks"
    )]
    pub time_window_only: bool,
}

impl SelectionArgs {
    /// Resolve the layered selection: defaults, then the config file,
    /// then these CLI flags
    pub fn resolve(&self) -> Result<SelectionConfig> {
        let file = FileConfig::load(self.config_file.as_deref())?;
        let mut config = SelectionConfig::default();
        file.apply_to(&mut config);

        if let Some(variant) = self.variant {
            let variant = variant.to_variant();
            config.variant = variant;
            config.instruction_file = PathBuf::from(variant.default_instruction_filename());
            config.file_tokens = SelectionConfig::default_file_tokens(variant);
        }
        if let Some(instruction_file) = &self.instruction_file {
            config.instruction_file = instruction_file.clone();
            // A conventional instruction file name implies the variant
            // when none was given explicitly
            if self.variant.is_none() {
                if let Some(variant) = InstructionVariant::from_instruction_filename(
                    &instruction_file.to_string_lossy(),
                ) {
                    if variant != config.variant {
                        config.variant = variant;
                        config.file_tokens = SelectionConfig::default_file_tokens(variant);
                    }
                }
            }
        }
        if let Some(quaternion_ext) = &self.quaternion_ext {
            config.quaternion_ext = quaternion_ext.clone();
        }
        if let Some(qualifiers) = &self.qualifiers {
            config.qualifiers = qualifiers.names.iter().cloned().collect();
        }
        if let Some(channels) = &self.channels {
            config.channels = channels.tokens.clone();
        }
        if let Some(species) = &self.species {
            config.species = species.names.iter().cloned().collect();
        }
        if let Some(file_types) = &self.file_types {
            config.file_tokens = file_types.tokens.clone();
        }
        config.event_filtering = !self.time_window_only;

        config.validate()?;
        Ok(config)
    }
}

/// Arguments for the sort command (table-sink run)
#[derive(Debug, Clone, Parser)]
pub struct SortArgs {
    /// Input path to the archive root
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATH",
        default_value = ".",
        help = "Input path to the archive root"
    )]
    pub input_path: PathBuf,

    /// Output SQLite database file
    #[arg(
        short = 'o',
        long = "database",
        value_name = "FILE",
        help = "Output SQLite database file"
    )]
    pub database: PathBuf,

    /// Text file listing the qualifying directory paths after the run
    #[arg(
        long = "paths-report",
        value_name = "FILE",
        help = "Write the qualifying directory paths to a text file"
    )]
    pub paths_report: Option<PathBuf>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl SortArgs {
    /// Validate the sort command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        validate_input_path(&self.input_path)?;
        if let Some(parent) = self.database.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(Error::configuration(format!(
                    "Database directory does not exist: {}",
                    parent.display()
                )));
            }
        }
        validate_config_file(&self.selection)?;
        Ok(())
    }
}

/// Arguments for the tensor command (tensor-sink run)
#[derive(Debug, Clone, Parser)]
pub struct TensorArgs {
    /// Input path to the archive root
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATH",
        default_value = ".",
        help = "Input path to the archive root"
    )]
    pub input_path: PathBuf,

    /// Output directory for tensor files
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        default_value = "./tensors",
        help = "Output directory for tensor files"
    )]
    pub output_dir: PathBuf,

    /// Prefix of tensor output file names
    #[arg(
        long = "prefix",
        value_name = "NAME",
        default_value = "ena",
        help = "Prefix of tensor output file names"
    )]
    pub prefix: String,

    /// Time-grouping policy for tensor outputs
    #[arg(
        long = "grouping",
        value_enum,
        default_value = "half-year",
        help = "Grouping policy: half-year, year, or all"
    )]
    pub grouping: GroupingPolicy,

    /// Hex flag handling for the ch/ty columns
    #[arg(
        long = "hex",
        value_enum,
        default_value = "decode",
        help = "Hex flags: translate to int (decode) or replace with 0 (zero)"
    )]
    pub hex_policy: HexPolicy,

    /// Batch accumulation limit in MiB before a flush
    #[arg(
        short = 'm',
        long = "batch-limit",
        value_name = "MIB",
        default_value_t = 2048,
        help = "Batch accumulation limit in MiB"
    )]
    pub batch_limit_mib: u64,

    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl TensorArgs {
    /// Validate the tensor command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        validate_input_path(&self.input_path)?;
        if self.prefix.is_empty() {
            return Err(Error::configuration(
                "Tensor file prefix cannot be empty".to_string(),
            ));
        }
        if self.batch_limit_mib == 0 {
            return Err(Error::configuration(
                "Batch limit must be greater than 0 MiB".to_string(),
            ));
        }
        validate_config_file(&self.selection)?;
        Ok(())
    }

    /// Batch limit in bytes
    pub fn batch_limit_bytes(&self) -> u64 {
        self.batch_limit_mib * 1024 * 1024
    }
}

/// Arguments for the scan command (qualification-only run)
#[derive(Debug, Clone, Parser)]
pub struct ScanArgs {
    /// Input path to the archive root
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATH",
        default_value = ".",
        help = "Input path to the archive root"
    )]
    pub input_path: PathBuf,

    /// Primary quaternion marker extension (.attdba or .attd2a)
    #[arg(
        long = "quaternion",
        value_name = "EXT",
        default_value = ".attdba",
        help = "Primary quaternion marker extension"
    )]
    pub quaternion_ext: String,

    /// Text file listing the qualifying directory paths
    #[arg(
        long = "paths-report",
        value_name = "FILE",
        help = "Write the qualifying directory paths to a text file"
    )]
    pub paths_report: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl ScanArgs {
    /// Validate the scan command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        validate_input_path(&self.input_path)?;
        if !QUATERNION_EXTENSIONS.contains(&self.quaternion_ext.as_str()) {
            return Err(Error::configuration(format!(
                "Unknown quaternion extension '{}'. Available: {}",
                self.quaternion_ext,
                QUATERNION_EXTENSIONS.join(", ")
            )));
        }
        Ok(())
    }
}

fn validate_input_path(path: &PathBuf) -> Result<()> {
    if !path.exists() {
        return Err(Error::configuration(format!(
            "Input path does not exist: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(Error::configuration(format!(
            "Input path is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

fn validate_config_file(selection: &SelectionArgs) -> Result<()> {
    if let Some(config_file) = &selection.config_file {
        if !config_file.exists() {
            return Err(Error::configuration(format!(
                "Config file does not exist: {}",
                config_file.display()
            )));
        }
    }
    Ok(())
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Wrapper for parsing comma-separated qualifier lists
#[derive(Debug, Clone)]
pub struct QualifierList {
    pub names: Vec<String>,
}

impl FromStr for QualifierList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let names = split_list(s);
        if names.is_empty() {
            return Err(Error::configuration(
                "Qualifier list cannot be empty".to_string(),
            ));
        }
        for name in &names {
            if !HI_QUALIFIER_NAMES.contains(&name.as_str())
                && !LO_QUALIFIER_NAMES.contains(&name.as_str())
            {
                return Err(Error::configuration(format!(
                    "Unknown qualifier '{}'. Available: {}, {}",
                    name,
                    HI_QUALIFIER_NAMES.join(", "),
                    LO_QUALIFIER_NAMES.join(", ")
                )));
            }
        }
        Ok(QualifierList { names })
    }
}

/// Wrapper for parsing comma-separated channel lists
#[derive(Debug, Clone)]
pub struct ChannelList {
    pub tokens: Vec<String>,
}

impl FromStr for ChannelList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens = split_list(s);
        if tokens.is_empty() {
            return Err(Error::configuration(
                "Channel list cannot be empty".to_string(),
            ));
        }
        for token in &tokens {
            if token == "All" {
                continue;
            }
            let channel: usize = token.parse().map_err(|_| {
                Error::configuration(format!("Invalid channel token '{}'", token))
            })?;
            if !(1..=8).contains(&channel) {
                return Err(Error::configuration(format!(
                    "Channel {} out of range 1..=8",
                    channel
                )));
            }
        }
        Ok(ChannelList { tokens })
    }
}

/// Wrapper for parsing comma-separated species lists
#[derive(Debug, Clone)]
pub struct SpeciesList {
    pub names: Vec<String>,
}

impl FromStr for SpeciesList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let names = split_list(s);
        if names.is_empty() {
            return Err(Error::configuration(
                "Species list cannot be empty".to_string(),
            ));
        }
        for name in &names {
            if !SPECIES_NAMES.contains(&name.as_str()) {
                return Err(Error::configuration(format!(
                    "Unknown species '{}'. Available: {}",
                    name,
                    SPECIES_NAMES.join(", ")
                )));
            }
        }
        Ok(SpeciesList { names })
    }
}

/// Wrapper for parsing comma-separated file type lists
#[derive(Debug, Clone)]
pub struct FileTypeList {
    pub tokens: Vec<String>,
}

impl FromStr for FileTypeList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens = split_list(s);
        if tokens.is_empty() {
            return Err(Error::configuration(
                "File type list cannot be empty".to_string(),
            ));
        }
        for token in &tokens {
            if !FILE_FAMILIES.contains(&token.as_str()) {
                return Err(Error::configuration(format!(
                    "Unknown file type '{}'. Available: {}",
                    token,
                    FILE_FAMILIES.join(", ")
                )));
            }
        }
        Ok(FileTypeList { tokens })
    }
}
