//! Configuration management and validation.
//!
//! Provides the selection configuration driving a sorting run, the tensor
//! sink policies, and the optional TOML config file layered underneath the
//! CLI arguments.

use crate::app::models::InstructionVariant;
use crate::constants::{
    FILE_FAMILIES, HI_QUALIFIER_NAMES, LO_QUALIFIER_NAMES, QUATERNION_EXTENSIONS, SPECIES_NAMES,
};
use crate::{Error, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hex column handling for the tensor sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HexPolicy {
    /// Translate `ch`/`ty` from hex to integer
    Decode,
    /// Replace `ch`/`ty` with zero
    Zero,
}

/// Time-grouping policy determining tensor output granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingPolicy {
    /// One output per top-level archive directory
    HalfYear,
    /// Top-level directories sharing a year prefix merge into one output
    Year,
    /// A single output spanning the whole tree
    All,
}

/// Selection configuration for one sorting run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Instrument variant the instruction file and code tables follow
    pub variant: InstructionVariant,

    /// Path to the good-times instruction file
    pub instruction_file: PathBuf,

    /// Primary quaternion marker extension; the complementary extension
    /// disqualifies a directory
    pub quaternion_ext: String,

    /// Selected quality qualifiers (Hi rules or Lo TOF groups)
    pub qualifiers: BTreeSet<String>,

    /// Channel selection tokens: explicit numbers or the `All` token
    pub channels: Vec<String>,

    /// Selected particle species (Lo variant only)
    pub species: BTreeSet<String>,

    /// File family tokens an eligible file name must contain
    pub file_tokens: Vec<String>,

    /// Whether the `ty`/`ch` membership checks apply on top of the
    /// time window
    pub event_filtering: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let variant = InstructionVariant::Hi;
        Self {
            variant,
            instruction_file: PathBuf::from(variant.default_instruction_filename()),
            quaternion_ext: QUATERNION_EXTENSIONS[0].to_string(),
            qualifiers: BTreeSet::new(),
            channels: vec!["All".to_string()],
            species: BTreeSet::new(),
            file_tokens: Self::default_file_tokens(variant),
            event_filtering: true,
        }
    }
}

impl SelectionConfig {
    /// Variant-appropriate default family tokens
    pub fn default_file_tokens(variant: InstructionVariant) -> Vec<String> {
        match variant {
            InstructionVariant::Hi => vec!["hide".to_string(), "hihb".to_string()],
            InstructionVariant::Lo => vec!["lode".to_string(), "lohb".to_string()],
        }
    }

    /// The quaternion extension whose presence disqualifies a directory
    pub fn complement_ext(&self) -> &'static str {
        crate::constants::complement_extension(&self.quaternion_ext)
    }

    /// Validate the selection for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !QUATERNION_EXTENSIONS.contains(&self.quaternion_ext.as_str()) {
            return Err(Error::configuration(format!(
                "Unknown quaternion extension '{}'. Available: {}",
                self.quaternion_ext,
                QUATERNION_EXTENSIONS.join(", ")
            )));
        }

        let valid_qualifiers: &[&str] = match self.variant {
            InstructionVariant::Hi => HI_QUALIFIER_NAMES,
            InstructionVariant::Lo => LO_QUALIFIER_NAMES,
        };
        for qualifier in &self.qualifiers {
            if !valid_qualifiers.contains(&qualifier.as_str()) {
                return Err(Error::configuration(format!(
                    "Unknown qualifier '{}' for the {} variant. Available: {}",
                    qualifier,
                    self.variant,
                    valid_qualifiers.join(", ")
                )));
            }
        }

        for species in &self.species {
            if !SPECIES_NAMES.contains(&species.as_str()) {
                return Err(Error::configuration(format!(
                    "Unknown species '{}'. Available: {}",
                    species,
                    SPECIES_NAMES.join(", ")
                )));
            }
        }

        for token in &self.channels {
            if token == crate::constants::ALL_CHANNELS_TOKEN {
                continue;
            }
            let channel: usize = token.parse().map_err(|_| {
                Error::configuration(format!("Invalid channel token '{}'", token))
            })?;
            if channel < 1 || channel > self.variant.channel_count() {
                return Err(Error::configuration(format!(
                    "Channel {} out of range 1..={} for the {} variant",
                    channel,
                    self.variant.channel_count(),
                    self.variant
                )));
            }
        }

        for token in &self.file_tokens {
            if !FILE_FAMILIES.contains(&token.as_str()) {
                return Err(Error::configuration(format!(
                    "Unknown file type '{}'. Available: {}",
                    token,
                    FILE_FAMILIES.join(", ")
                )));
            }
        }
        if self.file_tokens.is_empty() {
            return Err(Error::configuration(
                "At least one file type must be selected".to_string(),
            ));
        }

        Ok(())
    }
}

/// Optional TOML config file with selection defaults, layered under the
/// CLI arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub variant: Option<InstructionVariant>,
    pub instruction_file: Option<PathBuf>,
    pub quaternion_ext: Option<String>,
    pub qualifiers: Option<Vec<String>>,
    pub channels: Option<Vec<String>>,
    pub species: Option<Vec<String>>,
    pub file_tokens: Option<Vec<String>>,
}

impl FileConfig {
    /// Platform default config file location
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ena-sorter").join("config.toml"))
    }

    /// Load from an explicit path, or from the platform default when it
    /// exists; absent files yield the empty layering
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_path().filter(|path| path.exists()),
        };

        let Some(path) = path else {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::io(format!("Failed to read config '{}'", path.display()), e))?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            Error::configuration(format!("Invalid config file '{}': {}", path.display(), e))
        })?;

        debug!("Loaded config file: {}", path.display());
        Ok(config)
    }

    /// Layer this file's values onto a selection config; CLI overrides are
    /// applied on top by the caller
    pub fn apply_to(&self, config: &mut SelectionConfig) {
        if let Some(variant) = self.variant {
            config.variant = variant;
            config.instruction_file = PathBuf::from(variant.default_instruction_filename());
            config.file_tokens = SelectionConfig::default_file_tokens(variant);
        }
        if let Some(instruction_file) = &self.instruction_file {
            config.instruction_file = instruction_file.clone();
        }
        if let Some(quaternion_ext) = &self.quaternion_ext {
            config.quaternion_ext = quaternion_ext.clone();
        }
        if let Some(qualifiers) = &self.qualifiers {
            config.qualifiers = qualifiers.iter().cloned().collect();
        }
        if let Some(channels) = &self.channels {
            config.channels = channels.clone();
        }
        if let Some(species) = &self.species {
            config.species = species.iter().cloned().collect();
        }
        if let Some(file_tokens) = &self.file_tokens {
            config.file_tokens = file_tokens.clone();
        }
    }
}
