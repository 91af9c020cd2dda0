//! Good-times instruction table loading.
//!
//! An instruction file is a whitespace-delimited text table with no header.
//! Row shape depends on the instrument variant: Hi rows carry a path token,
//! a MET window, a phase window, six channel flags and a trailing digit;
//! Lo rows carry eight channel flags and no trailing digit.
//!
//! A missing file is the pipeline's only fatal error: the load fails before
//! any traversal starts. Malformed rows also fail the load, since a silently
//! truncated table would change filtering semantics invisibly.

use crate::app::models::{InstructionRow, InstructionVariant};
use crate::{Error, Result};
use std::path::Path;
use tracing::debug;

/// An immutable, ordered good-times instruction table
#[derive(Debug, Clone)]
pub struct InstructionTable {
    variant: InstructionVariant,
    rows: Vec<InstructionRow>,
}

impl InstructionTable {
    /// Load and parse an instruction file for the declared variant
    pub fn load(path: &Path, variant: InstructionVariant) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::instruction_not_found(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Failed to read '{}'", path.display()), e))?;

        let mut rows = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = parse_row(line, variant)
                .map_err(|message| Error::instruction_format(
                    path.display().to_string(),
                    index + 1,
                    message,
                ))?;
            rows.push(row);
        }

        debug!(
            "Loaded {} instruction rows from {} ({} variant)",
            rows.len(),
            path.display(),
            variant
        );

        Ok(Self { variant, rows })
    }

    /// Build a table from already-parsed rows, for tests
    #[cfg(test)]
    pub fn from_rows(variant: InstructionVariant, rows: Vec<InstructionRow>) -> Self {
        Self { variant, rows }
    }

    pub fn variant(&self) -> InstructionVariant {
        self.variant
    }

    pub fn rows(&self) -> &[InstructionRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether any row's path token is a substring of the given path
    pub fn matches_path(&self, path: &str) -> bool {
        self.rows.iter().any(|row| path.contains(&row.path_token))
    }

    /// Rows whose path token is a substring of the given path,
    /// in table order
    pub fn rows_matching_path<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Iterator<Item = &'a InstructionRow> {
        self.rows.iter().filter(move |row| path.contains(&row.path_token))
    }
}

/// Parse one non-blank instruction row for the declared variant
fn parse_row(line: &str, variant: InstructionVariant) -> std::result::Result<InstructionRow, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let expected = variant.instruction_column_count();
    if tokens.len() != expected {
        return Err(format!(
            "expected {} columns for the {} variant, found {}",
            expected,
            variant,
            tokens.len()
        ));
    }

    let start_time: f64 = tokens[1]
        .parse()
        .map_err(|_| format!("invalid start time '{}'", tokens[1]))?;
    let end_time: f64 = tokens[2]
        .parse()
        .map_err(|_| format!("invalid end time '{}'", tokens[2]))?;
    let phase_start: i32 = tokens[3]
        .parse()
        .map_err(|_| format!("invalid phase start '{}'", tokens[3]))?;
    let phase_end: i32 = tokens[4]
        .parse()
        .map_err(|_| format!("invalid phase end '{}'", tokens[4]))?;

    let flag_count = variant.channel_count();
    let mut channel_flags = Vec::with_capacity(flag_count);
    for token in &tokens[5..5 + flag_count] {
        match *token {
            "0" => channel_flags.push(false),
            "1" => channel_flags.push(true),
            other => return Err(format!("invalid channel flag '{}'", other)),
        }
    }

    let trailing_digit = match variant {
        InstructionVariant::Hi => {
            let token = tokens[expected - 1];
            let mut chars = token.chars();
            match (chars.next(), chars.next()) {
                (Some(digit), None) if digit.is_ascii_digit() => Some(digit),
                _ => return Err(format!("invalid trailing digit '{}'", token)),
            }
        }
        InstructionVariant::Lo => None,
    };

    Ok(InstructionRow {
        path_token: tokens[0].to_string(),
        start_time,
        end_time,
        phase_start,
        phase_end,
        channel_flags,
        trailing_digit,
    })
}
