//! Core data structures for archive sorting.
//!
//! Defines the instrument variant, instruction rows, archive directory
//! entries, telemetry records and the tagged field value used by the
//! tensor path.

use crate::constants::{
    CH_FIELD_INDEX, HI_INSTRUCTION_FILENAME, LO_INSTRUCTION_FILENAME, RECORD_FIELD_COUNT,
    TY_FIELD_INDEX,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Instrument variant determining instruction row shape and code semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionVariant {
    Hi,
    Lo,
}

impl InstructionVariant {
    /// Number of ENA channels the variant observes
    pub fn channel_count(&self) -> usize {
        match self {
            InstructionVariant::Hi => 6,
            InstructionVariant::Lo => 8,
        }
    }

    /// Number of whitespace-delimited columns in an instruction row:
    /// path token, start, end, phase start, phase end, channel flags,
    /// plus a trailing digit for Hi
    pub fn instruction_column_count(&self) -> usize {
        match self {
            InstructionVariant::Hi => 5 + self.channel_count() + 1,
            InstructionVariant::Lo => 5 + self.channel_count(),
        }
    }

    /// Conventional instruction file name for the variant
    pub fn default_instruction_filename(&self) -> &'static str {
        match self {
            InstructionVariant::Hi => HI_INSTRUCTION_FILENAME,
            InstructionVariant::Lo => LO_INSTRUCTION_FILENAME,
        }
    }

    /// Detect the variant from an instruction file name
    pub fn from_instruction_filename(name: &str) -> Option<Self> {
        if name.ends_with(HI_INSTRUCTION_FILENAME) {
            Some(InstructionVariant::Hi)
        } else if name.ends_with(LO_INSTRUCTION_FILENAME) {
            Some(InstructionVariant::Lo)
        } else {
            None
        }
    }
}

impl std::fmt::Display for InstructionVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstructionVariant::Hi => write!(f, "Hi"),
            InstructionVariant::Lo => write!(f, "Lo"),
        }
    }
}

/// One parsed row of a good-times instruction table
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionRow {
    /// Substring matched against a telemetry file's path
    pub path_token: String,
    /// Inclusive start of the valid MET window
    pub start_time: f64,
    /// Inclusive end of the valid MET window
    pub end_time: f64,
    pub phase_start: i32,
    pub phase_end: i32,
    /// One flag per channel, file order preserved
    pub channel_flags: Vec<bool>,
    /// Hi-variant trailing digit used by the `hide` family check
    pub trailing_digit: Option<char>,
}

impl InstructionRow {
    /// Whether a MET timestamp lies in this row's window
    pub fn contains_met(&self, met: f64) -> bool {
        met >= self.start_time && met <= self.end_time
    }

    /// Whether the 1-based channel number is flagged observable
    pub fn channel_enabled(&self, channel: usize) -> bool {
        channel >= 1
            && self
                .channel_flags
                .get(channel - 1)
                .copied()
                .unwrap_or(false)
    }
}

/// Double-observation state of an archive directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleObservation {
    Yes,
    No,
    /// The directory never qualified, so the check was never run
    Unknown,
}

impl std::fmt::Display for DoubleObservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoubleObservation::Yes => write!(f, "Yes"),
            DoubleObservation::No => write!(f, "No"),
            DoubleObservation::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One directory visited during an archive scan
#[derive(Debug, Clone)]
pub struct ArchiveDirectory {
    pub path: PathBuf,
    /// Primary quaternion marker present and complementary marker absent
    pub has_primary_companion: bool,
    /// Computed once at qualification time, never revisited
    pub double_observation: DoubleObservation,
}

/// One telemetry record: the eagerly parsed MET plus the 11 raw column tokens
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub met: f64,
    pub fields: Vec<String>,
}

impl Record {
    /// Build a record from raw column tokens; MET must already be validated
    pub fn new(met: f64, fields: Vec<String>) -> Self {
        debug_assert_eq!(fields.len(), RECORD_FIELD_COUNT);
        Self { met, fields }
    }

    /// Particle event code column
    pub fn ch(&self) -> &str {
        &self.fields[CH_FIELD_INDEX]
    }

    /// Quality/coincidence code column
    pub fn ty(&self) -> &str {
        &self.fields[TY_FIELD_INDEX]
    }
}

/// A raw field token resolved once with the precedence float, then hex,
/// then raw
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Numeric(f64),
    Hex(u32),
    Raw(String),
}

impl FieldValue {
    /// Resolve a raw token: float attempt first, hex attempt second,
    /// raw otherwise
    pub fn resolve(token: &str) -> Self {
        if let Ok(value) = token.parse::<f64>() {
            return FieldValue::Numeric(value);
        }
        if let Ok(value) = u32::from_str_radix(token, 16) {
            return FieldValue::Hex(value);
        }
        FieldValue::Raw(token.to_string())
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(value) => Some(*value),
            FieldValue::Hex(value) => Some(*value as f64),
            FieldValue::Raw(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_shapes() {
        assert_eq!(InstructionVariant::Hi.channel_count(), 6);
        assert_eq!(InstructionVariant::Lo.channel_count(), 8);
        assert_eq!(InstructionVariant::Hi.instruction_column_count(), 12);
        assert_eq!(InstructionVariant::Lo.instruction_column_count(), 13);
    }

    #[test]
    fn test_variant_from_instruction_filename() {
        assert_eq!(
            InstructionVariant::from_instruction_filename("HiCullGoodTimes.txt"),
            Some(InstructionVariant::Hi)
        );
        assert_eq!(
            InstructionVariant::from_instruction_filename("manuals/LoGoodTimes.txt"),
            Some(InstructionVariant::Lo)
        );
        assert_eq!(
            InstructionVariant::from_instruction_filename("notes.txt"),
            None
        );
    }

    #[test]
    fn test_instruction_row_window() {
        let row = InstructionRow {
            path_token: "2009A".to_string(),
            start_time: 50.0,
            end_time: 150.0,
            phase_start: 0,
            phase_end: 10,
            channel_flags: vec![true, false, true, false, false, false],
            trailing_digit: Some('1'),
        };

        assert!(row.contains_met(50.0));
        assert!(row.contains_met(100.0));
        assert!(row.contains_met(150.0));
        assert!(!row.contains_met(150.1));

        assert!(row.channel_enabled(1));
        assert!(!row.channel_enabled(2));
        assert!(row.channel_enabled(3));
        assert!(!row.channel_enabled(0));
        assert!(!row.channel_enabled(7));
    }

    #[test]
    fn test_field_value_precedence() {
        // Float wins over hex where both parse
        assert_eq!(FieldValue::resolve("23"), FieldValue::Numeric(23.0));
        assert_eq!(FieldValue::resolve("-1.5"), FieldValue::Numeric(-1.5));
        // Hex-only tokens fall through to hex
        assert_eq!(FieldValue::resolve("0A"), FieldValue::Hex(10));
        assert_eq!(FieldValue::resolve("4E"), FieldValue::Hex(0x4E));
        // Everything else stays raw
        assert_eq!(
            FieldValue::resolve("bad-token"),
            FieldValue::Raw("bad-token".to_string())
        );

        assert_eq!(FieldValue::Numeric(2.5).as_f64(), Some(2.5));
        assert_eq!(FieldValue::Hex(16).as_f64(), Some(16.0));
        assert_eq!(FieldValue::Raw("x".to_string()).as_f64(), None);
    }

    #[test]
    fn test_record_accessors() {
        let fields: Vec<String> = vec![
            "100.5", "1.0", "2.0", "21", "0A", "3", "0", "5", "0.1", "0.2", "0.3",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        let record = Record::new(100.5, fields);
        assert_eq!(record.ch(), "21");
        assert_eq!(record.ty(), "0A");
    }
}
