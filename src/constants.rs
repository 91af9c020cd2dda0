//! Application constants for the ENA archive sorter
//!
//! This module contains the fixed vocabulary of the archive layout,
//! the quality/event code tables, and the sink configuration defaults
//! used throughout the sorter.

// =============================================================================
// Quaternion Marker Files and Data File Patterns
// =============================================================================

/// The two mutually exclusive quaternion marker extensions.
/// A directory qualifies when it contains the selected primary extension
/// and none of the complementary one.
pub const QUATERNION_EXTENSIONS: &[&str] = &[".attdba", ".attd2a"];

/// Extension of telemetry data files
pub const DATA_FILE_EXT: &str = ".txt";

/// File family tokens found in telemetry file names.
/// `hide`/`lode` are direct-event files, `hihb`/`lohb` histogram files.
pub const FILE_FAMILIES: &[&str] = &["hide", "lode", "hihb", "lohb"];

/// Direct-event family names subject to the channel-observation check
pub const DIRECT_EVENT_FAMILIES: &[&str] = &["hide", "lode"];

/// Auxiliary sidecar suffixes sharing the data extension that never carry
/// telemetry records (header and good-times sidecars)
pub const EXCLUDED_DATA_SUFFIXES: &[&str] = &["-hdr.txt", "-times.txt"];

/// Sentinel the `hide` family requires in an instruction row's trailing digit
pub const HIDE_TRAILING_SENTINEL: char = '1';

// =============================================================================
// Double Observation Detection
// =============================================================================

/// Filename suffixes of the companion histogram pair checked for a
/// double observation
pub const DOUBLE_OBS_BASE_SUFFIX: &str = "hihb-2.txt";
pub const DOUBLE_OBS_PAIR_SUFFIX: &str = "hihb-3.txt";

/// Size ratio at or above which the companion pair counts as a
/// double observation
pub const DOUBLE_OBS_SIZE_RATIO: f64 = 1.8;

// =============================================================================
// Instruction Tables
// =============================================================================

/// Default instruction file names per instrument variant
pub const HI_INSTRUCTION_FILENAME: &str = "HiCullGoodTimes.txt";
pub const LO_INSTRUCTION_FILENAME: &str = "LoGoodTimes.txt";

/// Hi-variant quality rules: selected qualifiers union their code sets
pub const HI_QUALITY_RULES: &[(&str, &[&str])] = &[
    ("Q-ABC", &["0A", "0E", "05"]),
    ("Q-AB", &["09", "0D", "04"]),
    ("Q-BC", &["03"]),
    ("Q-AC", &["08"]),
    (
        "None",
        &["0C", "0F", "07", "02", "06", "00", "0B", "01"],
    ),
];

/// Lo-variant universal quality code set; selected TOF groups intersect it
pub const LO_UNIVERSAL_CODES: &[&str] = &[
    "40", "41", "42", "43", "44", "45", "46", "47", "48", "49", "4A", "4B", "4C", "4D", "4E",
];

/// Lo-variant TOF group subsets: the universal codes whose low nibble has
/// the group's coincidence bit set
pub const LO_TOF_GROUPS: &[(&str, &[&str])] = &[
    ("TOF0", &["41", "43", "45", "47", "49", "4B", "4D"]),
    ("TOF1", &["42", "43", "46", "47", "4A", "4B", "4E"]),
    ("TOF2", &["44", "45", "46", "47", "4C", "4D", "4E"]),
    ("TOF3", &["48", "49", "4A", "4B", "4C", "4D", "4E"]),
];

/// Valid qualifier names per variant
pub const HI_QUALIFIER_NAMES: &[&str] = &["Q-ABC", "Q-AB", "Q-BC", "Q-AC", "None"];
pub const LO_QUALIFIER_NAMES: &[&str] = &["TOF0", "TOF1", "TOF2", "TOF3"];

// =============================================================================
// Particle Event Codes
// =============================================================================

/// Species digit prefixes for Lo-variant event codes
pub const HYDROGEN_PREFIX: char = '2';
pub const OXYGEN_PREFIX: char = '4';

/// Fixed species digit for Hi-variant event codes
pub const HI_SPECIES_PREFIX: char = '1';

/// Valid species names for the Lo variant
pub const SPECIES_NAMES: &[&str] = &["Hydrogen", "Oxygen"];

/// Channel selection token resolving to the full variant range
pub const ALL_CHANNELS_TOKEN: &str = "All";

// =============================================================================
// Record Layout
// =============================================================================

/// Number of whitespace-delimited fields in a telemetry record
pub const RECORD_FIELD_COUNT: usize = 11;

/// Column names of the fixed record layout, in file order
pub const RECORD_COLUMNS: &[&str] = &[
    "met", "ra", "decl", "ch", "ty", "count", "selnbits", "phase", "loc_x", "loc_y", "loc_z",
];

/// Field indexes with special sink handling
pub const CH_FIELD_INDEX: usize = 3;
pub const TY_FIELD_INDEX: usize = 4;
pub const SELNBITS_FIELD_INDEX: usize = 6;

// =============================================================================
// Sink Configuration
// =============================================================================

/// Name of the relational sink table
pub const TABLE_SINK_TABLE_NAME: &str = "data";

/// Batch accumulator flush threshold (2 GiB of packed f64 rows)
pub const BATCH_SIZE_LIMIT_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Per-run timing report written alongside tensor outputs
pub const TIMING_LOG_FILENAME: &str = "loading_log.txt";

// =============================================================================
// Helper Functions
// =============================================================================

/// Output file name for a per-half-year tensor
pub fn half_year_tensor_filename(prefix: &str, label: &str) -> String {
    format!("{}_half_year_{}.parquet", prefix, label)
}

/// Output file name for a per-year tensor
pub fn year_tensor_filename(prefix: &str, label: &str) -> String {
    format!("{}_year_{}.parquet", prefix, label)
}

/// Output file name for the single all-data tensor
pub fn all_data_tensor_filename(prefix: &str) -> String {
    format!("{}_all_data.parquet", prefix)
}

/// Complementary quaternion extension for a chosen primary
pub fn complement_extension(primary: &str) -> &'static str {
    if primary == QUATERNION_EXTENSIONS[0] {
        QUATERNION_EXTENSIONS[1]
    } else {
        QUATERNION_EXTENSIONS[0]
    }
}

/// File family token contained in a telemetry file name, if any
pub fn file_family(file_name: &str) -> Option<&'static str> {
    FILE_FAMILIES
        .iter()
        .find(|family| file_name.contains(*family))
        .copied()
}

/// Whether a file family is a direct-event family
pub fn is_direct_event_family(family: &str) -> bool {
    DIRECT_EVENT_FAMILIES.contains(&family)
}
