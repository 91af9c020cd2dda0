//! Quality and particle-event condition set construction.
//!
//! Quality sets classify the `ty` column; particle event sets classify the
//! `ch` column. Both are built once per run from the current selection and
//! stay immutable during traversal.
//!
//! The two variants construct quality sets differently: Hi unions the code
//! sets of each selected qualifier rule, while Lo starts from the universal
//! 15-code set and intersects it with each selected TOF group. Both
//! behaviors are reproduced as observed in flight software, not validated.

use crate::app::models::InstructionVariant;
use crate::constants::{
    ALL_CHANNELS_TOKEN, HI_QUALITY_RULES, HI_SPECIES_PREFIX, HYDROGEN_PREFIX, LO_TOF_GROUPS,
    LO_UNIVERSAL_CODES, OXYGEN_PREFIX,
};
use std::collections::BTreeSet;
use tracing::debug;

/// Ordered set of two-character `ty` codes a record may carry
pub type QualityConditionSet = BTreeSet<String>;

/// Ordered set of species+channel `ch` codes a record may carry
pub type ParticleEventSet = BTreeSet<String>;

/// Build the quality condition set for a variant from the selected
/// qualifier names.
///
/// Hi: each selected rule contributes its fixed code set; selections union.
/// Lo: the universal set is intersected with each selected TOF group's
/// subset; selecting no group leaves the universal set unintersected.
pub fn build_quality_set(
    variant: InstructionVariant,
    selected_qualifiers: &BTreeSet<String>,
) -> QualityConditionSet {
    let set = match variant {
        InstructionVariant::Hi => {
            let mut codes = BTreeSet::new();
            for (name, rule_codes) in HI_QUALITY_RULES {
                if selected_qualifiers.contains(*name) {
                    codes.extend(rule_codes.iter().map(|code| code.to_string()));
                }
            }
            codes
        }
        InstructionVariant::Lo => {
            let mut codes: BTreeSet<String> = LO_UNIVERSAL_CODES
                .iter()
                .map(|code| code.to_string())
                .collect();
            for (name, group_codes) in LO_TOF_GROUPS {
                if selected_qualifiers.contains(*name) {
                    let group: BTreeSet<String> =
                        group_codes.iter().map(|code| code.to_string()).collect();
                    codes = codes.intersection(&group).cloned().collect();
                }
            }
            codes
        }
    };

    debug!(
        "Built {} quality set with {} codes from {:?}",
        variant,
        set.len(),
        selected_qualifiers
    );
    set
}

/// Resolve a channel selection to concrete 1-based channel numbers.
///
/// Explicit channel tokens enumerate individually; the literal `All` token
/// resolves to the variant's full range only when no explicit tokens are
/// present.
pub fn resolve_channels(variant: InstructionVariant, tokens: &[String]) -> Vec<usize> {
    let explicit: Vec<usize> = tokens
        .iter()
        .filter_map(|token| token.parse::<usize>().ok())
        .collect();

    if !explicit.is_empty() {
        return explicit;
    }

    if tokens.iter().any(|token| token == ALL_CHANNELS_TOKEN) {
        return (1..=variant.channel_count()).collect();
    }

    Vec::new()
}

/// Build the particle event set from resolved channels and selected species.
///
/// Lo emits one code per selected species and channel (`Hydrogen` prefix 2,
/// `Oxygen` prefix 4); Hi ignores species and uses the fixed prefix 1.
pub fn build_particle_event_set(
    variant: InstructionVariant,
    channels: &[usize],
    selected_species: &BTreeSet<String>,
) -> ParticleEventSet {
    let mut codes = BTreeSet::new();
    match variant {
        InstructionVariant::Hi => {
            for channel in channels {
                codes.insert(format!("{}{}", HI_SPECIES_PREFIX, channel));
            }
        }
        InstructionVariant::Lo => {
            for species in selected_species {
                let prefix = match species.as_str() {
                    "Hydrogen" => HYDROGEN_PREFIX,
                    "Oxygen" => OXYGEN_PREFIX,
                    _ => continue,
                };
                for channel in channels {
                    codes.insert(format!("{}{}", prefix, channel));
                }
            }
        }
    }

    debug!(
        "Built {} particle event set with {} codes",
        variant,
        codes.len()
    );
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_hi_quality_single_rule() {
        let set = build_quality_set(InstructionVariant::Hi, &set_of(&["Q-ABC"]));
        assert_eq!(set, set_of(&["0A", "0E", "05"]));
    }

    #[test]
    fn test_hi_quality_none_rule() {
        let set = build_quality_set(InstructionVariant::Hi, &set_of(&["None"]));
        assert_eq!(set, set_of(&["0C", "0F", "07", "02", "06", "00", "0B", "01"]));
    }

    #[test]
    fn test_hi_quality_selections_union() {
        let set = build_quality_set(InstructionVariant::Hi, &set_of(&["Q-BC", "Q-AC"]));
        assert_eq!(set, set_of(&["03", "08"]));
    }

    #[test]
    fn test_lo_quality_no_selection_keeps_universal_set() {
        let set = build_quality_set(InstructionVariant::Lo, &BTreeSet::new());
        assert_eq!(set.len(), 15);
        assert!(set.contains("40"));
        assert!(set.contains("4E"));
    }

    #[test]
    fn test_lo_quality_tof_groups_intersect() {
        let set = build_quality_set(InstructionVariant::Lo, &set_of(&["TOF0", "TOF1"]));
        assert_eq!(set, set_of(&["43", "47", "4B"]));
        assert!(!set.is_empty());
    }

    #[test]
    fn test_lo_quality_single_tof_group() {
        let set = build_quality_set(InstructionVariant::Lo, &set_of(&["TOF3"]));
        assert_eq!(set, set_of(&["48", "49", "4A", "4B", "4C", "4D", "4E"]));
    }

    #[test]
    fn test_resolve_explicit_channels() {
        let channels = resolve_channels(
            InstructionVariant::Lo,
            &["1".to_string(), "3".to_string()],
        );
        assert_eq!(channels, vec![1, 3]);
    }

    #[test]
    fn test_resolve_all_token() {
        let channels = resolve_channels(InstructionVariant::Hi, &["All".to_string()]);
        assert_eq!(channels, vec![1, 2, 3, 4, 5, 6]);

        let channels = resolve_channels(InstructionVariant::Lo, &["All".to_string()]);
        assert_eq!(channels, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_explicit_channels_beat_all_token() {
        let channels = resolve_channels(
            InstructionVariant::Lo,
            &["All".to_string(), "2".to_string()],
        );
        assert_eq!(channels, vec![2]);
    }

    #[test]
    fn test_lo_particle_events_per_species() {
        let set = build_particle_event_set(
            InstructionVariant::Lo,
            &[1, 3],
            &set_of(&["Hydrogen"]),
        );
        assert_eq!(set, set_of(&["21", "23"]));

        let set = build_particle_event_set(
            InstructionVariant::Lo,
            &[1, 3],
            &set_of(&["Oxygen"]),
        );
        assert_eq!(set, set_of(&["41", "43"]));

        let set = build_particle_event_set(
            InstructionVariant::Lo,
            &[2],
            &set_of(&["Hydrogen", "Oxygen"]),
        );
        assert_eq!(set, set_of(&["22", "42"]));
    }

    #[test]
    fn test_hi_particle_events_ignore_species() {
        let set = build_particle_event_set(InstructionVariant::Hi, &[2], &BTreeSet::new());
        assert_eq!(set, set_of(&["12"]));

        let set = build_particle_event_set(
            InstructionVariant::Hi,
            &[2],
            &set_of(&["Hydrogen"]),
        );
        assert_eq!(set, set_of(&["12"]));
    }
}
