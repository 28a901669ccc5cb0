//! Finding the zone to follow.
//!
//! Operators usually know a zone by name ("Front of house"), the backend by
//! UUID. `find_zone` accepts either and falls back to a single partial name
//! match, listing the known zones when nothing fits.

use std::fmt::Write;

use sync2gear_playback::{PlaybackError, Zone, ZoneId, ZoneSelector};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    /// No zone matched the target
    #[error("Zone '{target}' not found. Available zones:\n{available}")]
    NotFound { target: String, available: String },

    /// The account has no zones
    #[error("No zones are configured for this account")]
    NoZones,

    #[error(transparent)]
    Selection(#[from] PlaybackError),
}

/// Select the zone named or identified by `target`
///
/// Matching order: zone id, exact name (case-insensitive), then a partial
/// name match if exactly one zone has one.
pub fn find_zone<'a>(selector: &'a mut ZoneSelector, target: &str) -> Result<&'a Zone, LookupError> {
    if selector.zones().is_empty() {
        return Err(LookupError::NoZones);
    }

    let id = resolve(selector.zones(), target)?;
    Ok(selector.select(id.as_str())?)
}

/// Select the first listed zone
pub fn first_zone(selector: &mut ZoneSelector) -> Result<&Zone, LookupError> {
    let id = selector
        .zones()
        .first()
        .map(|zone| zone.id.clone())
        .ok_or(LookupError::NoZones)?;
    tracing::info!("Using first available zone {}", id);
    Ok(selector.select(id.as_str())?)
}

fn resolve(zones: &[Zone], target: &str) -> Result<ZoneId, LookupError> {
    if let Ok(id) = ZoneId::parse(target) {
        if zones.iter().any(|zone| zone.id == id) {
            return Ok(id);
        }
    }

    let wanted = target.trim().to_lowercase();
    if let Some(zone) = zones.iter().find(|zone| zone.name.to_lowercase() == wanted) {
        return Ok(zone.id.clone());
    }

    let partial: Vec<&Zone> = zones
        .iter()
        .filter(|zone| {
            let name = zone.name.to_lowercase();
            !wanted.is_empty() && (name.contains(&wanted) || wanted.contains(&name))
        })
        .collect();

    if let [zone] = partial[..] {
        tracing::info!(
            "No exact match for '{}', using partial match '{}'",
            target,
            zone.name
        );
        return Ok(zone.id.clone());
    }

    let mut available = format_zone_list(zones);
    if !partial.is_empty() {
        available.push_str("\n\nDid you mean one of these?\n");
        for zone in partial {
            let _ = writeln!(available, "  - {}", zone.name);
        }
    }

    Err(LookupError::NotFound {
        target: target.to_string(),
        available,
    })
}

/// One line per zone: name, floor, id and default volume
pub fn format_zone_list(zones: &[Zone]) -> String {
    if zones.is_empty() {
        return "  (none)".to_string();
    }

    let mut out = String::new();
    for (i, zone) in zones.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "  {}", zone.name);
        if let Some(floor) = &zone.floor {
            let _ = write!(out, " [{}]", floor);
        }
        let _ = write!(out, " ({}) volume {}", zone.id, zone.default_volume.value());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const LOBBY: &str = "2f1c9a4e-0000-4000-8000-000000000001";
    const BAR: &str = "2f1c9a4e-0000-4000-8000-000000000002";
    const BAR_TERRACE: &str = "2f1c9a4e-0000-4000-8000-000000000003";

    fn selector() -> ZoneSelector {
        let mut selector = ZoneSelector::new();
        selector.refresh(vec![
            Zone::new(ZoneId::parse(LOBBY).unwrap(), "Lobby"),
            Zone::new(ZoneId::parse(BAR).unwrap(), "Bar"),
            Zone::new(ZoneId::parse(BAR_TERRACE).unwrap(), "Bar Terrace"),
        ]);
        selector
    }

    #[rstest]
    #[case::by_id(LOBBY, LOBBY)]
    #[case::by_uppercase_id("2F1C9A4E-0000-4000-8000-000000000002", BAR)]
    #[case::exact_name_wins_over_partial("bar", BAR)]
    #[case::single_partial("terr", BAR_TERRACE)]
    #[case::surrounding_whitespace("  lobby ", LOBBY)]
    fn test_find_zone(#[case] target: &str, #[case] expected: &str) {
        let mut selector = selector();
        let zone = find_zone(&mut selector, target).unwrap();
        assert_eq!(zone.id.as_str(), expected);
        assert_eq!(selector.selected().map(|z| z.id.as_str()), Some(expected));
    }

    #[test]
    fn test_ambiguous_partial_lists_candidates() {
        let mut selector = selector();
        // "ba" matches both bars and is nobody's exact name.
        let err = find_zone(&mut selector, "ba").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Did you mean"));
        assert!(message.contains("  - Bar Terrace"));
        assert!(selector.selected().is_none());
    }

    #[test]
    fn test_unknown_zone_lists_all() {
        let mut selector = selector();
        let err = find_zone(&mut selector, "Kitchen").unwrap_err();
        assert!(matches!(err, LookupError::NotFound { .. }));
        assert!(err.to_string().contains("Lobby"));
        assert!(!err.to_string().contains("Did you mean"));
    }

    #[test]
    fn test_no_zones() {
        let mut selector = ZoneSelector::new();
        assert!(matches!(find_zone(&mut selector, "Lobby"), Err(LookupError::NoZones)));
        assert!(matches!(first_zone(&mut selector), Err(LookupError::NoZones)));
    }

    #[test]
    fn test_first_zone() {
        let mut selector = selector();
        assert_eq!(first_zone(&mut selector).unwrap().name, "Lobby");
    }

    #[test]
    fn test_format_zone_list() {
        assert_eq!(format_zone_list(&[]), "  (none)");
        let listing = format_zone_list(selector().zones());
        assert_eq!(listing.lines().count(), 3);
        assert!(listing.starts_with("  Lobby (2f1c9a4e-0000-4000-8000-000000000001) volume"));
    }
}
