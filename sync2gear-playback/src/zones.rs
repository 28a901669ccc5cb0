//! Zone listing and selection

use sync2gear_api::WireZone;

use crate::error::{PlaybackError, Result};
use crate::model::{Volume, ZoneId};

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub description: Option<String>,
    pub floor: Option<String>,
    pub default_volume: Volume,
}

impl Zone {
    pub fn new(id: ZoneId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            floor: None,
            default_volume: Volume::default(),
        }
    }
}

impl TryFrom<WireZone> for Zone {
    type Error = PlaybackError;

    fn try_from(wire: WireZone) -> Result<Self> {
        Ok(Self {
            id: ZoneId::parse(&wire.id)?,
            name: wire.name,
            description: wire.description.filter(|d| !d.is_empty()),
            floor: wire.floor_name,
            default_volume: wire.default_volume.map(Volume::new).unwrap_or_default(),
        })
    }
}

/// The known zones and which one is selected
#[derive(Debug, Default)]
pub struct ZoneSelector {
    zones: Vec<Zone>,
    selected: Option<ZoneId>,
}

impl ZoneSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing
    ///
    /// A selected zone missing from the new listing is deselected and
    /// returned.
    pub fn refresh(&mut self, zones: Vec<Zone>) -> Option<ZoneId> {
        self.zones = zones;

        let missing = self
            .selected
            .as_ref()
            .is_some_and(|id| !self.zones.iter().any(|z| &z.id == id));
        if missing {
            let dropped = self.selected.take();
            if let Some(id) = &dropped {
                tracing::warn!("Selected zone {} is no longer listed", id);
            }
            return dropped;
        }
        None
    }

    /// Replace the listing from backend records, skipping malformed ones
    pub fn refresh_from_wire(&mut self, zones: Vec<WireZone>) -> Option<ZoneId> {
        let zones = zones
            .into_iter()
            .filter_map(|wire| {
                let id = wire.id.clone();
                Zone::try_from(wire)
                    .map_err(|e| tracing::warn!("Skipping zone {}: {}", id, e))
                    .ok()
            })
            .collect();
        self.refresh(zones)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn get(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|z| &z.id == id)
    }

    /// Select a listed zone by id
    pub fn select(&mut self, id: &str) -> Result<&Zone> {
        let id = ZoneId::parse(id)?;
        let index = self
            .zones
            .iter()
            .position(|z| z.id == id)
            .ok_or_else(|| PlaybackError::UnknownZone(id.to_string()))?;

        self.selected = Some(id);
        Ok(&self.zones[index])
    }

    pub fn selected(&self) -> Option<&Zone> {
        self.get(self.selected.as_ref()?)
    }

    pub fn clear(&mut self) -> Option<ZoneId> {
        self.selected.take()
    }
}
