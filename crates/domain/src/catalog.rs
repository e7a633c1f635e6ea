use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// The enumerable filter dimensions cached from the upstream portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogDimension {
    Clubs,
    Zones,
    ClassTypes,
    Trainers,
}

impl CatalogDimension {
    pub const ALL: [CatalogDimension; 4] = [
        CatalogDimension::Clubs,
        CatalogDimension::Zones,
        CatalogDimension::ClassTypes,
        CatalogDimension::Trainers,
    ];
}

impl Display for CatalogDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CatalogDimension::Clubs => "clubs",
            CatalogDimension::Zones => "zones",
            CatalogDimension::ClassTypes => "class_types",
            CatalogDimension::Trainers => "trainers",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum InvalidDimensionError {
    #[error("Unknown catalog dimension: {0}")]
    Unknown(String),
}

impl FromStr for CatalogDimension {
    type Err = InvalidDimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clubs" => Ok(CatalogDimension::Clubs),
            "zones" => Ok(CatalogDimension::Zones),
            "class_types" => Ok(CatalogDimension::ClassTypes),
            "trainers" => Ok(CatalogDimension::Trainers),
            _ => Err(InvalidDimensionError::Unknown(s.to_string())),
        }
    }
}

/// One enumerable value of a filter dimension, e.g. a club or a trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

/// The last successfully refreshed value of one dimension. Snapshots are
/// served for as long as needed when refreshes fail; `refreshed_at` is the
/// only staleness signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub dimension: CatalogDimension,
    pub entries: Vec<CatalogEntry>,
    /// Millis UTC of the refresh that produced these entries
    pub refreshed_at: i64,
}

/// Display-name lookup across cached catalog snapshots. Ids unknown to the
/// (possibly stale) catalog resolve to `None`; staleness degrades names,
/// never matching.
#[derive(Debug, Clone, Default)]
pub struct NameDirectory {
    names: HashMap<CatalogDimension, HashMap<String, String>>,
}

impl NameDirectory {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&mut self, snapshot: &CatalogSnapshot) {
        let names = self.names.entry(snapshot.dimension).or_default();
        for entry in &snapshot.entries {
            names.insert(entry.id.clone(), entry.name.clone());
        }
    }

    pub fn resolve(&self, dimension: CatalogDimension, id: &str) -> Option<&str> {
        self.names
            .get(&dimension)
            .and_then(|names| names.get(id))
            .map(String::as_str)
    }

    /// Every club id the catalog currently knows, in unspecified order
    pub fn club_ids(&self) -> Vec<String> {
        self.names
            .get(&CatalogDimension::Clubs)
            .map(|names| names.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dimension_roundtrips_through_strings() {
        for dimension in &CatalogDimension::ALL {
            let parsed = dimension.to_string().parse::<CatalogDimension>();
            assert_eq!(parsed.unwrap(), *dimension);
        }
        assert!("gyms".parse::<CatalogDimension>().is_err());
    }

    #[test]
    fn unknown_ids_resolve_to_none() {
        let mut directory = NameDirectory::new();
        directory.add(&CatalogSnapshot {
            dimension: CatalogDimension::Clubs,
            entries: vec![CatalogEntry {
                id: "7".into(),
                name: "Bemowo".into(),
            }],
            refreshed_at: 0,
        });
        assert_eq!(directory.resolve(CatalogDimension::Clubs, "7"), Some("Bemowo"));
        assert_eq!(directory.resolve(CatalogDimension::Clubs, "99"), None);
        assert_eq!(directory.resolve(CatalogDimension::Trainers, "7"), None);
    }
}
