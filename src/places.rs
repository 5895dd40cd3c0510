//! A catalogue of named campus destinations, so a user can ask for
//! "Library" instead of typing coordinates. The catalogue is a RON map of
//! building name to `(lat, lon)`:
//!
//! ```text
//! {"Library": (13.622, 123.195), "Engineering Building": (13.6231, 123.1942)}
//! ```

use crate::geodesy::LatLon;
use crate::route::RouteError;
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceCatalog {
    places: BTreeMap<String, LatLon>,
}

impl PlaceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a place. Surrounding whitespace in the name is dropped.
    pub fn insert(&mut self, name: &str, location: LatLon) {
        self.places.insert(name.trim().to_owned(), location);
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// Case-insensitive exact lookup.
    pub fn get(&self, name: &str) -> Option<(&str, LatLon)> {
        let wanted = name.trim().to_lowercase();
        self.places
            .iter()
            .find(|(n, _)| n.to_lowercase() == wanted)
            .map(|(n, &p)| (n.as_str(), p))
    }

    /// Every place whose name contains `query`, ignoring case, sorted by
    /// name. An empty query lists the whole catalogue.
    pub fn search(&self, query: &str) -> Vec<(&str, LatLon)> {
        let needle = query.trim().to_lowercase();
        self.places
            .iter()
            .filter(|(n, _)| n.to_lowercase().contains(&needle))
            .map(|(n, &p)| (n.as_str(), p))
            .collect()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RouteError> {
        let mut handle = File::open(path).map_err(RouteError::IoError)?;
        let mut buf = String::new();
        handle.read_to_string(&mut buf).map_err(RouteError::IoError)?;
        Self::from_ron(&buf)
    }

    pub fn from_ron(s: &str) -> Result<Self, RouteError> {
        let raw: BTreeMap<String, LatLon> = ron::from_str(s).map_err(RouteError::RonSpannedError)?;
        let mut catalog = Self::new();
        for (name, location) in raw {
            if !name.trim().is_empty() {
                catalog.insert(&name, location);
            }
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMPUS: &str = r#"{
        "Library": (13.622, 123.195),
        "Engineering Building": (13.6231, 123.1942),
        "  Gymnasium ": (13.6209, 123.1961),
        "": (0.0, 0.0),
    }"#;

    #[test]
    fn loads_and_trims_names() {
        let catalog = PlaceCatalog::from_ron(CAMPUS).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.get("gymnasium"),
            Some(("Gymnasium", LatLon::new(13.6209, 123.1961)))
        );
    }

    #[test]
    fn search_is_case_insensitive_and_sorted() {
        let catalog = PlaceCatalog::from_ron(CAMPUS).unwrap();
        let hits: Vec<&str> = catalog.search("A").into_iter().map(|(n, _)| n).collect();
        assert_eq!(hits, vec!["Gymnasium", "Library"]);
        assert_eq!(catalog.search("").len(), 3);
        assert!(catalog.search("cafeteria").is_empty());
    }

    #[test]
    fn loads_from_disk() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), CAMPUS).unwrap();
        let catalog = PlaceCatalog::from_path(file.path()).unwrap();
        assert!(catalog.get("library").is_some());
        assert!(PlaceCatalog::from_path(file.path().join("missing")).is_err());
    }
}
