//! # Catalog
//!
//! Plant records served by the backend.
//!
//! The catalog is read-only once it is in a store. A bundled demo set
//! (`plants.json`) ships with the crate and is what the server seeds an empty
//! store with, unless a different file is configured.
use std::{collections::HashSet, fs, io, path::Path};

use thiserror::Error;

pub mod plants;

pub use plants::PlantRecord;

const DEMO_CATALOG: &str = include_str!("../plants.json");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed catalog: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Duplicate plant id {0} in catalog")]
    DuplicateId(i64),
}

pub fn demo_catalog() -> Result<Vec<PlantRecord>, CatalogError> {
    parse_catalog(DEMO_CATALOG)
}

pub fn read_catalog(path: impl AsRef<Path>) -> Result<Vec<PlantRecord>, CatalogError> {
    let data = fs::read_to_string(path)?;

    parse_catalog(&data)
}

/// Reads `path` when given, otherwise falls back to the bundled demo set.
pub fn load_catalog(path: Option<&Path>) -> Result<Vec<PlantRecord>, CatalogError> {
    match path {
        Some(path) => read_catalog(path),
        None => demo_catalog(),
    }
}

fn parse_catalog(data: &str) -> Result<Vec<PlantRecord>, CatalogError> {
    let plants: Vec<PlantRecord> = serde_json::from_str(data)?;

    let mut seen = HashSet::with_capacity(plants.len());
    for plant in &plants {
        if !seen.insert(plant.id) {
            return Err(CatalogError::DuplicateId(plant.id));
        }
    }

    Ok(plants)
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    #[test]
    fn test_demo_catalog() {
        let plants = demo_catalog().unwrap();

        assert_eq!(plants.len(), 5);
        assert_eq!(
            plants.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(plants[0].name_lat, "Malus domestica");
        assert_eq!(plants[1].soil, vec!["супесчаная", "песчаная"]);
        assert_eq!(plants[4].images.len(), 4);
    }

    #[test]
    fn test_wire_names() {
        let plants = demo_catalog().unwrap();
        let json = serde_json::to_value(&plants[2]).unwrap();

        assert_eq!(json["nameRU"], "Ель обыкновенная");
        assert_eq!(json["nameLAT"], "Picea abies");
        assert_eq!(json["type"], "Дерево");
        assert_eq!(json["relevance"], 85);
        assert!(json.get("name_ru").is_none());
    }

    #[test]
    fn test_duplicate_ids() {
        let data = format!(
            "[{plant}, {plant}]",
            plant = serde_json::to_string(&demo_catalog().unwrap()[0]).unwrap()
        );

        assert!(matches!(
            parse_catalog(&data),
            Err(CatalogError::DuplicateId(1))
        ));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            parse_catalog("{\"id\": 1}"),
            Err(CatalogError::Malformed(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = env::temp_dir().join(format!("catalog-{}.json", std::process::id()));
        let plants = &demo_catalog().unwrap()[..2];
        fs::write(&path, serde_json::to_string(plants).unwrap()).unwrap();

        let loaded = load_catalog(Some(&path)).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(loaded, plants);
    }

    #[test]
    fn test_load_missing_file() {
        let path = Path::new("/nonexistent/plants.json");

        assert!(matches!(load_catalog(Some(path)), Err(CatalogError::Io(_))));
    }
}
