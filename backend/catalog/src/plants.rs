use serde::{Deserialize, Serialize};

/// A single catalog entry.
///
/// Field names on the wire follow the frontend's existing payloads
/// (`nameRU`, `nameLAT`, `type`), so the serde renames here are load-bearing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlantRecord {
    pub id: i64,

    #[serde(rename = "nameRU")]
    pub name_ru: String,

    #[serde(rename = "nameLAT")]
    pub name_lat: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub foliage: String,

    /// Height class, not a measurement.
    pub height: String,

    /// Hardiness zone.
    pub zone: String,

    #[serde(default)]
    pub soil: Vec<String>,

    pub light: String,

    #[serde(default)]
    pub purpose: Vec<String>,

    pub relevance: i32,

    pub description: String,

    /// Display glyphs, shown in order.
    #[serde(default)]
    pub images: Vec<String>,
}
