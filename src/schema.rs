//! Custom type schema model and schema directory loading.
//!
//! A custom type schema is the JSON exported from the CMS's type builder:
//! tabs at the top level, each mapping field keys to field definitions.
//!
//! ```json
//! {
//!   "Main": {
//!     "title": { "type": "StructuredText", "config": { "single": "heading1" } },
//!     "body": {
//!       "type": "Slices",
//!       "config": {
//!         "choices": {
//!           "text": { "type": "Slice", "non-repeat": { "content": { "type": "StructuredText" } }, "repeat": {} }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! The Custom Types API wraps the same tabs as `{"id": ..., "json": {...}}`;
//! both forms are accepted.
//!
//! ## Schema directory
//!
//! ```text
//! schemas/
//! ├── page.json          # custom type "page"
//! └── blog_post.json     # custom type "blog_post"
//! ```
//!
//! The file stem is the custom type id unless the wrapped form names one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid schema JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Schema directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Duplicate custom type id {0}")]
    Duplicate(String),
}

/// One field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub config: FieldConfig,
}

/// The parts of a field's `config` that shape the generated types.
///
/// Everything else in `config` (labels, placeholders, constraints) is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Sub-fields of a `Group`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldSchema>,
    /// Variants of a `Slices` zone.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub choices: BTreeMap<String, SliceChoice>,
    /// Named thumbnails of an `Image`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbnails: Vec<ThumbnailSchema>,
}

/// One slice variant declared in a `Slices` zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceChoice {
    /// `"Slice"` for regular slices. Legacy zones allow bare fields as choices.
    #[serde(rename = "type", default)]
    pub choice_type: String,
    #[serde(rename = "non-repeat", default)]
    pub non_repeat: BTreeMap<String, FieldSchema>,
    #[serde(default)]
    pub repeat: BTreeMap<String, FieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSchema {
    pub name: String,
}

/// A custom type schema: the id plus its fields, tab by tab.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomTypeSchema {
    pub id: String,
    pub tabs: BTreeMap<String, BTreeMap<String, FieldSchema>>,
}

impl CustomTypeSchema {
    /// Parse schema JSON for the given custom type id.
    ///
    /// A wrapped `{"id", "json"}` document overrides `id` with its own.
    pub fn from_value(id: &str, value: Value) -> Result<Self, serde_json::Error> {
        let (id, tabs_value) = match value {
            Value::Object(mut map) if map.get("json").is_some_and(Value::is_object) => {
                let id = map
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or(id)
                    .to_string();
                (id, map.remove("json").unwrap_or(Value::Null))
            }
            other => (id.to_string(), other),
        };
        let tabs = serde_json::from_value(tabs_value)?;
        Ok(Self { id, tabs })
    }

    pub fn from_json(id: &str, json: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(id, value)
    }

    /// All fields across tabs. A key repeated in a later tab wins.
    pub fn fields(&self) -> BTreeMap<&str, &FieldSchema> {
        self.tabs
            .values()
            .flat_map(|tab| tab.iter().map(|(k, v)| (k.as_str(), v)))
            .collect()
    }

    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.tabs.values().rev().find_map(|tab| tab.get(key))
    }
}

/// Custom type schemas keyed by custom type id.
pub type SchemaSet = BTreeMap<String, CustomTypeSchema>;

/// Load every `*.json` file under `dir` as a custom type schema.
///
/// Returns an empty set when the directory does not exist, so a build without
/// schemas degrades to shape-based classification.
pub fn load_schemas(dir: &Path) -> Result<SchemaSet, SchemaError> {
    let mut schemas = SchemaSet::new();
    if !dir.exists() {
        return Ok(schemas);
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = fs::read_to_string(path)?;
        let schema =
            CustomTypeSchema::from_json(&stem, &content).map_err(|source| SchemaError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        if schemas.contains_key(&schema.id) {
            return Err(SchemaError::Duplicate(schema.id));
        }
        schemas.insert(schema.id.clone(), schema);
    }
    Ok(schemas)
}
