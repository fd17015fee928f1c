use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GeoindexError, Result};

/// One photo's record in `images.json`.
///
/// `title`, `tags` and `original_link` are written by people; the tool only
/// fills in `added`, `taken`, `location`, `width` and `height`. Keys the
/// tool does not know are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub added: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub taken: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub original_link: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub location: String,
    #[serde(default, with = "dimension")]
    pub width: Option<u32>,
    #[serde(default, with = "dimension")]
    pub height: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogEntry {
    /// A blank entry for a file seen for the first time.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: String::new(),
            tags: Vec::new(),
            added: String::new(),
            taken: String::new(),
            original_link: String::new(),
            location: String::new(),
            width: None,
            height: None,
            extra: Map::new(),
        }
    }

    pub fn has_taken(&self) -> bool {
        !self.taken.trim().is_empty()
    }
}

/// Pixel dimensions are an integer on disk, or `""` when unknown.
mod dimension {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => s.serialize_u32(*n),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

/// Hand-edited text fields take any JSON value. `null` reads as empty,
/// other non-strings as their JSON text, and a lone tag as a one-tag list.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn text(value: Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(Value::deserialize(d)?))
    }

    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(text)
                .collect(),
            other => Some(text(other)).filter(|s| !s.is_empty()).into_iter().collect(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Current {
        #[serde(default)]
        images: Vec<CatalogEntry>,
        #[serde(default)]
        pruned: Vec<CatalogEntry>,
    },
    Legacy(Vec<CatalogEntry>),
}

/// The live image list plus entries demoted by pruning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub images: Vec<CatalogEntry>,
    pub pruned: Vec<CatalogEntry>,
}

impl Catalog {
    /// Parse any of the accepted layouts: `{"images", "pruned"}`,
    /// `{"images"}` alone, or a bare array of entries.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        Ok(match serde_json::from_str(text)? {
            CatalogFile::Current { images, pruned } => Self { images, pruned },
            CatalogFile::Legacy(images) => Self {
                images,
                pruned: Vec::new(),
            },
        })
    }

    /// Load a catalog file. A missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|source| GeoindexError::InvalidCatalog {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a catalog, starting empty if the file is corrupt.
    ///
    /// The unreadable file is copied to `<path>.bak` first so the next save
    /// cannot destroy it.
    pub fn load_or_recover(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(GeoindexError::InvalidCatalog { path, source }) => {
                let backup = backup_path(&path);
                fs::copy(&path, &backup)?;
                log::error!(
                    "{} is not valid JSON ({}); saved a copy to {} and starting from an empty catalog",
                    path.display(),
                    source,
                    backup.display()
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Serialize with one compact entry per line.
    pub fn to_json_string(&self) -> Result<String> {
        let mut out = String::from("{\n  \"images\": [\n");
        write_entries(&mut out, &self.images)?;
        out.push_str("  ],\n  \"pruned\": [\n");
        write_entries(&mut out, &self.pruned)?;
        out.push_str("  ]\n}\n");
        Ok(out)
    }

    /// Write atomically: temp file first, then rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_json_string()?;
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);
        fs::write(&temp_path, text)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

fn write_entries(out: &mut String, entries: &[CatalogEntry]) -> Result<()> {
    for (i, entry) in entries.iter().enumerate() {
        out.push_str("    ");
        out.push_str(&serde_json::to_string(entry)?);
        if i + 1 < entries.len() {
            out.push(',');
        }
        out.push('\n');
    }
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Presentation order: entries with a `taken` date, newest first, then the
/// rest by `added`, newest first. Equal keys keep their relative order.
pub fn sort_for_display(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let (mut dated, mut undated): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(CatalogEntry::has_taken);
    dated.sort_by(|a, b| b.taken.cmp(&a.taken));
    undated.sort_by(|a, b| b.added.cmp(&a.added));
    dated.extend(undated);
    dated
}
