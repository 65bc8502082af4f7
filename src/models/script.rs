use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of script, one index file per kind upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Module,
    Command,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::Module => "module",
            ScriptKind::Command => "command",
        }
    }

    /// Path of this kind's index inside the scripts repository
    pub fn index_path(&self) -> String {
        format!("{}-index.json", self.as_str())
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "module" => Ok(ScriptKind::Module),
            "command" => Ok(ScriptKind::Command),
            _ => Err(()),
        }
    }
}

/// One entry of `module-index.json` / `command-index.json`
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptIndexEntry {
    pub filename: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    #[serde(default)]
    pub path: String,
}

impl ScriptIndexEntry {
    /// File name with the `.lua` extension removed
    pub fn stem(&self) -> &str {
        self.filename.strip_suffix(".lua").unwrap_or(&self.filename)
    }

    /// Case-insensitive match against a requested script name
    pub fn matches(&self, name: &str) -> bool {
        self.stem().eq_ignore_ascii_case(name)
    }
}

/// Script record returned to the front-end
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    pub version: String,
    pub download_url: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub image_url: String,
}

impl Script {
    /// Map an index entry to its display record
    ///
    /// `content_base` is the CDN root of the scripts repository.
    pub fn from_index(entry: &ScriptIndexEntry, content_base: &str, now: DateTime<Utc>) -> Self {
        let stem = entry.stem().to_string();
        Self {
            id: format!("{}-{}", entry.kind, stem),
            name: if entry.name.is_empty() {
                stem.clone()
            } else {
                entry.name.clone()
            },
            description: entry.description.clone(),
            author: entry.author.clone(),
            kind: entry.kind,
            version: if entry.version.is_empty() {
                "1.0.0".to_string()
            } else {
                entry.version.clone()
            },
            download_url: format!("{}/{}", content_base, entry.path.trim_start_matches('/')),
            filename: stem,
            created_at: now,
            updated_at: now,
            image_url: String::new(),
        }
    }
}

/// Response body of `GET /api/scripts`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptListing {
    pub module: Vec<Script>,
    pub command: Vec<Script>,
}
