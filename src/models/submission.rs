use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    ALLOWED_EXTENSIONS, BLOCKED_WORDS, ERR_DISALLOWED_FILES, ERR_INVALID_NAME_CHARS,
    ERR_MISSING_ICON, ERR_MISSING_PAYLOAD, ERR_NAME_REQUIRED, ERR_PROHIBITED_NAME, ICON_FILE_NAME,
    MANIFEST_FILE_NAME,
};
use crate::error::{AppError, Result};

/// Derive the config id from a submitted name: whitespace removed, lowercased
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn strip_to_alphanumeric(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Whether a name contains a blocked word once case and punctuation are stripped
pub fn contains_blocked_word(name: &str) -> bool {
    let normalized = strip_to_alphanumeric(name);
    BLOCKED_WORDS.iter().any(|word| {
        let word = strip_to_alphanumeric(word);
        !word.is_empty() && normalized.contains(&word)
    })
}

/// Whether a config id can be used as one component of a git branch name
/// and as a directory name
///
/// Follows `git check-ref-format`, with `/` also rejected.
pub fn is_ref_safe(id: &str) -> bool {
    const FORBIDDEN: &[char] = &['~', '^', ':', '?', '*', '[', '\\', '/'];

    !id.is_empty()
        && !id.chars().any(|c| c.is_control() || FORBIDDEN.contains(&c))
        && !id.contains("..")
        && !id.contains("@{")
        && id != "@"
        && !id.starts_with('.')
        && !id.ends_with('.')
        && !id.ends_with(".lock")
}

/// One uploaded file
#[derive(Debug, Clone)]
pub struct SubmittedFile {
    /// Name as sent by the client, possibly with a folder prefix
    pub name: String,
    pub content: Vec<u8>,
}

impl SubmittedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Last path segment of the client-supplied name
    pub fn base_name(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name)
    }

    pub fn extension(&self) -> Option<String> {
        self.base_name()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    fn is_icon(&self) -> bool {
        self.base_name() == ICON_FILE_NAME
    }

    fn is_manifest(&self) -> bool {
        self.base_name() == MANIFEST_FILE_NAME
    }
}

/// The `configData` JSON part of an upload form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Manifest written as `main.json` when the caller does not provide one
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub version: &'a str,
    pub author: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// A config submission as received from the upload form
#[derive(Debug, Clone)]
pub struct Submission {
    pub metadata: SubmissionMetadata,
    pub files: Vec<SubmittedFile>,
}

impl Submission {
    pub fn new(metadata: SubmissionMetadata, files: Vec<SubmittedFile>) -> Self {
        Self { metadata, files }
    }

    /// Trimmed display name
    pub fn name(&self) -> &str {
        self.metadata.name.trim()
    }

    pub fn config_id(&self) -> String {
        normalize_name(self.name())
    }

    /// Validate the name against the blocklist
    pub fn validate_name(&self) -> Result<()> {
        if self.config_id().is_empty() {
            return Err(AppError::InvalidInput(ERR_NAME_REQUIRED.to_string()));
        }

        if !is_ref_safe(&self.config_id()) {
            tracing::info!("Blocked upload: name {:?} is not a valid branch component", self.name());
            return Err(AppError::InvalidInput(ERR_INVALID_NAME_CHARS.to_string()));
        }

        if contains_blocked_word(self.name()) {
            tracing::info!("Blocked upload: name {:?} contains prohibited words", self.name());
            return Err(AppError::InvalidInput(ERR_PROHIBITED_NAME.to_string()));
        }

        Ok(())
    }

    /// Validate the uploaded file set
    ///
    /// Only `.json`, `.png` and `.flarial` files are accepted. A non-empty
    /// `icon.png` and at least one payload file are required; `main.json`
    /// is optional and must be valid JSON when present.
    pub fn validate_files(&self) -> Result<()> {
        let disallowed = self.files.iter().any(|f| {
            f.base_name().is_empty()
                || !f
                    .extension()
                    .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        });
        if disallowed {
            return Err(AppError::InvalidInput(ERR_DISALLOWED_FILES.to_string()));
        }

        if !self.files.iter().any(|f| f.is_icon() && !f.content.is_empty()) {
            return Err(AppError::InvalidInput(ERR_MISSING_ICON.to_string()));
        }

        if !self.files.iter().any(|f| !f.is_icon() && !f.is_manifest()) {
            return Err(AppError::InvalidInput(ERR_MISSING_PAYLOAD.to_string()));
        }

        if let Some(manifest) = self.files.iter().find(|f| f.is_manifest()) {
            serde_json::from_slice::<serde_json::Value>(&manifest.content).map_err(|_| {
                AppError::InvalidInput(format!("{} must be valid JSON", MANIFEST_FILE_NAME))
            })?;
        }

        Ok(())
    }

    pub fn has_manifest(&self) -> bool {
        self.files.iter().any(SubmittedFile::is_manifest)
    }

    /// Render the synthesized manifest for this submission
    pub fn render_manifest(&self, author: &str, now: DateTime<Utc>) -> Result<Vec<u8>> {
        let id = self.config_id();
        let manifest = Manifest {
            id: &id,
            name: self.name(),
            version: self.metadata.version.trim(),
            author,
            description: self
                .metadata
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty()),
            created_at: now,
        };
        Ok(serde_json::to_vec_pretty(&manifest)?)
    }

    /// Files to commit, manifest first, one entry per base name
    pub fn commit_files(&self, author: &str, now: DateTime<Utc>) -> Result<Vec<SubmittedFile>> {
        let mut files: Vec<SubmittedFile> = Vec::with_capacity(self.files.len() + 1);

        if !self.has_manifest() {
            files.push(SubmittedFile::new(
                MANIFEST_FILE_NAME,
                self.render_manifest(author, now)?,
            ));
        }

        for file in &self.files {
            // Later duplicates of the same base name replace earlier ones
            if let Some(existing) = files
                .iter_mut()
                .find(|f| f.base_name() == file.base_name())
            {
                *existing = file.clone();
            } else {
                files.push(file.clone());
            }
        }

        Ok(files)
    }
}
