//! Source descriptors and the reader seam.
//!
//! A [`SourceSpec`] names one place recipe or item-name data may come
//! from; the built-in lists encode the fallback priority (local manual
//! files first, then the remote dump mirrors). [`SourceReader`] is the
//! trait boundary the build orchestrator consumes, so tests can substitute
//! scripted readers without touching the filesystem or the network.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::constants::{SOURCE_TIMEOUT, USER_AGENT};
use crate::errors::{BuildError, Result};

/// How a source's payload should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Xml,
}

/// Where a source's payload lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Url(String),
}

/// One prioritized data source.
#[derive(Clone, Debug)]
pub struct SourceSpec {
    /// Human-readable label used in logs and failure reports.
    pub label: String,
    pub location: SourceLocation,
    pub format: SourceFormat,
}

impl SourceSpec {
    pub fn json_file(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            location: SourceLocation::File(path.into()),
            format: SourceFormat::Json,
        }
    }

    pub fn xml_file(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            location: SourceLocation::File(path.into()),
            format: SourceFormat::Xml,
        }
    }

    pub fn json_url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            location: SourceLocation::Url(url.into()),
            format: SourceFormat::Json,
        }
    }

    pub fn xml_url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            location: SourceLocation::Url(url.into()),
            format: SourceFormat::Xml,
        }
    }
}

/// Payload fetched from one source, already decoded per its format.
#[derive(Clone, Debug)]
pub enum SourceContent {
    Json(Value),
    Xml(String),
}

/// Fetches and decodes one source. The orchestrator iterates specs in
/// priority order and treats any error as "try the next source".
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read(&self, spec: &SourceSpec) -> Result<SourceContent>;
}

/// Production reader: local files via tokio fs, remote dumps via reqwest.
pub struct HttpSourceReader {
    client: reqwest::Client,
}

impl HttpSourceReader {
    pub fn new() -> Self {
        Self::with_timeout(SOURCE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    async fn read_raw(&self, spec: &SourceSpec) -> Result<String> {
        match &spec.location {
            SourceLocation::File(path) => {
                debug!("reading source '{}' from {}", spec.label, path.display());
                Ok(tokio::fs::read_to_string(path).await?)
            }
            SourceLocation::Url(url) => {
                debug!("fetching source '{}' from {}", spec.label, url);
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(BuildError::Http {
                        status: status.as_u16(),
                    });
                }
                Ok(response.text().await?)
            }
        }
    }
}

impl Default for HttpSourceReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceReader for HttpSourceReader {
    async fn read(&self, spec: &SourceSpec) -> Result<SourceContent> {
        let raw = self.read_raw(spec).await?;
        match spec.format {
            SourceFormat::Json => Ok(SourceContent::Json(serde_json::from_str(&raw)?)),
            SourceFormat::Xml => Ok(SourceContent::Xml(raw)),
        }
    }
}

const AO_DATA_BASE: &str = "https://raw.githubusercontent.com/ao-data/ao-bin-dumps/master";
const MIRROR_BASE: &str = "https://raw.githubusercontent.com/broderickhyman/ao-bin-dumps/master";

/// Item-name sources, best first.
pub fn default_name_sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec::json_url(
            "ao-data formatted items",
            format!("{AO_DATA_BASE}/formatted/items.json"),
        ),
        SourceSpec::json_url("ao-data items", format!("{AO_DATA_BASE}/items.json")),
        SourceSpec::json_url(
            "broderickhyman formatted items",
            format!("{MIRROR_BASE}/formatted/items.json"),
        ),
        SourceSpec::json_url(
            "broderickhyman items",
            format!("{MIRROR_BASE}/items.json"),
        ),
    ]
}

/// Recipe sources, best first: curated local files, then the remote
/// crafting-requirement dumps, then the full item dumps as a last resort.
pub fn default_recipe_sources(data_dir: &Path) -> Vec<SourceSpec> {
    vec![
        SourceSpec::json_file("local manual recipes", data_dir.join("recipes.json")),
        SourceSpec::json_file("local items dump", data_dir.join("items.json")),
        SourceSpec::json_file(
            "local craftingrequirements dump",
            data_dir.join("craftingrequirements.json"),
        ),
        SourceSpec::xml_file("local items xml", data_dir.join("items.xml")),
        SourceSpec::json_url(
            "ao-data formatted craftingrequirements",
            format!("{AO_DATA_BASE}/formatted/craftingrequirements.json"),
        ),
        SourceSpec::json_url(
            "ao-data craftingrequirements",
            format!("{AO_DATA_BASE}/craftingrequirements.json"),
        ),
        SourceSpec::json_url(
            "broderickhyman formatted craftingrequirements",
            format!("{MIRROR_BASE}/formatted/craftingrequirements.json"),
        ),
        SourceSpec::json_url(
            "broderickhyman craftingrequirements",
            format!("{MIRROR_BASE}/craftingrequirements.json"),
        ),
        SourceSpec::xml_url("ao-data items.xml", format!("{AO_DATA_BASE}/items.xml")),
        SourceSpec::xml_url(
            "broderickhyman items.xml",
            format!("{MIRROR_BASE}/items.xml"),
        ),
        SourceSpec::json_url(
            "ao-data formatted items",
            format!("{AO_DATA_BASE}/formatted/items.json"),
        ),
        SourceSpec::json_url("ao-data items", format!("{AO_DATA_BASE}/items.json")),
        SourceSpec::json_url(
            "broderickhyman formatted items",
            format!("{MIRROR_BASE}/formatted/items.json"),
        ),
        SourceSpec::json_url(
            "broderickhyman items",
            format!("{MIRROR_BASE}/items.json"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_sources_local_files_come_first() {
        let sources = default_recipe_sources(Path::new("/tmp/data"));
        assert!(sources.len() >= 4);
        for spec in &sources[..4] {
            assert!(matches!(spec.location, SourceLocation::File(_)));
        }
        assert!(sources[4..]
            .iter()
            .all(|spec| matches!(spec.location, SourceLocation::Url(_))));
    }

    #[test]
    fn test_xml_sources_marked_as_xml() {
        let sources = default_recipe_sources(Path::new("/tmp/data"));
        let xml_labels: Vec<_> = sources
            .iter()
            .filter(|spec| spec.format == SourceFormat::Xml)
            .map(|spec| spec.label.as_str())
            .collect();
        assert_eq!(
            xml_labels,
            vec![
                "local items xml",
                "ao-data items.xml",
                "broderickhyman items.xml"
            ]
        );
    }

    #[tokio::test]
    async fn test_file_reader_decodes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipes.json");
        std::fs::write(&path, r#"{"recipes": []}"#).unwrap();

        let reader = HttpSourceReader::new();
        let spec = SourceSpec::json_file("local manual recipes", &path);
        match reader.read(&spec).await.unwrap() {
            SourceContent::Json(value) => assert!(value.get("recipes").is_some()),
            SourceContent::Xml(_) => panic!("expected json content"),
        }
    }

    #[tokio::test]
    async fn test_file_reader_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipes.json");
        std::fs::write(&path, "not json").unwrap();

        let reader = HttpSourceReader::new();
        let spec = SourceSpec::json_file("local manual recipes", &path);
        assert!(matches!(
            reader.read(&spec).await,
            Err(BuildError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_io_error() {
        let reader = HttpSourceReader::new();
        let spec = SourceSpec::json_file("local manual recipes", "/nonexistent/recipes.json");
        assert!(matches!(reader.read(&spec).await, Err(BuildError::Io(_))));
    }
}
