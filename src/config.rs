use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{MergeError, Result};
use crate::pipeline::processing::normalize::LookupTables;

/// Environment variable overriding `work_dir`
pub const WORK_DIR_ENV: &str = "KBBE_WORK_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory all relative input and output files resolve against
    pub work_dir: PathBuf,
    pub log_dir: PathBuf,
    pub reference: ReferenceConfig,
    pub sources: Vec<SourceConfig>,
    pub outputs: OutputConfig,
    pub enrichment: EnrichmentConfig,
    pub lookups: LookupTables,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub name: String,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub file: PathBuf,
    /// A missing or empty mandatory source aborts the run
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
}

fn default_mandatory() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub aggregated: PathBuf,
    pub enriched: PathBuf,
    pub audit: PathBuf,
    pub summary: PathBuf,
    /// Prometheus text snapshot, written only when set
    pub metrics: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub columns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("preprocessing/outputs"),
            log_dir: PathBuf::from("logs"),
            reference: ReferenceConfig::default(),
            sources: constants::default_sources()
                .into_iter()
                .map(|(name, file)| SourceConfig {
                    name: name.to_string(),
                    file: PathBuf::from(file),
                    mandatory: true,
                })
                .collect(),
            outputs: OutputConfig::default(),
            enrichment: EnrichmentConfig::default(),
            lookups: LookupTables::default(),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            name: "ogd".to_string(),
            file: PathBuf::from(constants::REFERENCE_FILE),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            aggregated: PathBuf::from(constants::AGGREGATED_FILE),
            enriched: PathBuf::from(constants::ENRICHED_FILE),
            audit: PathBuf::from(constants::AUDIT_FILE),
            summary: PathBuf::from(constants::SUMMARY_FILE),
            metrics: None,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            columns: constants::DEFAULT_ENRICH_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load from a TOML file, apply the environment override and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MergeError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` when it exists, otherwise fall back to the stock layout
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(WORK_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.work_dir = PathBuf::from(dir.trim());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(MergeError::Config("at least one candidate source is required".to_string()));
        }

        let mut names = BTreeSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(MergeError::Config("source name must not be empty".to_string()));
            }
            if !names.insert(source.name.as_str()) {
                return Err(MergeError::Config(format!("duplicate source name '{}'", source.name)));
            }
        }

        if let Some(column) = self
            .enrichment
            .columns
            .iter()
            .find(|c| constants::is_identity_field(c))
        {
            return Err(MergeError::Config(format!(
                "enrichment column '{}' is an identity field",
                column
            )));
        }

        let outputs = [
            ("aggregated", &self.outputs.aggregated),
            ("enriched", &self.outputs.enriched),
            ("audit", &self.outputs.audit),
            ("summary", &self.outputs.summary),
        ];
        for (label, file) in outputs {
            if file.as_os_str().is_empty() {
                return Err(MergeError::Config(format!("output '{}' has no file name", label)));
            }
        }

        Ok(())
    }

    /// Resolve a configured file against `work_dir`
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.work_dir.join(file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.sources.len(), 4);
        assert!(config.sources.iter().all(|s| s.mandatory));
        assert_eq!(config.enrichment.columns.len(), 17);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = Config::from_toml(
            r#"
            work_dir = "data"

            [reference]
            name = "ogd"
            file = "ogd.csv"

            [[sources]]
            name = "stadt_linz"
            file = "linz.csv"

            [[sources]]
            name = "caritas"
            file = "caritas.csv"
            mandatory = false

            [outputs]
            metrics = "merge.prom"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.sources.len(), 2);
        assert!(config.sources[0].mandatory);
        assert!(!config.sources[1].mandatory);
        assert_eq!(config.outputs.enriched, PathBuf::from(constants::ENRICHED_FILE));
        assert_eq!(config.outputs.metrics, Some(PathBuf::from("merge.prom")));
        assert_eq!(config.resolve(Path::new("ogd.csv")), PathBuf::from("data/ogd.csv"));
        assert_eq!(config.lookups, LookupTables::default());
    }

    #[test]
    fn test_rejects_identity_enrichment_column() {
        let mut config = Config::default();
        config.enrichment.columns.push("plz".to_string());
        assert!(matches!(config.validate(), Err(MergeError::Config(_))));
    }

    #[test]
    fn test_rejects_duplicate_sources() {
        let mut config = Config::default();
        let dup = config.sources[0].clone();
        config.sources.push(dup);
        assert!(matches!(config.validate(), Err(MergeError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_sources() {
        let mut config = Config::default();
        config.sources.clear();
        assert!(matches!(config.validate(), Err(MergeError::Config(_))));
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(matches!(Config::from_toml("sources = 3"), Err(MergeError::Toml(_))));
    }
}
