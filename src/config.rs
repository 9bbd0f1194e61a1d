//! Конфигурация конвейера

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::models::forest::ForestParams;
use crate::models::selection::{default_param_grid, ParamGrid};

/// Роли столбцов входной базы данных
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    #[serde(default = "default_categorical")]
    pub categorical: Vec<String>,
    #[serde(default = "default_columns_to_drop")]
    pub columns_to_drop: Vec<String>,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_identifier")]
    pub identifier: String,
    #[serde(default = "default_abundance")]
    pub abundance: String,
}

fn default_categorical() -> Vec<String> {
    [
        "Enzyme Commission Number",
        "Particle Size",
        "Particle Charge",
        "Solvent Cysteine Concentration",
        "Solvent NaCl Concentration",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_columns_to_drop() -> Vec<String> {
    ["Protein Length", "Sequence", "Accession Number", "Bound Fraction"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_target() -> String { "Bound Fraction".to_string() }
fn default_identifier() -> String { "Accession Number".to_string() }
fn default_abundance() -> String { "Protein Abundance".to_string() }

impl Default for DatasetSchema {
    fn default() -> Self {
        Self {
            categorical: default_categorical(),
            columns_to_drop: default_columns_to_drop(),
            target: default_target(),
            identifier: default_identifier(),
            abundance: default_abundance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub schema: DatasetSchema,
    #[serde(default = "default_n_runs")]
    pub n_runs: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub forest: ForestParams,
    #[serde(default = "default_param_grid")]
    pub param_grid: ParamGrid,
    #[serde(default = "default_search_folds")]
    pub search_folds: usize,
    #[serde(default = "default_rfecv_folds")]
    pub rfecv_folds: usize,
}

fn default_n_runs() -> usize { 10 }
fn default_output_dir() -> String { "Output_Files".to_string() }
fn default_search_folds() -> usize { 10 }
fn default_rfecv_folds() -> usize { 5 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: DatasetSchema::default(),
            n_runs: default_n_runs(),
            output_dir: default_output_dir(),
            forest: ForestParams::default(),
            param_grid: default_param_grid(),
            search_folds: default_search_folds(),
            rfecv_folds: default_rfecv_folds(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DataError::Precondition(format!(
                "config {} is not a file",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| DataError::Format(format!("invalid config {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.schema, DatasetSchema::default());
        assert_eq!(config.n_runs, 10);
        assert_eq!(config.search_folds, 10);
        assert_eq!(config.rfecv_folds, 5);
        assert_eq!(config.schema.target, "Bound Fraction");
        assert_eq!(config.schema.categorical.len(), 5);
    }

    #[test]
    fn partial_schema_override() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "schema": { "categorical": ["Charge"] }, "n_runs": 3 }"#,
        )
        .unwrap();
        assert_eq!(config.schema.categorical, vec!["Charge"]);
        assert_eq!(config.schema.identifier, "Accession Number");
        assert_eq!(config.n_runs, 3);
    }
}
