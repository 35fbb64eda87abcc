//! Model and encoder artifact loading

use crate::error::InferenceError;
use crate::models::encoders::{EncoderTable, EncoderTableFile};
use crate::models::inference::PricePredictor;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::LinearRegression;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub type LinearModel = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;
pub type ForestModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Serialized regressor, tagged by algorithm
#[derive(Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "model", rename_all = "snake_case")]
pub enum Regressor {
    LinearRegression(LinearModel),
    RandomForest(ForestModel),
}

impl Regressor {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Regressor::LinearRegression(_) => "linear_regression",
            Regressor::RandomForest(_) => "random_forest",
        }
    }
}

/// On-disk model envelope. The feature order is part of the artifact and is
/// checked against the serving layout at load time.
#[derive(Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub model_version: String,
    pub feature_names: Vec<String>,
    pub regressor: Regressor,
}

/// Loaded regression model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// Version shared with the encoder table
    pub model_version: String,
    /// Feature order the model was trained on
    pub feature_names: Vec<String>,
    regressor: Regressor,
}

impl LoadedModel {
    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self {
            name: artifact.name,
            model_version: artifact.model_version,
            feature_names: artifact.feature_names,
            regressor: artifact.regressor,
        }
    }

    pub fn algorithm(&self) -> &'static str {
        self.regressor.algorithm()
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm())
            .field("model_version", &self.model_version)
            .field("features", &self.feature_names.len())
            .finish()
    }
}

impl PricePredictor for LoadedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> Result<f64, InferenceError> {
        if features.len() != self.feature_names.len() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.feature_names.len(),
                actual: features.len(),
            });
        }

        let model_error = |e: smartcore::error::Failed| InferenceError::Model {
            model: self.name.clone(),
            message: e.to_string(),
        };

        let input = DenseMatrix::from_2d_vec(&vec![features.to_vec()]).map_err(model_error)?;
        let output = match &self.regressor {
            Regressor::LinearRegression(model) => model.predict(&input),
            Regressor::RandomForest(model) => model.predict(&input),
        }
        .map_err(model_error)?;

        output
            .first()
            .copied()
            .ok_or_else(|| InferenceError::EmptyOutput {
                model: self.name.clone(),
            })
    }
}

/// Loader for model and encoder artifacts
pub struct ModelLoader {
    models_dir: PathBuf,
}

impl ModelLoader {
    /// Create a loader for `<models_dir>/<name>.json` artifacts
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of a named model artifact
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("{name}.json"))
    }

    /// Load a single model artifact
    pub fn load_model(&self, name: &str) -> Result<LoadedModel> {
        let path = self.model_path(name);

        info!(model = %name, path = %path.display(), "Loading model artifact");

        let file = File::open(&path)
            .with_context(|| format!("Failed to open model artifact {}", path.display()))?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to deserialize model artifact {}", path.display()))?;

        if artifact.name != name {
            bail!(
                "Model artifact {} is named {:?}, expected {:?}",
                path.display(),
                artifact.name,
                name
            );
        }

        let model = LoadedModel::from_artifact(artifact);
        info!(
            model = %model.name,
            algorithm = model.algorithm(),
            version = %model.model_version,
            features = model.feature_names.len(),
            "Model loaded successfully"
        );

        Ok(model)
    }

    /// Load every named model. Any missing or unreadable artifact is fatal.
    pub fn load_models(&self, names: &[String]) -> Result<Vec<LoadedModel>> {
        if names.is_empty() {
            bail!("No models configured");
        }

        let models = names
            .iter()
            .map(|name| self.load_model(name))
            .collect::<Result<Vec<_>>>()?;

        info!(
            count = models.len(),
            "Loaded {} models from {}",
            models.len(),
            self.models_dir.display()
        );

        Ok(models)
    }

    /// Load and validate the encoder table
    pub fn load_encoders<P: AsRef<Path>>(path: P) -> Result<EncoderTable> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading encoder table");

        let file = File::open(path)
            .with_context(|| format!("Failed to open encoder table {}", path.display()))?;
        let table_file: EncoderTableFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to deserialize encoder table {}", path.display()))?;
        let table = EncoderTable::from_file(table_file)
            .with_context(|| format!("Invalid encoder table {}", path.display()))?;

        info!(
            encoders = table.len(),
            features = ?table.feature_names(),
            version = %table.model_version(),
            "Encoder table loaded"
        );

        Ok(table)
    }

    /// Write a model artifact as `<models_dir>/<artifact.name>.json`
    pub fn save_model(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.models_dir)
            .with_context(|| format!("Failed to create {}", self.models_dir.display()))?;
        let path = self.model_path(&artifact.name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, artifact)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        writer.flush()?;
        Ok(path)
    }

    /// Write an encoder table
    pub fn save_encoders<P: AsRef<Path>>(path: P, table: &EncoderTableFile) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, table)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reference::ReferenceArtifacts;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pps-loader-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let dir = temp_dir();
        let loader = ModelLoader::new(&dir);

        let err = loader.load_model("random_forest").unwrap_err();
        assert!(err.to_string().contains("Failed to open model artifact"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_model_is_an_error() {
        let dir = temp_dir();
        std::fs::write(dir.join("random_forest.json"), b"{ not json").unwrap();

        let err = ModelLoader::new(&dir).load_model("random_forest").unwrap_err();
        assert!(err.to_string().contains("Failed to deserialize"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_encoders_is_an_error() {
        let dir = temp_dir();
        assert!(ModelLoader::load_encoders(dir.join("label_encoders.json")).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_saved_artifacts_load_and_predict() {
        let dir = temp_dir();
        let artifacts = ReferenceArtifacts::build().unwrap();
        artifacts.write_to(&dir).unwrap();

        let loader = ModelLoader::new(&dir);
        let models = loader
            .load_models(&["linear_regression".to_string(), "random_forest".to_string()])
            .unwrap();
        let encoders = ModelLoader::load_encoders(dir.join("label_encoders.json")).unwrap();

        assert_eq!(models.len(), 2);
        assert_eq!(models[0].algorithm(), "linear_regression");
        assert_eq!(models[1].algorithm(), "random_forest");
        assert_eq!(encoders.model_version(), models[0].model_version);

        let features = vec![1.0; models[1].feature_names.len()];
        let first = models[1].predict(&features).unwrap();
        assert!(first.is_finite());
        assert_eq!(models[1].predict(&features).unwrap(), first);

        let short = models[1].predict(&features[1..]).unwrap_err();
        assert!(matches!(short, InferenceError::DimensionMismatch { .. }));

        std::fs::remove_dir_all(&dir).ok();
    }
}
