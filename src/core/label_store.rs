// Online label store - guards and bookkeeping around the kNN capability

use crate::core::config::Config;
use crate::core::knn::KnnClassifier;
use crate::models::classifier::{
    ClassIndex, ClassInfo, ClassifierError, ClassifierResult, Dataset, DatasetExample,
    FeatureVector, Prediction,
};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;

/// Adapter over a [`KnnClassifier`] enforcing the class range, vector
/// dimension and the non-empty precondition of `predict`.
pub struct LabelStore {
    classifier: Box<dyn KnnClassifier>,
    num_classes: usize,
    max_examples_per_class: Option<usize>,
    feature_len: Option<usize>,
    session_id: Option<String>,
}

impl LabelStore {
    pub fn new(classifier: Box<dyn KnnClassifier>, config: &Config) -> Self {
        Self {
            classifier,
            num_classes: config.num_classes,
            max_examples_per_class: config.max_examples_per_class,
            feature_len: None,
            session_id: None,
        }
    }

    /// Tag exported datasets with the teaching session that produced them
    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn check_label(&self, label: ClassIndex) -> ClassifierResult<()> {
        if label.0 >= self.num_classes {
            return Err(ClassifierError::LabelOutOfRange {
                label,
                num_classes: self.num_classes,
            });
        }
        Ok(())
    }

    fn check_dimension(&self, vector: &FeatureVector) -> ClassifierResult<()> {
        match self.feature_len {
            Some(expected) if expected != vector.len() => Err(ClassifierError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Store `vector` under `label`. With a per-class cap configured, the
    /// oldest example of that class is evicted first.
    pub fn add_example(
        &mut self,
        vector: &FeatureVector,
        label: ClassIndex,
    ) -> ClassifierResult<()> {
        self.check_label(label)?;
        self.check_dimension(vector)?;

        if let Some(cap) = self.max_examples_per_class {
            let stored = self.example_count(label);
            for _ in cap.saturating_sub(1)..stored {
                if !self.classifier.evict_oldest(label) {
                    break;
                }
                debug!("Evicted oldest example of class {}", label);
            }
        }

        self.classifier.add_example(vector, label);
        self.feature_len = Some(vector.len());
        Ok(())
    }

    pub fn class_count(&self) -> usize {
        self.classifier.class_count()
    }

    pub fn example_count_per_class(&self) -> BTreeMap<ClassIndex, usize> {
        self.classifier.example_count_per_class()
    }

    pub fn example_count(&self, label: ClassIndex) -> usize {
        self.example_count_per_class().get(&label).copied().unwrap_or(0)
    }

    /// Predict a label; refuses to query the backend while it holds no examples
    pub async fn predict(&self, vector: &FeatureVector, k: usize) -> ClassifierResult<Prediction> {
        if k == 0 {
            return Err(ClassifierError::InvalidK);
        }
        if self.class_count() == 0 {
            return Err(ClassifierError::NoExamples);
        }
        self.check_dimension(vector)?;

        self.classifier.predict_class(vector, k).await
    }

    pub fn clear_class(&mut self, label: ClassIndex) -> ClassifierResult<()> {
        self.check_label(label)?;
        self.classifier.clear_class(label);
        if self.class_count() == 0 {
            self.feature_len = None;
        }
        info!("Cleared examples of class {}", label);
        Ok(())
    }

    pub fn clear_all(&mut self) {
        self.classifier.clear_all();
        self.feature_len = None;
        info!("Cleared all examples");
    }

    /// One display row per configured class
    pub fn class_info(&self, prediction: Option<&Prediction>) -> Vec<ClassInfo> {
        let counts = self.example_count_per_class();
        (0..self.num_classes)
            .map(ClassIndex)
            .map(|class| {
                let examples = counts.get(&class).copied().unwrap_or(0);
                let confidence = if examples > 0 {
                    prediction.map(|p| p.confidence(class).unwrap_or(0.0))
                } else {
                    None
                };
                ClassInfo {
                    class,
                    examples,
                    confidence,
                    emphasized: prediction.map_or(false, |p| p.label == class),
                }
            })
            .collect()
    }

    // ==========================================================================
    // Dataset export / import
    // ==========================================================================

    pub fn export_dataset(&self) -> Dataset {
        let examples: Vec<DatasetExample> = self
            .classifier
            .examples()
            .into_iter()
            .map(|(label, vector)| DatasetExample { label, vector })
            .collect();

        Dataset {
            session_id: self.session_id.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
            feature_len: self.feature_len.unwrap_or(0),
            examples,
        }
    }

    /// Add every example of `dataset`; validates all of them before adding any
    pub fn import_dataset(&mut self, dataset: &Dataset) -> ClassifierResult<usize> {
        for example in &dataset.examples {
            self.check_label(example.label)?;
            if example.vector.len() != dataset.feature_len {
                return Err(ClassifierError::Dataset(format!(
                    "example of class {} has {} values, dataset declares {}",
                    example.label,
                    example.vector.len(),
                    dataset.feature_len
                )));
            }
        }
        if !dataset.examples.is_empty() {
            if let Some(expected) = self.feature_len {
                if expected != dataset.feature_len {
                    return Err(ClassifierError::DimensionMismatch {
                        expected,
                        actual: dataset.feature_len,
                    });
                }
            }
        }

        for example in &dataset.examples {
            self.add_example(&example.vector, example.label)?;
        }
        Ok(dataset.examples.len())
    }

    pub fn save_dataset(&self, path: &Path) -> ClassifierResult<()> {
        let dataset = self.export_dataset();
        let contents = serde_json::to_string_pretty(&dataset)
            .map_err(|e| ClassifierError::Dataset(format!("Failed to serialize dataset: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| dataset_error("create", parent, e))?;
        }
        std::fs::write(path, contents)
            .map_err(|e| dataset_error("write", path, e))?;

        info!("Saved {} examples to {}", dataset.examples.len(), path.display());
        Ok(())
    }

    pub fn load_dataset(&mut self, path: &Path) -> ClassifierResult<usize> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| dataset_error("read", path, e))?;
        let dataset: Dataset = serde_json::from_str(&contents)
            .map_err(|e| dataset_error("parse", path, e))?;

        let added = self.import_dataset(&dataset)?;
        info!("Loaded {} examples from {}", added, path.display());
        Ok(added)
    }
}

fn dataset_error(action: &str, path: &Path, e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::Dataset(format!("Failed to {} {}: {}", action, path.display(), e))
}
