// k-nearest-neighbour capability and the default in-memory backend

use crate::models::classifier::{
    ClassIndex, ClassifierError, ClassifierResult, FeatureVector, Prediction,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};

/// Nearest-neighbour classifier capability.
///
/// Distance and confidence semantics belong to the implementation; callers only
/// rely on confidences over classes with examples summing to 1.
#[async_trait]
pub trait KnnClassifier: Send + Sync {
    /// Store `vector` under `label`
    fn add_example(&mut self, vector: &FeatureVector, label: ClassIndex);

    /// Number of distinct labels with at least one example
    fn class_count(&self) -> usize;

    /// Stored examples per label (labels without examples are absent)
    fn example_count_per_class(&self) -> BTreeMap<ClassIndex, usize>;

    /// Label of the `k` nearest examples plus a confidence per stored label
    async fn predict_class(&self, vector: &FeatureVector, k: usize) -> ClassifierResult<Prediction>;

    /// Drop every example of `label`
    fn clear_class(&mut self, label: ClassIndex);

    fn clear_all(&mut self);

    /// Remove the oldest example of `label`; false if it has none
    fn evict_oldest(&mut self, label: ClassIndex) -> bool;

    /// All stored examples in insertion order
    fn examples(&self) -> Vec<(ClassIndex, FeatureVector)>;
}

struct StoredExample {
    vector: FeatureVector,
    norm: f32,
}

/// Brute-force cosine-similarity kNN.
///
/// The `k` most similar examples vote; a class's confidence is its share of the
/// votes. Vote ties go to the class owning the most similar neighbour.
#[derive(Default)]
pub struct InMemoryKnn {
    classes: BTreeMap<ClassIndex, VecDeque<StoredExample>>,
    // Insertion order across classes, for export
    order: VecDeque<(ClassIndex, u64)>,
    next_id: u64,
    ids: BTreeMap<ClassIndex, VecDeque<u64>>,
}

impl InMemoryKnn {
    pub fn new() -> Self {
        Self::default()
    }

    fn norm(values: &[f32]) -> f32 {
        values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
        if a_norm == 0.0 || b_norm == 0.0 {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let similarity = dot / (a_norm * b_norm);
        // A NaN coordinate makes the example infinitely far
        if similarity.is_nan() {
            f32::NEG_INFINITY
        } else {
            similarity
        }
    }
}

#[async_trait]
impl KnnClassifier for InMemoryKnn {
    fn add_example(&mut self, vector: &FeatureVector, label: ClassIndex) {
        let norm = Self::norm(vector.as_slice());
        self.classes.entry(label).or_default().push_back(StoredExample {
            vector: vector.clone(),
            norm,
        });

        let id = self.next_id;
        self.next_id += 1;
        self.ids.entry(label).or_default().push_back(id);
        self.order.push_back((label, id));
    }

    fn class_count(&self) -> usize {
        self.classes.values().filter(|examples| !examples.is_empty()).count()
    }

    fn example_count_per_class(&self) -> BTreeMap<ClassIndex, usize> {
        self.classes
            .iter()
            .filter(|(_, examples)| !examples.is_empty())
            .map(|(label, examples)| (*label, examples.len()))
            .collect()
    }

    async fn predict_class(
        &self,
        vector: &FeatureVector,
        k: usize,
    ) -> ClassifierResult<Prediction> {
        if k == 0 {
            return Err(ClassifierError::InvalidK);
        }

        let query = vector.as_slice();
        let query_norm = Self::norm(query);

        let mut scored: Vec<(f32, ClassIndex)> = self
            .classes
            .iter()
            .flat_map(|(label, examples)| {
                examples.iter().map(move |example| {
                    let similarity =
                        Self::cosine(query, query_norm, example.vector.as_slice(), example.norm);
                    (similarity, *label)
                })
            })
            .collect();

        if scored.is_empty() {
            return Err(ClassifierError::NoExamples);
        }

        // Most similar first; the sort is stable so equal similarities keep class order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        let k = k.min(scored.len());
        let neighbours = &scored[..k];

        let mut votes: BTreeMap<ClassIndex, usize> = BTreeMap::new();
        for (_, label) in neighbours {
            *votes.entry(*label).or_insert(0) += 1;
        }

        // Walk neighbours nearest-first so a vote tie keeps the nearer class
        let mut label = neighbours[0].1;
        for (_, candidate) in neighbours {
            if votes[candidate] > votes[&label] {
                label = *candidate;
            }
        }

        let confidences = self
            .example_count_per_class()
            .keys()
            .map(|class| {
                let count = votes.get(class).copied().unwrap_or(0);
                (*class, count as f32 / k as f32)
            })
            .collect();

        Ok(Prediction { label, confidences })
    }

    fn clear_class(&mut self, label: ClassIndex) {
        self.classes.remove(&label);
        self.ids.remove(&label);
        self.order.retain(|(class, _)| *class != label);
    }

    fn clear_all(&mut self) {
        self.classes.clear();
        self.ids.clear();
        self.order.clear();
    }

    fn evict_oldest(&mut self, label: ClassIndex) -> bool {
        let Some(examples) = self.classes.get_mut(&label) else {
            return false;
        };
        if examples.pop_front().is_none() {
            return false;
        }
        if let Some(id) = self.ids.get_mut(&label).and_then(|ids| ids.pop_front()) {
            self.order.retain(|entry| *entry != (label, id));
        }
        true
    }

    fn examples(&self) -> Vec<(ClassIndex, FeatureVector)> {
        let mut positions: BTreeMap<ClassIndex, usize> = BTreeMap::new();
        self.order
            .iter()
            .filter_map(|(label, _)| {
                let position = positions.entry(*label).or_insert(0);
                let example = self.classes.get(label)?.get(*position)?;
                *position += 1;
                Some((*label, example.vector.clone()))
            })
            .collect()
    }
}

/// The default classifier backend
pub fn create_knn_classifier() -> Box<dyn KnnClassifier> {
    Box::new(InMemoryKnn::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[f32]) -> FeatureVector {
        FeatureVector::new(values.to_vec())
    }

    #[test]
    fn test_counts_per_class() {
        let mut knn = InMemoryKnn::new();
        assert_eq!(knn.class_count(), 0);

        for _ in 0..4 {
            knn.add_example(&vector(&[1.0, 0.0]), ClassIndex(2));
        }

        assert_eq!(knn.class_count(), 1);
        assert_eq!(knn.example_count_per_class().get(&ClassIndex(2)), Some(&4));
        assert_eq!(knn.example_count_per_class().get(&ClassIndex(0)), None);
    }

    #[tokio::test]
    async fn test_predict_nearest_class() {
        let mut knn = InMemoryKnn::new();
        knn.add_example(&vector(&[1.0, 0.0]), ClassIndex(0));
        knn.add_example(&vector(&[0.9, 0.1]), ClassIndex(0));
        knn.add_example(&vector(&[0.0, 1.0]), ClassIndex(1));

        let prediction = knn.predict_class(&vector(&[1.0, 0.05]), 3).await.unwrap();
        assert_eq!(prediction.label, ClassIndex(0));
        assert!((prediction.confidence(ClassIndex(0)).unwrap() - 2.0 / 3.0).abs() < 1e-6);
        assert!((prediction.confidence(ClassIndex(1)).unwrap() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_confidences_sum_to_one() {
        let mut knn = InMemoryKnn::new();
        for i in 0..6 {
            let angle = i as f32 * 0.3;
            knn.add_example(&vector(&[angle.cos(), angle.sin()]), ClassIndex(i % 3));
        }

        for k in 1..=8 {
            let prediction = knn.predict_class(&vector(&[0.7, 0.7]), k).await.unwrap();
            let sum: f32 = prediction.confidences.values().sum();
            assert!((sum - 1.0).abs() < 1e-5, "k={} sum={}", k, sum);
            assert_eq!(prediction.confidences.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_vote_tie_goes_to_nearest() {
        let mut knn = InMemoryKnn::new();
        knn.add_example(&vector(&[1.0, 0.0]), ClassIndex(0));
        knn.add_example(&vector(&[0.0, 1.0]), ClassIndex(1));

        let prediction = knn.predict_class(&vector(&[0.2, 1.0]), 2).await.unwrap();
        assert_eq!(prediction.label, ClassIndex(1));
        assert_eq!(prediction.confidence(ClassIndex(0)), Some(0.5));
    }

    #[tokio::test]
    async fn test_nan_features_never_win_or_panic() {
        let mut knn = InMemoryKnn::new();
        knn.add_example(&vector(&[f32::NAN, 0.0]), ClassIndex(1));
        knn.add_example(&vector(&[1.0, 0.0]), ClassIndex(0));
        knn.add_example(&vector(&[0.9, 0.2]), ClassIndex(0));

        let prediction = knn.predict_class(&vector(&[1.0, 0.1]), 1).await.unwrap();
        assert_eq!(prediction.label, ClassIndex(0));

        let prediction = knn.predict_class(&vector(&[f32::NAN, 1.0]), 3).await.unwrap();
        let sum: f32 = prediction.confidences.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_predict_rejects_zero_k_and_empty_store() {
        let mut knn = InMemoryKnn::new();
        assert!(matches!(
            knn.predict_class(&vector(&[1.0]), 3).await,
            Err(ClassifierError::NoExamples)
        ));

        knn.add_example(&vector(&[1.0]), ClassIndex(0));
        assert!(matches!(
            knn.predict_class(&vector(&[1.0]), 0).await,
            Err(ClassifierError::InvalidK)
        ));
    }

    #[test]
    fn test_evict_and_export_keep_insertion_order() {
        let mut knn = InMemoryKnn::new();
        knn.add_example(&vector(&[1.0]), ClassIndex(0));
        knn.add_example(&vector(&[2.0]), ClassIndex(1));
        knn.add_example(&vector(&[3.0]), ClassIndex(0));

        assert!(knn.evict_oldest(ClassIndex(0)));
        let exported = knn.examples();
        assert_eq!(
            exported,
            vec![(ClassIndex(1), vector(&[2.0])), (ClassIndex(0), vector(&[3.0]))]
        );

        assert!(!knn.evict_oldest(ClassIndex(2)));
    }

    #[test]
    fn test_clear_class_and_all() {
        let mut knn = InMemoryKnn::new();
        knn.add_example(&vector(&[1.0]), ClassIndex(0));
        knn.add_example(&vector(&[2.0]), ClassIndex(1));

        knn.clear_class(ClassIndex(0));
        assert_eq!(knn.class_count(), 1);
        assert_eq!(knn.examples().len(), 1);

        knn.clear_all();
        assert_eq!(knn.class_count(), 0);
        assert!(knn.examples().is_empty());
    }
}
