//! Gallery: classifier trained over every stored enrollment
//!
//! The gallery is rebuilt wholesale whenever the stored identity set
//! changes. Labels are dense indices assigned in record order at build time;
//! they are not stable across rebuilds and only the identity name leaves
//! this module.

use tracing::{error, info, warn};

use crate::classifier::{ClassifierError, FaceClassifier, Prediction};
use crate::enrollment::StoredRecord;
use crate::lbph::LbphRecognizer;
use crate::sample::{decode_samples, FaceSample};

/// Trained classifier plus label -> identity mapping
#[derive(Debug, Clone)]
pub struct Gallery<C = LbphRecognizer> {
    classifier: Option<C>,
    names: Vec<String>,
    sample_count: usize,
    skipped: Vec<String>,
    training_error: Option<ClassifierError>,
}

impl<C> Default for Gallery<C> {
    fn default() -> Self {
        Self {
            classifier: None,
            names: Vec::new(),
            sample_count: 0,
            skipped: Vec::new(),
            training_error: None,
        }
    }
}

impl<C: FaceClassifier> Gallery<C> {
    /// Gallery with no identities; every lookup is "no identity"
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from every stored record, skipping records that cannot be decoded
    pub fn rebuild(records: &[StoredRecord]) -> Self {
        let mut gallery = Self::default();
        let mut samples = Vec::new();
        let mut labels = Vec::new();

        for record in records {
            let patches = match decode_samples(&record.blob) {
                Ok(patches) => patches,
                Err(e) => {
                    warn!("Skipping driver '{}': {}", record.identity, e);
                    gallery.skipped.push(record.identity.clone());
                    continue;
                }
            };

            let normalized: Vec<FaceSample> =
                patches.iter().filter_map(FaceSample::normalize).collect();
            if normalized.is_empty() {
                warn!("Skipping driver '{}': no usable face samples", record.identity);
                gallery.skipped.push(record.identity.clone());
                continue;
            }

            let label = gallery.names.len();
            labels.extend(std::iter::repeat(label).take(normalized.len()));
            samples.extend(normalized);
            gallery.names.push(record.identity.clone());
        }

        if samples.is_empty() {
            info!("No drivers enrolled yet; gallery is empty");
            gallery.names.clear();
            return gallery;
        }

        match C::train(&samples, &labels) {
            Ok(classifier) => {
                gallery.classifier = Some(classifier);
                gallery.sample_count = samples.len();
                info!(
                    "Loaded {} driver(s) with {} face samples",
                    gallery.names.len(),
                    samples.len()
                );
            }
            Err(e) => {
                error!("Gallery training failed: {}", e);
                gallery.names.clear();
                gallery.training_error = Some(e);
            }
        }
        gallery
    }

    /// True when no classifier is trained; matching must short-circuit
    pub fn is_empty(&self) -> bool {
        self.classifier.is_none()
    }

    /// Identity names, indexed by label
    pub fn identities(&self) -> &[String] {
        &self.names
    }

    pub fn name_of(&self, label: usize) -> Option<&str> {
        self.names.get(label).map(String::as_str)
    }

    /// Identities dropped during the last rebuild
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Why the last rebuild left the gallery untrained despite having samples
    pub fn training_error(&self) -> Option<&ClassifierError> {
        self.training_error.as_ref()
    }

    /// Query the classifier; `None` for an empty gallery (classifier untouched)
    pub fn predict(&self, sample: &FaceSample) -> Option<Result<Prediction, ClassifierError>> {
        self.classifier.as_ref().map(|c| c.predict(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::encode_samples;
    use crate::testutil::{noise, CountingClassifier};

    fn record(identity: &str, seeds: &[u64]) -> StoredRecord {
        let samples: Vec<_> = seeds
            .iter()
            .map(|&s| FaceSample::normalize(&noise(s, 120, 120)).unwrap())
            .collect();
        StoredRecord::new(identity, encode_samples(&samples).unwrap())
    }

    #[test]
    fn test_empty_records_skip_training() {
        let gallery: Gallery<CountingClassifier> = Gallery::rebuild(&[]);
        assert!(gallery.is_empty());
        assert_eq!(CountingClassifier::trains(), 0);
        let probe = FaceSample::normalize(&noise(1, 50, 50)).unwrap();
        assert!(gallery.predict(&probe).is_none());
        assert_eq!(CountingClassifier::predicts(), 0);
    }

    #[test]
    fn test_dense_labels_in_record_order() {
        let gallery: Gallery = Gallery::rebuild(&[record("ana", &[1, 2]), record("ben", &[3])]);
        assert_eq!(gallery.identities(), ["ana", "ben"]);
        assert_eq!(gallery.sample_count(), 3);
        assert_eq!(gallery.name_of(1), Some("ben"));
        assert_eq!(gallery.name_of(2), None);
    }

    #[test]
    fn test_corrupt_record_skipped() {
        let records = vec![
            record("ana", &[1]),
            StoredRecord::new("broken", b"\xff\xff\xff".to_vec()),
            record("cy", &[5]),
        ];
        let gallery: Gallery = Gallery::rebuild(&records);
        assert!(!gallery.is_empty());
        assert_eq!(gallery.identities(), ["ana", "cy"]);
        assert_eq!(gallery.skipped(), ["broken"]);
    }

    #[test]
    fn test_only_corrupt_records_leave_gallery_empty() {
        let gallery: Gallery<CountingClassifier> =
            Gallery::rebuild(&[StoredRecord::new("broken", vec![9, 9, 9])]);
        assert!(gallery.is_empty());
        assert!(gallery.identities().is_empty());
        assert_eq!(CountingClassifier::trains(), 0);
    }
}
