use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use url::Url;

use super::{SourceDetector, TargetStream};
use crate::manifest::ManifestSnapshot;

struct RepresentationEntry {
    container_mime: Option<String>,
    sample_mime: Option<String>,
    init_uri: String,
}

struct AdaptationEntry {
    is_audio: Option<bool>,
    representations: Vec<RepresentationEntry>,
}

#[derive(Default)]
struct ClassifierState {
    snapshot: Option<Arc<ManifestSnapshot>>,
    entries: Vec<AdaptationEntry>,
    cache: HashMap<String, bool>,
    generation: u64,
}

impl ClassifierState {
    fn replace(&mut self, snapshot: Option<ManifestSnapshot>) {
        self.entries = snapshot.as_ref().map(flatten).unwrap_or_default();
        self.snapshot = snapshot.map(Arc::new);
        self.cache.clear();
        self.generation += 1;
    }
}

fn flatten(snapshot: &ManifestSnapshot) -> Vec<AdaptationEntry> {
    snapshot
        .periods
        .iter()
        .flat_map(|period| period.adaptation_sets.iter())
        .map(|adaptation| AdaptationEntry {
            is_audio: adaptation.kind.is_audio(),
            representations: adaptation
                .representations
                .iter()
                .filter_map(|representation| {
                    Some(RepresentationEntry {
                        container_mime: representation.container_mime.clone(),
                        sample_mime: representation.sample_mime.clone(),
                        init_uri: representation.init_uri.as_ref()?.to_string(),
                    })
                })
                .collect(),
        })
        .collect()
}

/// Classifies resources by locating them in the current manifest.
///
/// A resource path is looked up among the initialization segment URIs of every
/// representation. Verdicts are cached per path until the manifest is replaced by a
/// different one. Without a manifest every path is classified as "not target".
pub struct ManifestClassifier {
    target: TargetStream,
    state: RwLock<ClassifierState>,
}

impl ManifestClassifier {
    pub fn new(target: TargetStream, snapshot: Option<ManifestSnapshot>) -> Self {
        let mut state = ClassifierState::default();
        if snapshot.is_some() {
            state.replace(snapshot);
        }

        Self {
            target,
            state: RwLock::new(state),
        }
    }

    pub fn manifest(&self) -> Option<Arc<ManifestSnapshot>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    /// Replaces the manifest. Returns `false` and keeps the cache when nothing changed.
    pub fn set_manifest(&self, snapshot: Option<ManifestSnapshot>) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.snapshot.as_deref() == snapshot.as_ref() {
            return false;
        }

        tracing::info!(
            periods = snapshot.as_ref().map(|s| s.periods.len()),
            "Manifest replaced, dropping cached classifications"
        );
        state.replace(snapshot);
        true
    }

    pub fn classify_path(&self, path: &str) -> bool {
        let (is_target, generation) = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(is_target) = state.cache.get(path) {
                return *is_target;
            }
            (self.scan(&state.entries, path), state.generation)
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // a verdict computed against a replaced manifest is dropped
        if state.generation == generation {
            state.cache.insert(path.to_string(), is_target);
        }
        is_target
    }

    fn scan(&self, entries: &[AdaptationEntry], path: &str) -> bool {
        if !self.target.is_segment_path(path) {
            return false;
        }

        for adaptation in entries {
            let mut matching = adaptation
                .representations
                .iter()
                .filter(|r| r.init_uri.contains(path))
                .peekable();
            if matching.peek().is_none() {
                continue;
            }

            if adaptation.is_audio == Some(false) {
                tracing::debug!(path, "Path matches a non audio adaptation set");
                return false;
            }
            if matching.any(|r| {
                self.target
                    .matches(r.container_mime.as_deref(), r.sample_mime.as_deref())
            }) {
                tracing::debug!(path, "Path detected as target stream");
                return true;
            }
            tracing::debug!(path, "Path matches a representation of another format");
        }
        false
    }
}

impl SourceDetector for ManifestClassifier {
    fn is_target(&self, uri: &Url) -> bool {
        if uri.cannot_be_a_base() || uri.path().is_empty() {
            return false;
        }
        self.classify_path(uri.path())
    }
}
