use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a presentation, stable within one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresentationId(pub i32);

impl PresentationId {
    /// Skips engine processing and lets the decoder pick based on device settings.
    pub const DEVICE_DEFAULT: Self = Self(-1);

    pub fn is_device_default(self) -> bool {
        self == Self::DEVICE_DEFAULT
    }
}

impl Default for PresentationId {
    fn default() -> Self {
        Self::DEVICE_DEFAULT
    }
}

impl From<i32> for PresentationId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl fmt::Display for PresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A selectable decode variant reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub id: PresentationId,
    pub label: String,
    pub language: String,
}

impl Presentation {
    pub fn new(
        id: impl Into<PresentationId>,
        label: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            language: language.into(),
        }
    }

    /// The synthetic entry standing for "let the decoder decide".
    pub fn device_default() -> Self {
        Self::new(PresentationId::DEVICE_DEFAULT, "TV Default", "unknown")
    }
}

/// Element of the observable presentation list of the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationEntry {
    pub presentation: Presentation,
    pub is_active: bool,
}

/// Builds the observable list: the device default entry first, then the engine's list.
///
/// Exactly one entry is active. When `active` is not part of `presentations` the device
/// default entry is the active one. An empty engine list yields an empty result.
pub(crate) fn build_entries(
    presentations: &[Presentation],
    active: PresentationId,
) -> Vec<PresentationEntry> {
    if presentations.is_empty() {
        return Vec::new();
    }

    let mut entries: Vec<PresentationEntry> = Vec::with_capacity(presentations.len() + 1);
    entries.push(PresentationEntry {
        presentation: Presentation::device_default(),
        is_active: false,
    });
    for presentation in presentations {
        if presentation.id.is_device_default()
            || entries.iter().any(|e| e.presentation.id == presentation.id)
        {
            tracing::warn!(
                presentation_id = %presentation.id,
                "Ignoring duplicated presentation id reported by engine"
            );
            continue;
        }
        entries.push(PresentationEntry {
            presentation: presentation.clone(),
            is_active: presentation.id == active,
        });
    }

    if !entries.iter().any(|e| e.is_active) {
        entries[0].is_active = true;
    }
    entries
}
