use dash_mpd::{Label, Preselection};
use serde::Serialize;

/// Priority of a preselection without `@selectionPriority`.
pub const DEFAULT_SELECTION_PRIORITY: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelLayout {
    pub lang: Option<String>,
    pub text: String,
}

impl From<&Label> for LabelLayout {
    fn from(label: &Label) -> Self {
        Self {
            lang: label.lang.clone(),
            text: label.content.trim().to_string(),
        }
    }
}

/// A `schemeIdUri`/`value` pair, as carried by `Role` and the property elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorLayout {
    pub scheme_id_uri: String,
    pub value: Option<String>,
}

impl DescriptorLayout {
    fn new(scheme_id_uri: &str, value: Option<&String>) -> Self {
        Self {
            scheme_id_uri: scheme_id_uri.to_string(),
            value: value.cloned(),
        }
    }
}

/// One `<Preselection>` of a period: a presentation of a multi-presentation stream as the
/// manifest advertises it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreselectionLayout {
    pub id: Option<String>,
    pub lang: Option<String>,
    /// Presentation tag, `None` when `@tag` is not a number.
    pub tag: Option<i32>,
    pub selection_priority: u64,
    pub codecs: Option<String>,
    /// Ids of the contained content components, the main component first.
    pub components: Vec<String>,
    pub labels: Vec<LabelLayout>,
    pub group_labels: Vec<LabelLayout>,
    pub roles: Vec<DescriptorLayout>,
    pub audio_channel_configurations: Vec<DescriptorLayout>,
    pub essential_properties: Vec<DescriptorLayout>,
    pub supplemental_properties: Vec<DescriptorLayout>,
}

impl From<&Preselection> for PreselectionLayout {
    fn from(preselection: &Preselection) -> Self {
        let tag: Option<i32> = preselection.tag.trim().parse().ok();
        if tag.is_none() {
            tracing::debug!(
                id = preselection.id.as_deref(),
                tag = %preselection.tag,
                "Preselection tag is not a presentation number"
            );
        }

        Self {
            id: preselection.id.clone(),
            lang: preselection.lang.clone(),
            tag,
            selection_priority: preselection
                .selectionPriority
                .unwrap_or(DEFAULT_SELECTION_PRIORITY),
            codecs: Some(preselection.codecs.trim())
                .filter(|codecs| !codecs.is_empty())
                .map(str::to_string),
            components: preselection
                .preselectionComponents
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            labels: preselection.Label.iter().map(LabelLayout::from).collect(),
            group_labels: preselection
                .group_label
                .iter()
                .map(LabelLayout::from)
                .collect(),
            roles: preselection
                .roles
                .iter()
                .map(|r| DescriptorLayout::new(&r.schemeIdUri, r.value.as_ref()))
                .collect(),
            audio_channel_configurations: preselection
                .AudioChannelConfiguration
                .iter()
                .map(|c| DescriptorLayout::new(&c.schemeIdUri, c.value.as_ref()))
                .collect(),
            essential_properties: preselection
                .essential_property
                .iter()
                .map(|p| DescriptorLayout::new(&p.schemeIdUri, p.value.as_ref()))
                .collect(),
            supplemental_properties: preselection
                .supplemental_property
                .iter()
                .map(|p| DescriptorLayout::new(&p.schemeIdUri, p.value.as_ref()))
                .collect(),
        }
    }
}
