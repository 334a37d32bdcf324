//! A flattened view of a DASH manifest: what the classifiers need to know about every
//! representation and nothing more.

mod base_url;
mod preselection;
mod template;

use dash_mpd::{AdaptationSet, Period, Representation, MPD};
use serde::Serialize;
use url::Url;

pub use self::preselection::{
    DescriptorLayout, LabelLayout, PreselectionLayout, DEFAULT_SELECTION_PRIORITY,
};
use self::template::TemplateValues;
use crate::{classify::TrackKind, util::http::HttpClient, AlpsResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManifestSnapshot {
    pub periods: Vec<PeriodLayout>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodLayout {
    pub id: Option<String>,
    pub adaptation_sets: Vec<AdaptationLayout>,
    pub preselections: Vec<PreselectionLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptationLayout {
    pub kind: TrackKind,
    pub representations: Vec<RepresentationLayout>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepresentationLayout {
    pub id: Option<String>,
    pub container_mime: Option<String>,
    pub sample_mime: Option<String>,
    pub init_uri: Option<Url>,
}

impl ManifestSnapshot {
    pub fn parse(text: &str, base: &Url) -> AlpsResult<Self> {
        let mpd = dash_mpd::parse(text)?;
        Self::from_mpd(&mpd, base)
    }

    pub fn from_mpd(mpd: &MPD, base: &Url) -> AlpsResult<Self> {
        let mut base = base.clone();
        if let Some(element) = mpd.base_url.first() {
            base = base_url::resolve(&base, &element.base)?;
        }

        let periods = mpd
            .periods
            .iter()
            .map(|period| PeriodLayout::from_period(period, &base))
            .collect::<AlpsResult<_>>()?;
        Ok(Self { periods })
    }

    /// Every representation of every period, with the adaptation set it belongs to.
    pub fn representations(
        &self,
    ) -> impl Iterator<Item = (&AdaptationLayout, &RepresentationLayout)> {
        self.periods
            .iter()
            .flat_map(|period| period.adaptation_sets.iter())
            .flat_map(|adaptation| {
                adaptation
                    .representations
                    .iter()
                    .map(move |representation| (adaptation, representation))
            })
    }
}

impl PeriodLayout {
    fn from_period(period: &Period, base: &Url) -> AlpsResult<Self> {
        let base = match period.BaseURL.first() {
            Some(element) => base_url::resolve(base, &element.base)?,
            None => base.clone(),
        };

        let adaptation_sets = period
            .adaptations
            .iter()
            .map(|adaptation| AdaptationLayout::from_adaptation(period, adaptation, &base))
            .collect::<AlpsResult<_>>()?;
        let preselections = period
            .pre_selections
            .iter()
            .map(PreselectionLayout::from)
            .collect();
        Ok(Self {
            id: period.id.clone(),
            adaptation_sets,
            preselections,
        })
    }
}

impl AdaptationLayout {
    fn from_adaptation(
        period: &Period,
        adaptation: &AdaptationSet,
        base: &Url,
    ) -> AlpsResult<Self> {
        let base = match adaptation.BaseURL.first() {
            Some(element) => base_url::resolve(base, &element.base)?,
            None => base.clone(),
        };

        let kind = adaptation
            .contentType
            .as_deref()
            .or(adaptation.mimeType.as_deref())
            .or_else(|| {
                adaptation
                    .representations
                    .iter()
                    .find_map(|r| r.contentType.as_deref().or(r.mimeType.as_deref()))
            });
        let kind = TrackKind::from_mime_type(kind);

        let representations = adaptation
            .representations
            .iter()
            .map(|representation| {
                RepresentationLayout::from_representation(period, adaptation, representation, &base)
            })
            .collect::<AlpsResult<_>>()?;
        Ok(Self {
            kind,
            representations,
        })
    }
}

impl RepresentationLayout {
    fn from_representation(
        period: &Period,
        adaptation: &AdaptationSet,
        representation: &Representation,
        base: &Url,
    ) -> AlpsResult<Self> {
        let base = match representation.BaseURL.first() {
            Some(element) => base_url::resolve(base, &element.base)?,
            None => base.clone(),
        };

        let container_mime = representation
            .mimeType
            .clone()
            .or_else(|| adaptation.mimeType.clone());
        let sample_mime = representation
            .codecs
            .as_deref()
            .or(adaptation.codecs.as_deref())
            .and_then(sample_mime_from_codecs)
            .map(str::to_string);

        let values = TemplateValues {
            representation_id: representation.id.as_deref(),
            bandwidth: representation.bandwidth,
        };
        let template_init = representation
            .SegmentTemplate
            .as_ref()
            .and_then(|t| t.initialization.as_deref())
            .or_else(|| {
                adaptation
                    .SegmentTemplate
                    .as_ref()
                    .and_then(|t| t.initialization.as_deref())
            })
            .or_else(|| {
                period
                    .SegmentTemplate
                    .as_ref()
                    .and_then(|t| t.initialization.as_deref())
            });

        let init_uri = if let Some(initialization) = template_init {
            Some(base_url::resolve(&base, &values.resolve(initialization))?)
        } else if let Some(segment_base) = representation
            .SegmentBase
            .as_ref()
            .or(adaptation.SegmentBase.as_ref())
        {
            match segment_base
                .Initialization
                .as_ref()
                .and_then(|i| i.sourceURL.as_deref())
            {
                Some(source_url) => Some(base_url::resolve(&base, source_url)?),
                // the initialization range lives in the media resource itself
                None => Some(base),
            }
        } else {
            None
        };

        Ok(Self {
            id: representation.id.clone(),
            container_mime,
            sample_mime,
            init_uri,
        })
    }
}

/// Maps the first entry of an RFC 6381 `codecs` value to a sample mime type.
pub fn sample_mime_from_codecs(codecs: &str) -> Option<&'static str> {
    let codec = codecs.split(',').next()?.trim().to_ascii_lowercase();
    let family = codec.split('.').next().unwrap_or_default();
    let mime = match family {
        "ac-4" => "audio/ac4",
        "ec-3" => "audio/eac3",
        "ac-3" => "audio/ac3",
        "mp4a" => "audio/mp4a-latm",
        "avc1" | "avc3" => "video/avc",
        "hvc1" | "hev1" => "video/hevc",
        _ => return None,
    };
    Some(mime)
}

pub async fn fetch_manifest(client: &HttpClient, url: Url) -> AlpsResult<ManifestSnapshot> {
    let response = client
        .get(url.clone())
        .header("Accept", "application/dash+xml,video/vnd.mpeg.dash.mpd")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(crate::AlpsError::HttpError(response.status()));
    }

    // relative references resolve against the final location after redirects
    let base = response.url().clone();
    let text = response.text().await?;
    tracing::debug!(%url, len = text.len(), "Fetched manifest");
    ManifestSnapshot::parse(&text, &base)
}
