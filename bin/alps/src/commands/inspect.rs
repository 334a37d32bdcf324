use std::path::Path;

use alps::{
    manifest::{fetch_manifest, PreselectionLayout},
    AlpsConfig, HttpClient, ManifestClassifier, ManifestSnapshot, SourceDetector, TrackKind,
};
use anyhow::Context;
use clap::Parser;
use clap_handler::handler;
use serde::Serialize;
use url::Url;

use super::ConfigOptions;

#[derive(Parser, Clone, Default)]
#[clap(name = "inspect", short_flag = 'S')]
pub struct InspectCommand {
    #[clap(flatten)]
    pub options: ConfigOptions,

    /// Print the result as JSON
    #[clap(long)]
    pub json: bool,

    /// Base URL used to resolve relative references of a local manifest
    #[clap(long)]
    pub base: Option<Url>,

    /// Manifest URL or local file
    pub manifest: String,
}

#[derive(Serialize)]
struct RepresentationRow<'a> {
    period: usize,
    period_id: Option<&'a str>,
    kind: TrackKind,
    id: Option<&'a str>,
    container_mime: Option<&'a str>,
    sample_mime: Option<&'a str>,
    init_uri: Option<&'a Url>,
    target: bool,
}

#[derive(Serialize)]
struct PreselectionRow<'a> {
    period: usize,
    period_id: Option<&'a str>,
    #[serde(flatten)]
    preselection: &'a PreselectionLayout,
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    representations: Vec<RepresentationRow<'a>>,
    preselections: Vec<PreselectionRow<'a>>,
}

async fn load_manifest(
    config: &AlpsConfig,
    manifest: &str,
    base: Option<Url>,
) -> anyhow::Result<ManifestSnapshot> {
    if let Ok(url) = Url::parse(manifest) {
        if matches!(url.scheme(), "http" | "https") {
            let client = HttpClient::from_config(&config.http)?;
            return Ok(fetch_manifest(&client, url).await?);
        }
    }

    let path = Path::new(manifest);
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {manifest}"))?;
    let base = match base {
        Some(base) => base,
        None => {
            let path = path.canonicalize()?;
            Url::from_file_path(&path)
                .map_err(|_| anyhow::anyhow!("invalid manifest path {}", path.display()))?
        }
    };
    Ok(ManifestSnapshot::parse(&text, &base)?)
}

#[handler(InspectCommand)]
async fn handle_inspect(this: InspectCommand) -> anyhow::Result<()> {
    let config = this.options.load()?;
    let snapshot = load_manifest(&config, &this.manifest, this.base).await?;
    let classifier = ManifestClassifier::new(config.target.clone().into(), Some(snapshot.clone()));

    let mut rows = Vec::new();
    let mut preselections = Vec::new();
    for (index, period) in snapshot.periods.iter().enumerate() {
        preselections.extend(period.preselections.iter().map(|preselection| PreselectionRow {
            period: index,
            period_id: period.id.as_deref(),
            preselection,
        }));
        for adaptation in &period.adaptation_sets {
            for representation in &adaptation.representations {
                let target = representation
                    .init_uri
                    .as_ref()
                    .is_some_and(|uri| classifier.is_target(uri));
                rows.push(RepresentationRow {
                    period: index,
                    period_id: period.id.as_deref(),
                    kind: adaptation.kind,
                    id: representation.id.as_deref(),
                    container_mime: representation.container_mime.as_deref(),
                    sample_mime: representation.sample_mime.as_deref(),
                    init_uri: representation.init_uri.as_ref(),
                    target,
                });
            }
        }
    }

    if this.json {
        let output = InspectOutput {
            representations: rows,
            preselections,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for row in &rows {
        println!(
            "{marker} period {period} ({period_id}) {kind:?} {id}: {container} / {sample}",
            marker = if row.target { "*" } else { " " },
            period = row.period,
            period_id = row.period_id.unwrap_or("-"),
            kind = row.kind,
            id = row.id.unwrap_or("-"),
            container = row.container_mime.unwrap_or("?"),
            sample = row.sample_mime.unwrap_or("?"),
        );
        if let Some(init_uri) = row.init_uri {
            println!("    {init_uri}");
        }
    }
    for row in &preselections {
        let preselection = row.preselection;
        let label = preselection
            .labels
            .first()
            .map(|label| label.text.as_str())
            .unwrap_or("-");
        let tag = preselection
            .tag
            .map(|tag| tag.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  period {period} ({period_id}) preselection {id}: tag {tag}, {lang}, \"{label}\", priority {priority}",
            period = row.period,
            period_id = row.period_id.unwrap_or("-"),
            id = preselection.id.as_deref().unwrap_or("-"),
            lang = preselection.lang.as_deref().unwrap_or("und"),
            priority = preselection.selection_priority,
        );
        for role in &preselection.roles {
            println!(
                "    role {}: {}",
                role.scheme_id_uri,
                role.value.as_deref().unwrap_or("-")
            );
        }
    }

    let targets = rows.iter().filter(|row| row.target).count();
    eprintln!("{targets} of {} representations are target streams", rows.len());

    Ok(())
}
