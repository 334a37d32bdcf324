use std::path::{Path, PathBuf};

use alps::{EngineHandle, PresentationId, PresentationSessionManager};
use anyhow::Context;
use clap::Parser;
use clap_handler::handler;

use super::ConfigOptions;

#[derive(Parser, Clone, Default, Debug)]
#[clap(name = "process", short_flag = 'P')]
pub struct ProcessCommand {
    #[clap(flatten)]
    pub options: ConfigOptions,

    /// Directory holding one `init` segment and `*.m4s` media segments
    #[clap(short, long)]
    pub input: PathBuf,

    /// Output directory. Its previous content is removed.
    #[clap(short, long)]
    pub output: PathBuf,

    /// Presentation to activate after the init segment is processed
    #[clap(short, long = "pres")]
    pub presentation: Option<i32>,
}

/// Returns the init segment followed by the media segments in name order.
async fn collect_segments(input: &Path) -> anyhow::Result<(PathBuf, Vec<PathBuf>)> {
    let mut dir = tokio::fs::read_dir(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;

    let mut init = None;
    let mut media = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_init = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.starts_with("init"));
        if is_init {
            init = Some(path);
        } else if path.extension().is_some_and(|ext| ext == "m4s") {
            media.push(path);
        }
    }
    media.sort();

    let init = init.with_context(|| format!("no init segment in {}", input.display()))?;
    Ok((init, media))
}

async fn process_file(handle: &EngineHandle, input: &Path, output: &Path) -> anyhow::Result<()> {
    let mut data = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    // a failed segment keeps its original bytes
    if let Err(e) = handle.process_segment(&mut data) {
        tracing::warn!("Failed to process {}: {e}", input.display());
    }

    let name = input
        .file_name()
        .with_context(|| format!("invalid input {}", input.display()))?;
    tokio::fs::write(output.join(name), &data).await?;
    Ok(())
}

fn log_presentations(sessions: &PresentationSessionManager) {
    for entry in sessions.presentations() {
        tracing::info!(
            active = entry.is_active,
            "Presentation {}: {} ({})",
            entry.presentation.id,
            entry.presentation.label,
            entry.presentation.language,
        );
    }
}

#[cfg(feature = "native")]
fn sessions(config: &alps::AlpsConfig) -> anyhow::Result<PresentationSessionManager> {
    use alps::engine::native::{self, NativeEngine};

    tracing::info!("Using presentation engine {}", native::version());
    Ok(PresentationSessionManager::new(
        || NativeEngine::new().map(|engine| Box::new(engine) as Box<dyn alps::Engine>),
        &config.session,
    ))
}

#[cfg(not(feature = "native"))]
fn sessions(_config: &alps::AlpsConfig) -> anyhow::Result<PresentationSessionManager> {
    anyhow::bail!("alps was built without the native engine, rebuild it with `--features native`")
}

#[handler(ProcessCommand)]
async fn handle_process(this: ProcessCommand) -> anyhow::Result<()> {
    let config = this.options.load()?;
    let (init, media) = collect_segments(&this.input).await?;

    let sessions = sessions(&config)?;
    let handle = sessions
        .handle(0)
        .context("failed to create the presentation engine")?;
    sessions.set_current_period(0);

    if this.output.exists() {
        tokio::fs::remove_dir_all(&this.output).await?;
    }
    tokio::fs::create_dir_all(&this.output).await?;

    process_file(&handle, &init, &this.output).await?;
    log_presentations(&sessions);

    if let Some(id) = this.presentation.map(PresentationId) {
        let report = sessions.set_active_presentation(id);
        if !report.is_complete() {
            anyhow::bail!("presentation {id} could not be activated");
        }
        tracing::info!("Presentation {id} activated");
    }

    for segment in &media {
        process_file(&handle, segment, &this.output).await?;
    }
    tracing::info!(
        segments = media.len() + 1,
        "Processed into {}",
        this.output.display()
    );
    sessions.release_all();

    Ok(())
}
