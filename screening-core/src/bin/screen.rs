//! Sanctions screening command line
//!
//! ```text
//! sanctions-screen <roster.csv|xlsx> [reference-list.csv]
//! ```
//!
//! Without a list path the current list is downloaded first. Settings come
//! from the TOML file named by `SCREENING_CONFIG`, with `SCREENING_*`
//! environment overrides on top.

use anyhow::{bail, Context};
use screening_core::{
    spawn_download, spawn_import, spawn_screening, Config, HttpListSource, ListSource,
    LocalListSource, NameMatcher, ReferenceListIngestor, RosterImporter,
    ScreeningEvent, ScreeningPipeline, ScreeningReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(roster_path) = args.next().map(PathBuf::from) else {
        bail!("usage: sanctions-screen <roster.csv|xlsx> [reference-list.csv]");
    };
    let list_path = args.next().map(PathBuf::from);

    let config = load_config()?;
    info!(
        "Configuration loaded - surname threshold: {}, name threshold: {}",
        config.matcher.surname_threshold, config.matcher.name_threshold
    );

    let source: Arc<dyn ListSource> = match list_path {
        Some(path) => Arc::new(LocalListSource::new(path)),
        None => Arc::new(HttpListSource::new(config.retrieval.clone())?),
    };

    // list retrieval and roster import run side by side
    let importer = Arc::new(RosterImporter::new(config.roster.clone()));
    let (download, import) = tokio::join!(
        spawn_download(source),
        spawn_import(importer, roster_path.clone())
    );
    let list = download?.context("Sanctions list is not available")?;
    let import = import?.with_context(|| format!("Failed to import roster {}", roster_path.display()))?;
    info!("{}", import.summary());

    let ingestor = ReferenceListIngestor::new(config.ingest.clone());
    let list_file = list.path.clone();
    let index = tokio::task::spawn_blocking(move || ingestor.load(&list_file))
        .await?
        .map(Arc::new);

    let metadata = match &index {
        Ok(index) => {
            info!(
                "Sanctions list dated {}: {} aliases, {} entities",
                index.metadata().file_generation_date.as_deref().unwrap_or("unknown"),
                index.len(),
                index.entity_count()
            );
            index.metadata().clone()
        }
        Err(e) => {
            warn!("Sanctions list {} could not be indexed: {}", list.path.display(), e);
            Default::default()
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current entry");
            interrupt.cancel();
        }
    });

    let pipeline = Arc::new(ScreeningPipeline::new(NameMatcher::new(config.matcher.clone())));
    let roster: Arc<[_]> = import.entries.into();
    let mut handle = spawn_screening(pipeline, roster.clone(), index, cancel);

    let step = (roster.len() / 10).max(1);
    while let Some(event) = handle.next_event().await {
        match event {
            ScreeningEvent::Progress { current, total } => {
                if current % step == 0 || current == total {
                    info!("Screened {}/{}", current, total);
                } else {
                    debug!("Screened {}/{}", current, total);
                }
            }
            ScreeningEvent::Match { outcome, .. } => {
                info!(
                    "Match at roster position {}: {} entities, {} listed names",
                    outcome.position,
                    outcome.entity_ids.len(),
                    outcome.matching_names.len()
                );
            }
            ScreeningEvent::Completed { matched, total } => {
                info!("Screening finished: {} of {} people matched", matched, total);
            }
        }
    }

    let summary = handle.join().await?;
    if let Some(reason) = &summary.index_error {
        bail!("Screening did not run: {}", reason);
    }

    let mut entries = roster.to_vec();
    for outcome in &summary.outcomes {
        if let Some(entry) = entries.get_mut(outcome.position) {
            entry.apply_outcome(outcome);
        }
    }

    if let Some(path) = &config.report.output_path {
        let report = ScreeningReport::build(&entries, &summary, &metadata);
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    let flagged = entries.iter().filter(|e| e.match_count > 0).count();
    info!(
        "{} flagged, {} clear ({:?})",
        flagged,
        summary.processed - flagged,
        summary.state
    );

    Ok(())
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::var("SCREENING_CONFIG") {
        Ok(path) => {
            let config = Config::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path))?;
            Ok(config.with_env_overrides()?)
        }
        Err(_) => Ok(Config::from_env()?),
    }
}
