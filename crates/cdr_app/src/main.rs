mod cli;
mod logging;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, engine_warn};

use cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(
        engine_logging::level_for_verbosity(cli.verbosity()),
        cli.log_file.as_deref(),
    );

    let config = cli.to_config();
    engine_info!("Reading ACHE data from: {}", config.input_path.display());
    engine_info!("Generating CDR file version: {}", config.version);
    if let Some(path) = &config.output_file {
        engine_info!("Saving CDR data at: {}", path.display());
    }
    if let Some(target) = &config.index {
        engine_info!(
            "Indexing into {} (index={}, type={})",
            target.endpoint,
            target.index.as_deref().unwrap_or_default(),
            target.doc_type.as_deref().unwrap_or_default()
        );
    }

    let summary = cdr_engine::run_export(&config).with_context(|| {
        format!(
            "failed to export {} as {}",
            config.input_path.display(),
            config.version
        )
    })?;

    if summary.media.failed + summary.documents.failed > 0 {
        engine_warn!(
            "{} media and {} document records failed; see errors above",
            summary.media.failed,
            summary.documents.failed
        );
    }
    engine_info!("Processed {} pages", summary.documents.emitted);
    engine_info!("done.");
    Ok(())
}
