use anyhow::Result;
use log::{error, info, warn};
use notewell_common::{Settings, logging};
use notewell_db::IngestStatus;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init();
            error!("Invalid configuration: {e}");
            return Err(e.into());
        }
    };
    logging::init_with_file(&settings.ingestion_log_file);

    info!("Starting ingestion run...");
    match notewell_db::ingest(&settings).await {
        Ok(report) => match report.status {
            IngestStatus::UpToDate => info!(
                "Everything up to date ({} eligible file(s)).",
                report.files_seen
            ),
            IngestStatus::Indexed => {
                info!(
                    "Indexed {} chunk(s) from {} file(s); {} file(s) failed to load.",
                    report.index.chunks_added, report.files_loaded, report.files_failed
                );
                if !report.ledger_saved {
                    warn!("Ledger was not saved; the next run will redo this work.");
                }
            }
        },
        Err(e) => {
            error!("Ingestion failed: {e}");
            return Err(e.into());
        }
    }

    info!("Ingestion run finished.");
    Ok(())
}
