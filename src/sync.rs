use anyhow::Context;
use tokio::fs;
use tracing::{debug, info};

use crate::{
    api::Api,
    config::sync_config::Config,
    materialize::{LocalFs, Materializer},
    status_bar::StatusBar,
    tree::forest_from_response,
    Result,
};

impl Config {
    /// Logs in, fetches the listing and mirrors it into the destination folder
    ///
    /// Only login and listing failures end the run, everything after that
    /// is logged per node.
    pub async fn sync(&self) -> Result<()> {
        let api = Api::new()?;

        info!("Gathering documents for {}", self.credentials.login);
        let context = api
            .authenticate(&self.credentials.login, &self.credentials.password)
            .await
            .context("Authentication failed")?;

        let listing = api
            .get_folders_and_files(&context)
            .await
            .context("Failed getting the folder and file list")?;
        let forest = forest_from_response(listing);
        debug!("Gathered files and folders {:?}", forest.nodes);

        fs::create_dir_all(&self.destination)
            .await
            .with_context(|| format!("Could not create {}", self.destination.display()))?;

        let status_bar = StatusBar::default();
        Materializer::new(&api, &LocalFs, &status_bar)
            .with_file_filters(&self.file_filters)
            .materialize(&context, &self.destination, &forest.nodes, self.ignore_existing)
            .await;

        info!("Total: {}", status_bar.totals().await);
        if let Some(run_log) = &self.run_log {
            status_bar
                .write_log_to_file(&run_log.path, &run_log.rotation)
                .await
                .context("Failed writing the run log")?;
        }
        Ok(())
    }
}
