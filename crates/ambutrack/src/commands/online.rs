//! `online`: one bootstrap fetch, rendered once.

use ambutrack_core::Tracker;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(tracker: &Tracker, global: &GlobalOpts) -> Result<(), CliError> {
    let timeout = tracker.config().timeout;

    let spinner = output::spinner(global, "Fetching online ambulances…");
    let result = tokio::time::timeout(timeout, tracker.refresh()).await;
    spinner.finish_and_clear();

    let outcome = result.map_err(|_| CliError::Timeout {
        seconds: timeout.as_secs(),
    })??;
    tracing::debug!(?outcome, "online fleet fetched");

    let fleet = tracker.list();
    let out = output::render_fleet(global, &fleet)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
