//! `export` handler: download the statistics CSV.

use std::io::{self, Write};
use std::path::Path;

use circlescope_core::ApiClient;

use crate::cli::{ExportArgs, GlobalOpts};
use crate::error::CliError;

pub async fn handle(api: &ApiClient, args: &ExportArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let csv = api.export_csv().await?;

    if is_stdout(&args.file) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&csv)?;
        stdout.flush()?;
        return Ok(());
    }

    std::fs::write(&args.file, &csv)?;
    tracing::info!(path = %args.file.display(), bytes = csv.len(), "export written");
    if !global.quiet {
        eprintln!("Wrote {} bytes to {}", csv.len(), args.file.display());
    }
    Ok(())
}

fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}
