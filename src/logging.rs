use anyhow::Result;
use tracing_subscriber::fmt;

/// Logs go to stderr so stdout carries only the edit summary.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
    Ok(())
}
