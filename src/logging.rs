use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

/// Overrides the default filter, e.g. `OCR_GALLERY_LOG=ocr_gallery_rust=trace`.
pub const LOG_ENV: &str = "OCR_GALLERY_LOG";

/// One-shot commands print nothing but their output unless `--verbose` is
/// given. `serve` always reports its address and failed backend calls.
pub fn init(verbose: bool, serving: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .ok()
        .or_else(|| default_directive(verbose, serving).map(EnvFilter::new));
    let Some(filter) = filter else {
        return Ok(());
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}

fn default_directive(verbose: bool, serving: bool) -> Option<&'static str> {
    match (verbose, serving) {
        (true, _) => Some("ocr_gallery_rust=debug"),
        (false, true) => Some("ocr_gallery_rust=info"),
        (false, false) => None,
    }
}
