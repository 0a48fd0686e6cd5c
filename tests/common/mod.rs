//! Test configuration helpers for loading portal credentials from `.env`

use cfdi_dl::{Config, Credentials, DownloadType};
use tempfile::TempDir;

/// Load portal credentials from environment variables
///
/// Required environment variables:
/// - `SAT_RFC` - Taxpayer id
/// - `SAT_CIEC` - Portal password
pub fn load_credentials() -> Option<Credentials> {
    dotenvy::dotenv().ok();
    let rfc = std::env::var("SAT_RFC").ok()?;
    let ciec = std::env::var("SAT_CIEC").ok()?;
    Some(Credentials::new(rfc, ciec))
}

/// Check if live test credentials are available
pub fn has_live_credentials() -> bool {
    load_credentials().is_some()
}

/// Production config writing documents into a temporary directory
///
/// Optional environment variables:
/// - `SAT_DOWNLOAD_TYPE` - `issued` or `received` (default: received)
pub fn live_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.fetch.output_dir = temp_dir.path().join("xml");
    config.fetch.concurrency = 4;
    if std::env::var("SAT_DOWNLOAD_TYPE").as_deref() == Ok("issued") {
        config.search.download_type = DownloadType::Issued;
    }
    (config, temp_dir)
}

/// Skip test if credentials are not available
#[macro_export]
macro_rules! skip_if_no_credentials {
    () => {
        if !$crate::common::has_live_credentials() {
            eprintln!("Skipping test: SAT_RFC/SAT_CIEC not found in .env");
            return;
        }
    };
}
