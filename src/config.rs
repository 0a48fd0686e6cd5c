//! Configuration types for cfdi-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};
use crate::types::{DownloadType, VoucherState};

/// Portal endpoints.
///
/// Defaults point at the production portal. Tests point every URL at a mock server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Credential login form endpoint
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Portal landing page; also the base for relative download links
    #[serde(default = "default_portal_url")]
    pub portal_url: String,

    /// WS-Federation endpoint
    #[serde(default = "default_federation_url")]
    pub federation_url: String,

    /// Search-mode selection endpoint
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Query page for issued invoices
    #[serde(default = "default_issued_query_url")]
    pub issued_query_url: String,

    /// Query page for received invoices
    #[serde(default = "default_received_query_url")]
    pub received_query_url: String,

    /// Host header for the authentication host
    #[serde(default = "default_auth_host")]
    pub auth_host: String,

    /// Host header for the portal host
    #[serde(default = "default_portal_host")]
    pub portal_host: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            portal_url: default_portal_url(),
            federation_url: default_federation_url(),
            search_url: default_search_url(),
            issued_query_url: default_issued_query_url(),
            received_query_url: default_received_query_url(),
            auth_host: default_auth_host(),
            portal_host: default_portal_host(),
        }
    }
}

impl PortalConfig {
    /// Query page for the given search mode
    pub fn query_url(&self, download_type: DownloadType) -> &str {
        match download_type {
            DownloadType::Issued => &self.issued_query_url,
            DownloadType::Received => &self.received_query_url,
        }
    }

    /// Point every endpoint at `base` (e.g., a mock server URI), keeping the portal's paths
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let host = url::Url::parse(base)
            .ok()
            .and_then(|u| {
                u.host_str()
                    .map(|h| u.port().map_or(h.to_string(), |p| format!("{h}:{p}")))
            })
            .unwrap_or_default();
        Self {
            login_url: format!("{base}/nidp/app/login?id=SATUPCFDiCon&sid=0&option=credential"),
            portal_url: format!("{base}/"),
            federation_url: format!("{base}/v2/wsfederation"),
            search_url: format!("{base}/Consulta.aspx"),
            issued_query_url: format!("{base}/ConsultaEmisor.aspx"),
            received_query_url: format!("{base}/ConsultaReceptor.aspx"),
            auth_host: host.clone(),
            portal_host: host,
        }
    }
}

/// Search behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search from the issuer or the receiver side (default: received)
    #[serde(default)]
    pub download_type: DownloadType,

    /// Search cancelled vouchers instead of active ones (default: false)
    #[serde(default)]
    pub cancelled: bool,

    /// Row count at or above which a result is considered possibly truncated (default: 500)
    #[serde(default = "default_cap")]
    pub cap: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            download_type: DownloadType::default(),
            cancelled: false,
            cap: default_cap(),
        }
    }
}

impl SearchConfig {
    /// Voucher state derived from the `cancelled` flag
    pub fn voucher_state(&self) -> VoucherState {
        VoucherState::from_cancelled(self.cancelled)
    }
}

/// HTTP client settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept invalid TLS certificates (default: true, the portal's chain is unreliable)
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            accept_invalid_certs: true,
        }
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Skip the file, keep existing
    Skip,
}

/// Bulk document fetch settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum concurrent document downloads (default: 10)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Directory used by [`DirectorySink`](crate::fetcher::DirectorySink) (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            output_dir: default_output_dir(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// Retry configuration for probe transport failures.
///
/// Only used when set on [`Config::retry`]; nothing retries by default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration
///
/// Credentials are deliberately not part of the configuration and are passed to
/// [`SessionClient::authenticate`](crate::session::SessionClient::authenticate).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal endpoints
    #[serde(default)]
    pub portal: PortalConfig,

    /// Search mode, voucher state, and cap
    #[serde(default)]
    pub search: SearchConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Bulk fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Opt-in retry policy for search probes
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Config {
    /// Check values that would make the engine misbehave
    pub fn validate(&self) -> Result<()> {
        if self.search.cap == 0 {
            return Err(Error::config("search.cap", "cap must be at least 1"));
        }
        if self.fetch.concurrency == 0 {
            return Err(Error::config(
                "fetch.concurrency",
                "concurrency must be at least 1",
            ));
        }
        if let Some(retry) = &self.retry
            && !(retry.backoff_multiplier.is_finite() && retry.backoff_multiplier >= 1.0)
        {
            return Err(Error::config(
                "retry.backoff_multiplier",
                format!(
                    "backoff multiplier must be a finite number >= 1.0, got {}",
                    retry.backoff_multiplier
                ),
            ));
        }
        let urls = [
            ("portal.login_url", &self.portal.login_url),
            ("portal.portal_url", &self.portal.portal_url),
            ("portal.federation_url", &self.portal.federation_url),
            ("portal.search_url", &self.portal.search_url),
            ("portal.issued_query_url", &self.portal.issued_query_url),
            ("portal.received_query_url", &self.portal.received_query_url),
        ];
        for (key, value) in urls {
            url::Url::parse(value)
                .map_err(|e| Error::config(key, format!("invalid URL '{value}': {e}")))?;
        }
        Ok(())
    }

    /// Build the cookie-carrying HTTP client shared by the session and the fetcher
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.http.timeout)
            .user_agent(&self.http.user_agent)
            .danger_accept_invalid_certs(self.http.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))
    }
}

fn default_login_url() -> String {
    "https://cfdiau.sat.gob.mx/nidp/app/login?id=SATUPCFDiCon&sid=0&option=credential&sid=0"
        .to_string()
}

fn default_portal_url() -> String {
    "https://portalcfdi.facturaelectronica.sat.gob.mx/".to_string()
}

fn default_federation_url() -> String {
    "https://cfdicontribuyentes.accesscontrol.windows.net/v2/wsfederation".to_string()
}

fn default_search_url() -> String {
    "https://portalcfdi.facturaelectronica.sat.gob.mx/Consulta.aspx".to_string()
}

fn default_issued_query_url() -> String {
    "https://portalcfdi.facturaelectronica.sat.gob.mx/ConsultaEmisor.aspx".to_string()
}

fn default_received_query_url() -> String {
    "https://portalcfdi.facturaelectronica.sat.gob.mx/ConsultaReceptor.aspx".to_string()
}

fn default_auth_host() -> String {
    "cfdiau.sat.gob.mx".to_string()
}

fn default_portal_host() -> String {
    "portalcfdi.facturaelectronica.sat.gob.mx".to_string()
}

fn default_cap() -> usize {
    500
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0 Safari/537.36"
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
