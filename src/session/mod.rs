//! Portal session and authentication state machine
//!
//! [`SessionClient`] turns a credential pair into a portal session by walking a fixed
//! chain of form exchanges. Each step consumes the hidden fields produced by the one
//! before it:
//!
//! ```text
//! Unauthenticated ──login──▶ LoggedIn ──landing page──▶ FederationPending
//!   ──ws-federation──▶ PortalEntering ──portal──▶ SearchModeSelecting
//!   ──search mode──▶ Authenticated
//! ```
//!
//! Any failure leaves the machine in [`AuthState::Failed`]; the only way back is to run
//! [`SessionClient::authenticate`] again. Once authenticated the client implements
//! [`PortalSearch`], which is what the retrieval engine drives.

mod headers;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{Config, PortalConfig};
use crate::error::{Error, Result};
use crate::filters::QueryFilter;
use crate::form::{HiddenFields, parse_delta_hidden_fields, parse_inputs};
use crate::types::{Credentials, DownloadType};

/// Marker present on the login response when the portal issued a fresh session
const SESSION_MARKER: &str = r#"<META HTTP-EQUIV="expires" CONTENT="0">"#;

/// Position of a [`SessionClient`] in the authentication chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// No exchange has happened yet
    Unauthenticated,
    /// Credentials accepted; the landing page is next
    LoggedIn,
    /// Landing page fields parsed; the WS-Federation post is next
    FederationPending,
    /// Federation tokens received; the portal post is next
    PortalEntering,
    /// Portal entered; the search-mode selection is next
    SearchModeSelecting,
    /// Searches may be issued
    Authenticated,
    /// The chain stopped at some step; re-run [`SessionClient::authenticate`]
    Failed,
}

/// "Perform an authenticated search" seam between the session and the engine
#[async_trait]
pub trait PortalSearch: Send + Sync {
    /// Run one search and return the raw result page body
    async fn search(&self, filter: &QueryFilter) -> Result<String>;
}

/// HTTP client, cookie jar and authentication state for one portal session
pub struct SessionClient {
    client: reqwest::Client,
    portal: PortalConfig,
    download_type: DownloadType,
    state: AuthState,
}

impl SessionClient {
    /// Create an unauthenticated session
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client cannot be built
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: config.build_http_client()?,
            portal: config.portal.clone(),
            download_type: config.search.download_type,
            state: AuthState::Unauthenticated,
        })
    }

    /// Current position in the authentication chain
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Whether searches may be issued
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Search mode selected during authentication
    pub fn download_type(&self) -> DownloadType {
        self.download_type
    }

    /// The cookie-carrying client, for fetching documents with this session
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Run the whole authentication chain.
    ///
    /// Steps run strictly in order and are never retried. Calling this again restarts
    /// the chain from the login form.
    ///
    /// # Errors
    /// - [`Error::InvalidCredentials`] if the login response lacks the session marker;
    ///   no further request is made
    /// - [`Error::SessionTransport`] naming the step on any HTTP-level failure
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        self.state = AuthState::Unauthenticated;
        debug!(tax_id = credentials.tax_id(), "starting authentication");

        match self.run_chain(credentials).await {
            Ok(()) => {
                self.state = AuthState::Authenticated;
                info!(
                    tax_id = credentials.tax_id(),
                    download_type = %self.download_type,
                    "portal session authenticated"
                );
                Ok(())
            }
            Err(e) => {
                let reached = self.state;
                self.state = AuthState::Failed;
                match &e {
                    Error::InvalidCredentials => {
                        warn!(tax_id = credentials.tax_id(), "portal rejected credentials")
                    }
                    _ => warn!(state = ?reached, error = %e, "authentication failed"),
                }
                Err(e)
            }
        }
    }

    async fn run_chain(&mut self, credentials: &Credentials) -> Result<()> {
        self.login(credentials).await?;
        self.advance(AuthState::LoggedIn);

        let fields = self.landing_fields().await?;
        self.advance(AuthState::FederationPending);

        let fields = self.federate(fields).await?;
        self.advance(AuthState::PortalEntering);

        let fields = self.enter_portal(fields).await?;
        self.advance(AuthState::SearchModeSelecting);

        self.select_search_mode(fields).await
    }

    fn advance(&mut self, next: AuthState) {
        debug!(from = ?self.state, to = ?next, "authentication step completed");
        self.state = next;
    }

    async fn login(&self, credentials: &Credentials) -> Result<()> {
        let form = [
            ("Ecom_Password", credentials.secret()),
            ("Ecom_User_ID", credentials.tax_id()),
            ("option", "credential"),
            ("submit", "Enviar"),
        ];
        let request = self
            .client
            .post(&self.portal.login_url)
            .headers(headers::post(&self.portal.auth_host, &self.portal.login_url))
            .form(&form);
        let body = send("login", request).await?;

        if !body.contains(SESSION_MARKER) {
            return Err(Error::InvalidCredentials);
        }
        Ok(())
    }

    async fn landing_fields(&self) -> Result<HiddenFields> {
        let body = send("landing", self.client.get(&self.portal.portal_url)).await?;
        Ok(parse_inputs(&body))
    }

    async fn federate(&self, fields: HiddenFields) -> Result<HiddenFields> {
        let request = self.client.post(&self.portal.federation_url).form(&fields);
        let body = send("federation", request).await?;
        Ok(parse_inputs(&body))
    }

    async fn enter_portal(&self, fields: HiddenFields) -> Result<HiddenFields> {
        let request = self.client.post(&self.portal.portal_url).form(&fields);
        let body = send("portal", request).await?;
        Ok(parse_inputs(&body))
    }

    async fn select_search_mode(&self, fields: HiddenFields) -> Result<()> {
        let fields = fields.merged(HiddenFields::from([
            ("ctl00$MainContent$TipoBusqueda", self.download_type.search_radio()),
            ("__ASYNCPOST", "true"),
            ("__EVENTTARGET", ""),
            ("__EVENTARGUMENT", ""),
            (
                "ctl00$ScriptManager1",
                "ctl00$MainContent$UpnlBusqueda|ctl00$MainContent$BtnBusqueda",
            ),
        ]));
        let request = self
            .client
            .post(&self.portal.search_url)
            .headers(headers::post(&self.portal.auth_host, &self.portal.portal_url))
            .form(&fields);
        send("search_mode", request).await?;
        Ok(())
    }
}

#[async_trait]
impl PortalSearch for SessionClient {
    /// GET the query page, post the date-selection postback, then post the search with
    /// the hidden fields the postback updated.
    async fn search(&self, filter: &QueryFilter) -> Result<String> {
        if !self.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }

        let url = self.portal.query_url(filter.download_type);
        let encoder = filter.encoder();

        let page = send("query_page", self.client.get(url)).await?;
        let inputs = parse_inputs(&page);

        let selection = inputs.clone().merged(encoder.date_selection_fields(filter));
        let request = self
            .client
            .post(url)
            .headers(headers::post_ajax(&self.portal.portal_host, url))
            .form(&selection);
        let delta = send("date_selection", request).await?;

        let values = inputs
            .merged(encoder.search_fields(filter))
            .merged(parse_delta_hidden_fields(&delta));
        let request = self
            .client
            .post(url)
            .headers(headers::post_ajax(&self.portal.portal_host, url))
            .form(&values);
        send("search", request).await
    }
}

/// Send a request and read its body, mapping every HTTP-level failure to the step
async fn send(step: &'static str, request: reqwest::RequestBuilder) -> Result<String> {
    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            format!("timeout: {e}")
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            e.to_string()
        };
        Error::SessionTransport { step, message }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::transport(step, format!("HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| Error::transport(step, format!("unreadable body: {e}")))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
