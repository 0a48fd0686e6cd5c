//! Shared mock-portal fixtures for unit tests

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{Config, PortalConfig};
use crate::session::SessionClient;
use crate::types::Credentials;

pub(crate) const TAX_ID: &str = "XAXX010101000";
pub(crate) const SECRET: &str = "ciec-secret";

pub(crate) const LOGIN_OK: &str = r#"<html><head><META HTTP-EQUIV="expires" CONTENT="0"></head><body>ok</body></html>"#;

pub(crate) const LANDING: &str = r#"<html><body><form method="post" action="/v2/wsfederation">
    <input type="hidden" name="wa" value="wsignin1.0" />
    <input type="hidden" name="wresult" value="landing-token" />
</form></body></html>"#;

pub(crate) const FEDERATION: &str = r#"<html><body><form method="post" action="/">
    <input type="hidden" name="wa" value="wsignin1.0" />
    <input type="hidden" name="wresult" value="federated-token" />
</form></body></html>"#;

pub(crate) const PORTAL: &str = r#"<html><body><form id="aspnetForm" method="post">
    <input type="hidden" name="__VIEWSTATE" value="portal-state" />
    <input type="hidden" name="__EVENTVALIDATION" value="portal-validation" />
</form></body></html>"#;

/// Config with every endpoint on the mock server
pub(crate) fn test_config(server: &MockServer) -> Config {
    Config {
        portal: PortalConfig::with_base(&server.uri()),
        ..Default::default()
    }
}

pub(crate) fn credentials() -> Credentials {
    Credentials::new(TAX_ID, SECRET)
}

/// Mount the five exchanges of a successful authentication
pub(crate) async fn mount_login_chain(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/nidp/app/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_OK))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/wsfederation"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEDERATION))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PORTAL))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Consulta.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0|updatePanel|p||"))
        .mount(server)
        .await;
}

/// An authenticated session against the mock server
pub(crate) async fn authenticated_session(server: &MockServer) -> SessionClient {
    mount_login_chain(server).await;
    let mut session = SessionClient::new(&test_config(server)).unwrap();
    session.authenticate(&credentials()).await.unwrap();
    session
}

/// A result page holding one row per id
pub(crate) fn result_page(ids: &[String]) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<tr><td><span class="BtnDescarga" onclick="return AccionCfdi('RecuperaCfdi.aspx?Datos={id}','Recuperacion');"></span></td>
                <td>{id}</td><td>AAA010101AAA</td><td>Issuer</td><td>{TAX_ID}</td><td>Receiver</td>
                <td>2024-01-15T10:00:00</td><td>2024-01-15T10:00:05</td><td>PAC010101AAA</td>
                <td>$100.00</td><td>Ingreso</td><td>Vigente</td><td></td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><div id="DivContenedor"><div><table>
        <tr><th>Acciones</th><th>Folio Fiscal</th></tr>{rows}</table></div></div></body></html>"#
    )
}
