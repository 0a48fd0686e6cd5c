use super::*;
use crate::test_helpers::*;
use crate::types::VoucherState;
use crate::window::QueryWindow;
use chrono::NaiveDate;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_authenticate_runs_full_chain() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/nidp/app/login"))
        .and(body_string_contains("Ecom_User_ID=XAXX010101000"))
        .and(body_string_contains("Ecom_Password=ciec-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_OK))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING))
        .expect(1)
        .mount(&server)
        .await;
    // Fields from the landing page are forwarded to the federation endpoint
    Mock::given(method("POST"))
        .and(path("/v2/wsfederation"))
        .and(body_string_contains("wresult=landing-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEDERATION))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("wresult=federated-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PORTAL))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Consulta.aspx"))
        .and(body_string_contains("__VIEWSTATE=portal-state"))
        .and(body_string_contains(
            "ctl00%24MainContent%24TipoBusqueda=RdoTipoBusquedaReceptor",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = SessionClient::new(&test_config(&server)).unwrap();
    assert_eq!(session.state(), AuthState::Unauthenticated);

    session.authenticate(&credentials()).await.unwrap();
    assert_eq!(session.state(), AuthState::Authenticated);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_missing_marker_is_invalid_credentials_without_further_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/nidp/app/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>El RFC o CIEC son incorrectos</html>"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/wsfederation"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Consulta.aspx"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = SessionClient::new(&test_config(&server)).unwrap();
    let err = session.authenticate(&credentials()).await.unwrap_err();

    assert!(matches!(err, Error::InvalidCredentials));
    assert_eq!(session.state(), AuthState::Failed);
}

#[tokio::test]
async fn test_http_error_names_the_failing_step() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/nidp/app/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_OK))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LANDING))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/wsfederation"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut session = SessionClient::new(&test_config(&server)).unwrap();
    let err = session.authenticate(&credentials()).await.unwrap_err();

    match err {
        Error::SessionTransport { step, message } => {
            assert_eq!(step, "federation");
            assert!(message.contains("503"));
        }
        other => panic!("expected SessionTransport, got {other:?}"),
    }
    assert_eq!(session.state(), AuthState::Failed);
}

#[tokio::test]
async fn test_search_before_authentication_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = SessionClient::new(&test_config(&server)).unwrap();
    let filter = QueryFilter::for_document(DownloadType::Received, "uuid-1", VoucherState::Active);

    let err = session.search(&filter).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthenticated));
}

#[tokio::test]
async fn test_search_merges_postback_fields_into_final_post() {
    let server = MockServer::start().await;
    let session = authenticated_session(&server).await;

    Mock::given(method("GET"))
        .and(path("/ConsultaReceptor.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form><input type="hidden" name="__VIEWSTATE" value="page-state" />
               <input type="hidden" name="__EVENTVALIDATION" value="page-validation" /></form>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ConsultaReceptor.aspx"))
        .and(header("x-microsoftajax", "Delta=true"))
        .and(body_string_contains(
            "__EVENTTARGET=ctl00%24MainContent%24RdoFechas",
        ))
        .and(body_string_contains("__VIEWSTATE=page-state"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("0|updatePanel|p||11|hiddenField|__VIEWSTATE|delta-state|"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ConsultaReceptor.aspx"))
        .and(body_string_contains("Buscar+CFDI"))
        .and(body_string_contains("__VIEWSTATE=delta-state"))
        .and(body_string_contains("__EVENTVALIDATION=page-validation"))
        .and(body_string_contains(
            "ctl00%24MainContent%24CldFecha%24DdlDia=15",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("RESULTS"))
        .expect(1)
        .mount(&server)
        .await;

    let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let filter = QueryFilter::for_window(
        DownloadType::Received,
        QueryWindow::full_day(day),
        VoucherState::Active,
    );
    let body = session.search(&filter).await.unwrap();
    assert_eq!(body, "RESULTS");
}
