//! Browser-like request headers
//!
//! The portal rejects form posts that do not look like they came from its own pages,
//! and only answers with a delta response when the ASP.NET AJAX markers are present.

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, HOST, HeaderMap, HeaderName,
    HeaderValue, PRAGMA, REFERER,
};
use tracing::debug;

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => debug!(header = %name, "skipping header with invalid value"),
    }
}

/// Headers for a regular form post
pub(crate) fn post(host: &str, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(
        &mut headers,
        ACCEPT,
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    );
    insert(&mut headers, ACCEPT_LANGUAGE, "es-MX,es;q=0.8,en;q=0.5");
    insert(
        &mut headers,
        CONTENT_TYPE,
        "application/x-www-form-urlencoded",
    );
    insert(&mut headers, HOST, host);
    insert(&mut headers, REFERER, referer);
    headers
}

/// Headers for an async postback; the portal answers with a delta body
pub(crate) fn post_ajax(host: &str, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, ACCEPT, "*/*");
    insert(&mut headers, ACCEPT_LANGUAGE, "es-MX,es;q=0.8,en;q=0.5");
    insert(&mut headers, CACHE_CONTROL, "no-cache");
    insert(&mut headers, PRAGMA, "no-cache");
    insert(
        &mut headers,
        CONTENT_TYPE,
        "application/x-www-form-urlencoded; charset=utf-8",
    );
    insert(&mut headers, HOST, host);
    insert(&mut headers, REFERER, referer);
    insert(
        &mut headers,
        HeaderName::from_static("x-microsoftajax"),
        "Delta=true",
    );
    insert(
        &mut headers,
        HeaderName::from_static("x-requested-with"),
        "XMLHttpRequest",
    );
    headers
}
