use std::sync::Arc;
use std::time::Duration;

use hyper::body::{Bytes, to_bytes};
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use hyper::{Body, Client, Request, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use tokio::time::timeout;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{AdapterError, AdapterResult};

pub(crate) type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn build_https_client() -> AdapterResult<HyperClient> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));

    Ok(Client::builder().build::<_, Body>(connector))
}

/// Normalises a base URL to `scheme://host[:port]/path/`.
pub(crate) fn sanitize_base_url(provider: &str, input: &str) -> AdapterResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(AdapterError::configuration(format!(
            "{provider} base URL must start with http:// or https://"
        )));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>().map_err(|err| {
        AdapterError::configuration(format!("invalid {provider} base URL: {err}"))
    })?;
    Ok(base)
}

/// Joins a sanitised base URL and a relative API path.
pub(crate) fn endpoint(provider: &str, base_url: &str, path: &str) -> AdapterResult<Uri> {
    format!("{base_url}{path}")
        .parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid {provider} endpoint: {err}")))
}

/// Posts a JSON body and returns the raw response body of a 2xx reply.
pub(crate) async fn post_json(
    client: &HyperClient,
    provider: &str,
    endpoint: &Uri,
    bearer: Option<&str>,
    body: Vec<u8>,
    deadline: Duration,
) -> AdapterResult<Bytes> {
    let mut builder = Request::post(endpoint.clone()).header(CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body)).map_err(|err| {
        AdapterError::transport(format!("failed to build {provider} request: {err}"))
    })?;

    let response = timeout(deadline, client.request(request))
        .await
        .map_err(|_| AdapterError::transport(format!("{provider} request timed out")))?
        .map_err(|err| AdapterError::transport(format!("{provider} request failed: {err}")))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(AdapterError::RateLimited { retry_after });
    }

    let bytes = to_bytes(response.into_body()).await.map_err(|err| {
        AdapterError::transport(format!("failed to read {provider} response: {err}"))
    })?;

    if status.is_server_error() {
        return Err(AdapterError::transport(format!(
            "{provider} returned {status}: {}",
            String::from_utf8_lossy(&bytes)
        )));
    }
    if !status.is_success() {
        return Err(AdapterError::response(format!(
            "{provider} returned {status}: {}",
            String::from_utf8_lossy(&bytes)
        )));
    }
    Ok(bytes)
}
