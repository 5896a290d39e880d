//! HTTP client for the Keystead API.
//!
//! Every call returns an [`ApiResponse`]: the variant is chosen from the
//! endpoint and the HTTP status class, so callers match on it instead of
//! inspecting raw JSON. Transport failures and unparseable bodies are errors.

use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::models::{
    ApiResponse, CheckRequest, CreateLicenseRequest, ErrorResponse, KeyRequest, LicenseList,
    Outcome, OutcomeResponse, PublicRecord,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Success body of `POST /api/v1/specific`: the record, or the
/// `nonexistent` outcome for an unknown key.
#[derive(Deserialize)]
#[serde(untagged)]
enum SpecificBody {
    Record(PublicRecord),
    Outcome(OutcomeResponse),
}

impl From<SpecificBody> for ApiResponse {
    fn from(body: SpecificBody) -> Self {
        match body {
            SpecificBody::Record(r) => ApiResponse::Record(r),
            SpecificBody::Outcome(o) => ApiResponse::Outcome(o),
        }
    }
}

/// Client for the admin and public license endpoints.
#[derive(Debug, Clone)]
pub struct LicenseApiClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl LicenseApiClient {
    pub fn new(config: &ClientConfig) -> LicenseResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/v1/all/<product>`, with the product escaped as one path segment.
    fn product_url(&self, product: &str) -> LicenseResult<Url> {
        let mut url = Url::parse(&self.url("/api/v1/all"))
            .map_err(|e| LicenseError::Config(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                LicenseError::Config(format!("base URL cannot take a path: {}", self.base_url))
            })?
            .push(product);
        Ok(url)
    }

    /// `POST /api/v1/create`
    pub async fn create_license(&self, email: &str, product: &str) -> LicenseResult<ApiResponse> {
        let body = CreateLicenseRequest {
            email: email.to_string(),
            product: product.to_string(),
        };

        let resp = self
            .http
            .post(self.url("/api/v1/create"))
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?;

        parse_response(resp, ApiResponse::Outcome).await
    }

    /// `GET /api/v1/all/:product`
    pub async fn get_all(&self, product: &str) -> LicenseResult<ApiResponse> {
        let resp = self
            .http
            .get(self.product_url(product)?)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        parse_response(resp, ApiResponse::RecordList).await
    }

    /// `POST /api/v1/specific`
    pub async fn get_specific(&self, key: &str) -> LicenseResult<ApiResponse> {
        let resp = self
            .http
            .post(self.url("/api/v1/specific"))
            .basic_auth(&self.username, Some(&self.password))
            .json(&KeyRequest {
                key: key.to_string(),
            })
            .send()
            .await?;

        parse_response(resp, |body: SpecificBody| body.into()).await
    }

    /// `POST /api/v1/invalidate`
    pub async fn invalidate_license(&self, key: &str) -> LicenseResult<ApiResponse> {
        let resp = self
            .http
            .post(self.url("/api/v1/invalidate"))
            .basic_auth(&self.username, Some(&self.password))
            .json(&KeyRequest {
                key: key.to_string(),
            })
            .send()
            .await?;

        parse_response(resp, ApiResponse::Outcome).await
    }

    /// `POST /license/check`, unauthenticated.
    ///
    /// `true` only for a `valid` outcome. Transport and parse failures count
    /// as not valid.
    pub async fn check_validity(&self, key: &str, product: &str) -> bool {
        let body = CheckRequest {
            key: key.to_string(),
            product: product.to_string(),
        };

        let resp = match self
            .http
            .post(self.url("/license/check"))
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!("License check request failed: {e}");
                return false;
            }
        };

        match parse_response(resp, ApiResponse::Outcome).await {
            Ok(ApiResponse::Outcome(o)) => o.outcome() == Some(Outcome::Valid),
            Ok(_) => false,
            Err(e) => {
                debug!("License check response unreadable: {e}");
                false
            }
        }
    }
}

/// Turn an HTTP response into an [`ApiResponse`].
///
/// 2xx bodies are parsed as `T` and wrapped; anything else becomes
/// [`ApiResponse::Error`], synthesized from the status if the body is not the
/// API's error shape.
async fn parse_response<T, F>(resp: Response, wrap: F) -> LicenseResult<ApiResponse>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> ApiResponse,
{
    let status = resp.status();
    let text = resp.text().await?;

    if status.is_success() {
        let body: T = serde_json::from_str(&text).map_err(|e| {
            LicenseError::Server(format!("unexpected response body (HTTP {status}): {e}"))
        })?;
        return Ok(wrap(body));
    }

    let error = serde_json::from_str::<ErrorResponse>(&text).unwrap_or_else(|_| ErrorResponse {
        status: "error".to_string(),
        error: String::new(),
        message: if text.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            text.trim().to_string()
        },
        code: status.as_u16(),
    });

    Ok(ApiResponse::Error(error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let config = ClientConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..ClientConfig::default()
        };
        let client = LicenseApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/license/check"), "http://localhost:8080/license/check");
    }

    #[test]
    fn product_is_escaped_as_one_segment() {
        let client = LicenseApiClient::new(&ClientConfig::default()).unwrap();
        let base = client.base_url().to_string();

        let url = client.product_url("acme").unwrap();
        assert_eq!(url.as_str(), format!("{base}/api/v1/all/acme"));

        let url = client.product_url("a b?c#d%e").unwrap();
        assert_eq!(url.as_str(), format!("{base}/api/v1/all/a%20b%3Fc%23d%25e"));
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn specific_body_distinguishes_record_and_outcome() {
        let record: SpecificBody = serde_json::from_str(
            r#"{"key":"abc","product":"acme","email":"a@x.com","valid":true}"#,
        )
        .unwrap();
        assert!(matches!(ApiResponse::from(record), ApiResponse::Record(_)));

        let outcome: SpecificBody = serde_json::from_str(
            r#"{"license_key":"abc","status":"invalid","message":"license nonexistent","code":200}"#,
        )
        .unwrap();
        assert!(matches!(ApiResponse::from(outcome), ApiResponse::Outcome(_)));
    }

    #[tokio::test]
    async fn check_against_unreachable_server_is_false() {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ClientConfig::default()
        };
        let client = LicenseApiClient::new(&config).unwrap();
        assert!(!client.check_validity("key", "acme").await);
    }
}
