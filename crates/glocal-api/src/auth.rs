// Token exchange boundary
//
// Two sequential exchanges against the Android account auth endpoint:
// a master login (account credentials -> long-lived master token) and an
// OAuth exchange (master token -> hourly access token). Both return a
// flat key=value response mapping; the caller decides which field it
// needs. The login-handshake cryptography is owned by the upstream
// service and is not reproduced here.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;

/// App identity constants for the credential exchange.
///
/// These identify the official Google Home Android app; the access
/// tokens minted for its scope are the ones the Foyer service accepts.
pub const ACCESS_TOKEN_APP_NAME: &str = "com.google.android.apps.chromecast.app";
pub const ACCESS_TOKEN_CLIENT_SIGNATURE: &str = "24bb24c05e47e0aefa68a58a766179d9b613a600";
pub const ACCESS_TOKEN_SERVICE: &str = "oauth2:https://www.google.com/accounts/OAuthLogin";

/// Default endpoint for both exchanges.
pub const ANDROID_AUTH_URL: &str = "https://android.clients.google.com/auth";

/// The exchange endpoint cannot sign inputs past this length; longer
/// values are rejected locally before any request is sent.
const MAX_EXCHANGE_INPUT_LEN: usize = 512;

/// Flat response mapping from an exchange. May or may not contain the
/// field the caller expects (`Token` for master login, `Auth` for OAuth).
pub type ExchangeResponse = HashMap<String, String>;

/// Credential exchange seam.
///
/// The production implementation is [`AuthClient`]; tests substitute
/// counting mocks to pin down the caching behavior of the client.
pub trait TokenExchange {
    /// Login exchange: account credentials -> response mapping that, on
    /// success, carries the master token under `"Token"`.
    ///
    /// `username` must already be escaped (`+` -> `%2B`).
    fn perform_master_login(
        &self,
        username: &str,
        password: &SecretString,
        android_id: &str,
    ) -> impl Future<Output = Result<ExchangeResponse, Error>>;

    /// Credential exchange: master token -> response mapping that, on
    /// success, carries the access token under `"Auth"`.
    fn perform_oauth(
        &self,
        username: &str,
        master_token: &str,
        android_id: &str,
    ) -> impl Future<Output = Result<ExchangeResponse, Error>>;
}

/// HTTP client for the Android account auth endpoint.
///
/// Sends form-encoded requests and parses the plaintext `key=value`
/// response body into an [`ExchangeResponse`].
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AuthClient {
    /// Create a client against the production endpoint.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(Url::parse(ANDROID_AUTH_URL)?)
    }

    /// Create a client against an alternate endpoint (tests).
    pub fn with_base_url(base_url: Url) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build().map_err(Error::Transport)?;
        Ok(Self { http, base_url })
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<ExchangeResponse, Error> {
        debug!("POST {}", self.base_url);

        let resp = self
            .http
            .post(self.base_url.clone())
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("exchange failed (HTTP {status}): {body}"),
            });
        }

        Ok(parse_exchange_response(&body))
    }
}

impl TokenExchange for AuthClient {
    async fn perform_master_login(
        &self,
        username: &str,
        password: &SecretString,
        android_id: &str,
    ) -> Result<ExchangeResponse, Error> {
        if username.len() > MAX_EXCHANGE_INPUT_LEN
            || password.expose_secret().len() > MAX_EXCHANGE_INPUT_LEN
        {
            return Err(Error::InputTooLong);
        }

        debug!("performing master login for {username}");

        let form = [
            ("accountType", "HOSTED_OR_GOOGLE"),
            ("Email", username),
            ("has_permission", "1"),
            ("add_account", "1"),
            ("Passwd", password.expose_secret()),
            ("service", "ac2dm"),
            ("source", "android"),
            ("androidId", android_id),
            ("device_country", "us"),
            ("operatorCountry", "us"),
            ("lang", "en"),
            ("sdk_version", "17"),
        ];

        self.post_form(&form).await
    }

    async fn perform_oauth(
        &self,
        username: &str,
        master_token: &str,
        android_id: &str,
    ) -> Result<ExchangeResponse, Error> {
        debug!("performing oauth exchange for {username}");

        let form = [
            ("accountType", "HOSTED_OR_GOOGLE"),
            ("Email", username),
            ("has_permission", "1"),
            ("Token", master_token),
            ("service", ACCESS_TOKEN_SERVICE),
            ("source", "android"),
            ("androidId", android_id),
            ("app", ACCESS_TOKEN_APP_NAME),
            ("client_sig", ACCESS_TOKEN_CLIENT_SIGNATURE),
        ];

        self.post_form(&form).await
    }
}

/// Parse the exchange response body: one `key=value` pair per line,
/// split on the first `=`. Lines without a separator are skipped.
fn parse_exchange_response(body: &str) -> ExchangeResponse {
    body.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            Some((key.to_owned(), value.to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_value_lines() {
        let body = "SID=sid123\nToken=aas_et/abc\nservices=mail,chromesync\n";
        let parsed = parse_exchange_response(body);
        assert_eq!(parsed.get("Token").map(String::as_str), Some("aas_et/abc"));
        assert_eq!(parsed.get("SID").map(String::as_str), Some("sid123"));
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn parse_skips_lines_without_separator() {
        let parsed = parse_exchange_response("garbage\nAuth=ya29.token");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get("Auth").map(String::as_str), Some("ya29.token"));
    }

    #[test]
    fn parse_keeps_equals_in_value() {
        let parsed = parse_exchange_response("Auth=a=b=c");
        assert_eq!(parsed.get("Auth").map(String::as_str), Some("a=b=c"));
    }
}
