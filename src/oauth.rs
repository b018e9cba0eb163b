//! OAuth 1.0a request signing (HMAC-SHA1) for the bookmark API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::{rngs::OsRng, Rng};
use ring::hmac;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::hatena::ApiError;

/// Unreserved characters per RFC 3986, the only ones left unencoded.
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct Consumer {
    pub key: String,
    pub secret: String,
}

/// A token and its secret, either the temporary request token or the
/// long-lived access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    pub secret: String,
}

pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, RFC3986).to_string()
}

/// Builds `Authorization` headers for one request.
pub struct Signer<'a> {
    consumer: &'a Consumer,
    token: Option<&'a TokenPair>,
    callback: Option<&'a str>,
    verifier: Option<&'a str>,
}

impl<'a> Signer<'a> {
    pub fn new(consumer: &'a Consumer) -> Self {
        Self {
            consumer,
            token: None,
            callback: None,
            verifier: None,
        }
    }

    pub fn token(mut self, token: &'a TokenPair) -> Self {
        self.token = Some(token);
        self
    }

    pub fn callback(mut self, callback: &'a str) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn verifier(mut self, verifier: &'a str) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Header value for `method url`. Query parameters of `url` are part of
    /// the signature.
    pub fn authorization(&self, method: &str, url: &Url) -> String {
        let nonce: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp();
        self.authorization_with(method, url, &nonce, timestamp)
    }

    fn protocol_params(&self, nonce: &str, timestamp: i64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("oauth_consumer_key", self.consumer.key.clone()),
            ("oauth_nonce", nonce.to_string()),
            ("oauth_signature_method", "HMAC-SHA1".to_string()),
            ("oauth_timestamp", timestamp.to_string()),
            ("oauth_version", "1.0".to_string()),
        ];
        if let Some(token) = self.token {
            params.push(("oauth_token", token.token.clone()));
        }
        if let Some(callback) = self.callback {
            params.push(("oauth_callback", callback.to_string()));
        }
        if let Some(verifier) = self.verifier {
            params.push(("oauth_verifier", verifier.to_string()));
        }
        params
    }

    fn authorization_with(&self, method: &str, url: &Url, nonce: &str, timestamp: i64) -> String {
        let mut params = self.protocol_params(nonce, timestamp);
        let base = signature_base(method, url, &params);
        let key = format!(
            "{}&{}",
            encode(&self.consumer.secret),
            encode(self.token.map(|t| t.secret.as_str()).unwrap_or(""))
        );
        params.push(("oauth_signature", sign(&key, &base)));

        let fields: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }
}

/// `METHOD&base-uri&normalized-params`, see RFC 5849 section 3.4.1.
fn signature_base(method: &str, url: &Url, protocol: &[(&'static str, String)]) -> String {
    let mut base_uri = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        base_uri.push_str(&format!(":{port}"));
    }
    base_uri.push_str(url.path());

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .chain(protocol.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();
    let normalized: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(&base_uri),
        encode(&normalized.join("&"))
    )
}

fn sign(key: &str, base: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key.as_bytes());
    STANDARD.encode(hmac::sign(&key, base.as_bytes()).as_ref())
}

/// Reads `oauth_token` and `oauth_token_secret` from a form-encoded body.
pub fn parse_token_response(body: &str) -> Result<TokenPair, ApiError> {
    let mut token = None;
    let mut secret = None;
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        match key.as_ref() {
            "oauth_token" => token = Some(value.into_owned()),
            "oauth_token_secret" => secret = Some(value.into_owned()),
            _ => {}
        }
    }

    match (token, secret) {
        (Some(token), Some(secret)) => Ok(TokenPair { token, secret }),
        _ => Err(ApiError::Malformed(format!(
            "token response without oauth_token/oauth_token_secret: {body}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer() -> Consumer {
        Consumer {
            key: "dpf43f3p2l4k3l03".to_string(),
            secret: "kd94hf93k423kf44".to_string(),
        }
    }

    #[test]
    fn test_encode_leaves_only_unreserved() {
        assert_eq!(encode("abcXYZ019-._~"), "abcXYZ019-._~");
        assert_eq!(encode("a b+c/d:e"), "a%20b%2Bc%2Fd%3Ae");
        assert_eq!(encode("あ"), "%E3%81%82");
    }

    #[test]
    fn test_hmac_sha1_known_vector() {
        // RFC 2202 test case 2
        assert_eq!(
            sign("Jefe", "what do ya want for nothing?"),
            "7/zfauXrL6LSdBbV8YTfnCWafHk="
        );
    }

    #[test]
    fn test_signature_base_sorts_and_encodes_params() {
        let url = Url::parse("https://b.hatena.ne.jp/alice/bookmark.rss?tag=a%20b&page=2").unwrap();
        let consumer = consumer();
        let signer = Signer::new(&consumer);
        let params = signer.protocol_params("nonce", 1000);
        let base = signature_base("get", &url, &params);

        assert_eq!(
            base,
            "GET&https%3A%2F%2Fb.hatena.ne.jp%2Falice%2Fbookmark.rss&\
             oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dnonce%26\
             oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1000%26\
             oauth_version%3D1.0%26page%3D2%26tag%3Da%2520b"
        );
    }

    #[test]
    fn test_signature_base_keeps_non_default_port() {
        let url = Url::parse("http://localhost:8080/oauth/initiate").unwrap();
        let base = signature_base("POST", &url, &[]);
        assert_eq!(base, "POST&http%3A%2F%2Flocalhost%3A8080%2Foauth%2Finitiate&");
    }

    #[test]
    fn test_authorization_header_is_deterministic_for_fixed_nonce() {
        let consumer = consumer();
        let token = TokenPair {
            token: "nnch734d00sl2jdk".to_string(),
            secret: "pfkkdhi9sl3r4s00".to_string(),
        };
        let url = Url::parse("http://photos.example.net/photos?file=vacation.jpg&size=original").unwrap();
        let signer = Signer::new(&consumer).token(&token);

        let first = signer.authorization_with("GET", &url, "kllo9940pd9333jh", 1191242096);
        let second = signer.authorization_with("GET", &url, "kllo9940pd9333jh", 1191242096);
        assert_eq!(first, second);
        assert!(first.starts_with("OAuth oauth_consumer_key=\"dpf43f3p2l4k3l03\""));
        assert!(first.contains("oauth_token=\"nnch734d00sl2jdk\""));
        assert!(first.contains("oauth_signature=\"tR3%2BTy81lMeYAr%2FFid0kMTYa%2FWM%3D\""));
    }

    #[test]
    fn test_callback_and_verifier_are_signed() {
        let consumer = consumer();
        let url = Url::parse("https://www.hatena.com/oauth/initiate?scope=read_public").unwrap();
        let header = Signer::new(&consumer)
            .callback("http://127.0.0.1:8080/oauth/callback")
            .verifier("v3r1f13r")
            .authorization("POST", &url);

        assert!(header.contains("oauth_callback=\"http%3A%2F%2F127.0.0.1%3A8080%2Foauth%2Fcallback\""));
        assert!(header.contains("oauth_verifier=\"v3r1f13r\""));
        assert!(!header.contains("oauth_token="));
    }

    #[test]
    fn test_parse_token_response() {
        let pair = parse_token_response(
            "oauth_token=QB%2BfqbD1&oauth_token_secret=secret%3D&oauth_callback_confirmed=true",
        )
        .unwrap();
        assert_eq!(pair.token, "QB+fqbD1");
        assert_eq!(pair.secret, "secret=");
    }

    #[test]
    fn test_parse_token_response_requires_both_fields() {
        let result = parse_token_response("oauth_token=only");
        assert!(matches!(result, Err(ApiError::Malformed(_))));
    }
}
