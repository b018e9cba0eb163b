use async_trait::async_trait;
use reqwest::{header, Method, Response};
use url::Url;

use super::types::{ApiError, BookmarkService, Endpoints, MyResponse, USER_AGENT};
use crate::models::bookmark::{BookmarkDetail, BookmarkUpdate, READ_LATER_TAG};
use crate::oauth::{parse_token_response, Consumer, Signer, TokenPair};

pub struct HatenaClient {
    client: reqwest::Client,
    consumer: Consumer,
    scope: String,
    endpoints: Endpoints,
}

impl HatenaClient {
    pub fn new(consumer: Consumer, scope: String) -> Self {
        let client = reqwest::Client::new();

        Self {
            client,
            consumer,
            scope,
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Signs and sends one request. All parameters travel in the query
    /// string and any non-2xx status is an error.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        signer: Signer<'_>,
    ) -> Result<Response, ApiError> {
        let mut url = Url::parse(endpoint)
            .map_err(|e| ApiError::Malformed(format!("bad endpoint {endpoint}: {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        let authorization = signer.authorization(method.as_str(), &url);

        log::debug!("{} {}", method, url);
        let response = self
            .client
            .request(method, url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl BookmarkService for HatenaClient {
    async fn request_token(&self, callback: &str) -> Result<TokenPair, ApiError> {
        let signer = Signer::new(&self.consumer).callback(callback);
        let response = self
            .send(
                Method::POST,
                &self.endpoints.request_token,
                &[("scope", self.scope.as_str())],
                signer,
            )
            .await?;
        parse_token_response(&response.text().await?)
    }

    async fn access_token(&self, request: &TokenPair, verifier: &str) -> Result<TokenPair, ApiError> {
        let signer = Signer::new(&self.consumer).token(request).verifier(verifier);
        let response = self
            .send(Method::POST, &self.endpoints.access_token, &[], signer)
            .await?;
        parse_token_response(&response.text().await?)
    }

    async fn username(&self, token: &TokenPair) -> Result<String, ApiError> {
        let signer = Signer::new(&self.consumer).token(token);
        let endpoint = format!("{}/my", self.endpoints.rest_base);
        let response = self.send(Method::GET, &endpoint, &[], signer).await?;
        let my: MyResponse = response.json().await?;
        Ok(my.name)
    }

    async fn bookmark(&self, token: &TokenPair, url: &str) -> Result<BookmarkDetail, ApiError> {
        let signer = Signer::new(&self.consumer).token(token);
        let endpoint = format!("{}/my/bookmark", self.endpoints.rest_base);
        let response = self
            .send(Method::GET, &endpoint, &[("url", url)], signer)
            .await?;
        Ok(response.json().await?)
    }

    async fn update_bookmark(&self, token: &TokenPair, update: &BookmarkUpdate) -> Result<(), ApiError> {
        let signer = Signer::new(&self.consumer).token(token);
        let endpoint = format!("{}/my/bookmark", self.endpoints.rest_base);
        let mut params = vec![("url", update.url.as_str()), ("comment", update.comment.as_str())];
        params.extend(update.tags.iter().map(|tag| ("tags", tag.as_str())));

        self.send(Method::POST, &endpoint, &params, signer).await?;
        log::info!("Updated bookmark {}", update.url);
        Ok(())
    }

    async fn bookmark_feed(&self, token: &TokenPair, username: &str, page: u32) -> Result<String, ApiError> {
        let signer = Signer::new(&self.consumer).token(token);
        let endpoint = format!("{}/{}/bookmark.rss", self.endpoints.feed_base, username);
        let page = page.to_string();
        let response = self
            .send(Method::GET, &endpoint, &[("tag", READ_LATER_TAG), ("page", page.as_str())], signer)
            .await?;
        Ok(response.text().await?)
    }
}
