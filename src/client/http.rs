//! HTTP client for the notebox API.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;

use super::{ClientError, RemoteNoteService};
use crate::config::ClientConfig;
use crate::models::*;

/// HTTP client for the notes API.
#[derive(Debug, Clone)]
pub struct NoteClient {
    base_url: String,
    session: Option<String>,
    client: Client,
}

impl NoteClient {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_url.clone(), config.session.clone())
    }

    pub fn new(base_url: impl Into<String>, session: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            client: Client::new(),
        }
    }

    /// Build a request carrying the session token, if any.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref token) = self.session {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    /// For endpoints answering 204 No Content.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), ClientError> {
        error_for_status(response).await.map(|_| ())
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(body),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::BadRequest(body),
        StatusCode::CONFLICT => ClientError::Conflict(body),
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        _ => ClientError::Server(format!("{}: {}", status, body)),
    })
}

#[async_trait]
impl RemoteNoteService for NoteClient {
    async fn get_all(&self) -> Result<Vec<Note>, ClientError> {
        let response = self.request(Method::GET, "/notes").send().await?;
        self.handle_response(response).await
    }

    async fn create(&self, input: &CreateNoteInput) -> Result<Note, ClientError> {
        let response = self
            .request(Method::POST, "/notes")
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn update(&self, id: &str, input: &UpdateNoteInput) -> Result<Note, ClientError> {
        let response = self
            .request(Method::PUT, &format!("/notes/{}", id))
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn trash(&self, id: &str) -> Result<Note, ClientError> {
        let response = self
            .request(Method::POST, &format!("/notes/{}/trash", id))
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn delete_one_trashed(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .request(Method::DELETE, &format!("/notes/{}", id))
            .send()
            .await?;
        self.handle_empty_response(response).await
    }

    async fn delete_all_trashed(&self) -> Result<usize, ClientError> {
        let response = self.request(Method::DELETE, "/trash").send().await?;
        let deleted: DeletedCount = self.handle_response(response).await?;
        Ok(deleted.count)
    }
}
