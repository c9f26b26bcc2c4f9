use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::commands::errors::HttpOperationError;
use crate::{cli_utils, router::PROCESS_TIME_HEADER};

/// Default address of a local `rosterd`.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Thin JSON client for the roster HTTP API.
pub struct RosterClient {
    client: Client,
    base_url: String,
}

impl RosterClient {
    /// Creates a client for the server at `base_url`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Constructs a full URL from a path; every roster route ends in a slash.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        format!("{}/{}/", self.base_url, path)
    }

    /// Makes a GET request and handles the response
    pub async fn get<T>(&self, path: &str) -> Result<T, HttpOperationError>
    where
        T: DeserializeOwned,
    {
        self.send("GET", path, self.client.get(self.url(path))).await
    }

    /// Makes a GET request with query parameters
    pub async fn get_with_query<Q, T>(&self, path: &str, query: &Q) -> Result<T, HttpOperationError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send("GET", path, self.client.get(self.url(path)).query(query))
            .await
    }

    /// Makes a POST request with JSON body and handles the response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, HttpOperationError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send("POST", path, self.client.post(self.url(path)).json(body))
            .await
    }

    /// Makes a PUT request with JSON body and handles the response
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, HttpOperationError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send("PUT", path, self.client.put(self.url(path)).json(body))
            .await
    }

    /// Makes a DELETE request; roster returns what was deleted
    pub async fn delete<T>(&self, path: &str) -> Result<T, HttpOperationError>
    where
        T: DeserializeOwned,
    {
        self.send("DELETE", path, self.client.delete(self.url(path)))
            .await
    }

    /// Makes a DELETE request with JSON body
    pub async fn delete_with_body<B, T>(&self, path: &str, body: &B) -> Result<T, HttpOperationError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send("DELETE", path, self.client.delete(self.url(path)).json(body))
            .await
    }

    async fn send<T>(
        &self,
        method: &str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, HttpOperationError>
    where
        T: DeserializeOwned,
    {
        let operation = format!("{} {}", method, self.url(path));
        let response = request
            .send()
            .await
            .map_err(|e| HttpOperationError::new(&operation, &e.to_string()))?;
        self.handle_response(response, &operation).await
    }

    /// Handles HTTP response, deserializing success or returning error
    async fn handle_response<T>(
        &self,
        response: Response,
        operation: &str,
    ) -> Result<T, HttpOperationError>
    where
        T: DeserializeOwned,
    {
        if !response.status().is_success() {
            return Err(HttpOperationError::from_response(response, operation).await);
        }
        if let Some(elapsed) = response.headers().get(PROCESS_TIME_HEADER) {
            tracing::debug!(operation, elapsed = ?elapsed, "server processing time");
        }
        response
            .json()
            .await
            .map_err(|e| HttpOperationError::new(operation, &format!("invalid response: {}", e)))
    }
}

/// Execute an HTTP operation and exit on error with formatted message
pub async fn execute_or_exit<T, F, Fut>(operation: F, context: &str) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, HttpOperationError>>,
{
    match operation().await {
        Ok(result) => result,
        Err(e) => cli_utils::exit_with_handled_error(context, &e),
    }
}
