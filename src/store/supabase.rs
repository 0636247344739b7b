//! Supabase REST API client using service_role key

use reqwest::Client;
use serde::Serialize;

/// Supabase client for server-side inserts
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, service_role_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Make an authenticated POST request (insert), discarding the row
    pub async fn insert<T: Serialize>(&self, table: &str, data: &T) -> Result<(), StoreError> {
        let url = self.rest_url(table);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(data)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_url_joins_cleanly() {
        let client = SupabaseClient::new("https://example.supabase.co/", "key");
        assert_eq!(
            client.rest_url("match_history"),
            "https://example.supabase.co/rest/v1/match_history"
        );
    }

    #[test]
    fn api_error_message() {
        let err = StoreError::Api {
            status: 409,
            body: "conflict".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 409): conflict");
    }
}
