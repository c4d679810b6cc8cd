use crate::domain::expense::{ExpenseFields, ExpenseRecord};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors observed by the client. Any of these degrade a mutation to the
/// offline path; `Api` carries the server's status for callers that care
/// (a 404 on delete means the record is already gone).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Remote expense endpoints, abstracted so the sync cache can be exercised
/// against a fake in tests.
#[async_trait]
pub trait ExpenseApi: Send + Sync {
    async fn list(&self) -> Result<Vec<ExpenseRecord>, ClientError>;
    async fn create(&self, fields: &ExpenseFields) -> Result<ExpenseRecord, ClientError>;
    async fn update(&self, id: &str, fields: &ExpenseFields)
    -> Result<ExpenseRecord, ClientError>;
    async fn delete(&self, id: &str) -> Result<(), ClientError>;
}

#[derive(Deserialize)]
struct ListEnvelope {
    expenses: Vec<ExpenseRecord>,
}

#[derive(Deserialize)]
struct ExpenseEnvelope {
    expense: ExpenseRecord,
}

/// HTTP implementation against the server in `presentation`, one bearer token
/// per authenticated session.
pub struct HttpExpenseApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpExpenseApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Api { status, message })
    }
}

#[async_trait]
impl ExpenseApi for HttpExpenseApi {
    async fn list(&self) -> Result<Vec<ExpenseRecord>, ClientError> {
        let response = self
            .client
            .get(format!("{}/expenses", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let envelope: ListEnvelope = Self::check(response).await?.json().await?;
        Ok(envelope.expenses)
    }

    async fn create(&self, fields: &ExpenseFields) -> Result<ExpenseRecord, ClientError> {
        let response = self
            .client
            .post(format!("{}/expenses", self.base_url))
            .bearer_auth(&self.token)
            .json(fields)
            .send()
            .await?;
        let envelope: ExpenseEnvelope = Self::check(response).await?.json().await?;
        Ok(envelope.expense)
    }

    async fn update(
        &self,
        id: &str,
        fields: &ExpenseFields,
    ) -> Result<ExpenseRecord, ClientError> {
        let response = self
            .client
            .put(format!("{}/expenses/{}", self.base_url, id))
            .bearer_auth(&self.token)
            .json(fields)
            .send()
            .await?;
        let envelope: ExpenseEnvelope = Self::check(response).await?.json().await?;
        Ok(envelope.expense)
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(format!("{}/expenses/{}", self.base_url, id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
