use alloy_primitives::Address;
use async_trait::async_trait;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use super::{
    schema::{AccountTokenSnapshotsData, GraphQlResponse, ACCOUNT_TOKEN_SNAPSHOTS_QUERY},
    LedgerError,
};
use crate::{rpc::HttpClient, types::LedgerRecord};

/// One page of ledger records.
///
/// `cursor` is the id of the last record of the previous page (`""` for the first
/// page); implementations return records with a strictly greater id, ascending by
/// id, at most `first` of them.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn fetch_page(
        &self,
        token: Address,
        cursor: &str,
        first: usize,
    ) -> Result<Vec<LedgerRecord>, LedgerError>;
}

/// [`LedgerSource`] backed by a GraphQL subgraph endpoint.
pub struct SubgraphClient {
    url: String,
    http_client: Arc<HttpClient>,
    timeout: Duration,
}

impl SubgraphClient {
    #[must_use]
    pub fn new(url: impl Into<String>, http_client: Arc<HttpClient>, timeout: Duration) -> Self {
        Self { url: url.into(), http_client, timeout }
    }
}

#[async_trait]
impl LedgerSource for SubgraphClient {
    async fn fetch_page(
        &self,
        token: Address,
        cursor: &str,
        first: usize,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        // The subgraph stores ids lowercased.
        let token_id = format!("0x{}", hex::encode(token));
        let body = json!({
            "query": ACCOUNT_TOKEN_SNAPSHOTS_QUERY,
            "variables": { "token": token_id, "cursor": cursor, "first": first },
        });
        let body = serde_json::to_vec(&body)
            .map_err(|e| LedgerError::InvalidResponse(format!("failed to encode query: {e}")))?;

        let response_bytes =
            self.http_client.post_json(&self.url, bytes::Bytes::from(body), self.timeout).await?;

        let response: GraphQlResponse<AccountTokenSnapshotsData> =
            serde_json::from_slice(&response_bytes)
                .map_err(|e| LedgerError::InvalidResponse(format!("invalid GraphQL body: {e}")))?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let message =
                errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; ");
            warn!(%token, cursor, error = %message, "ledger reported query errors");
            return Err(LedgerError::GraphQl(message));
        }

        let data = response.data.ok_or(LedgerError::MissingData)?;
        debug!(%token, cursor, records = data.account_token_snapshots.len(), "ledger page received");

        data.account_token_snapshots.into_iter().map(LedgerRecord::try_from).collect()
    }
}
