//! Ledger Mock Builder for GraphQL pagination testing
//!
//! Each page is matched on the `cursor` variable of the request, so a test
//! can tell exactly which pages were requested.

use alloy_primitives::Address;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

use super::test_helpers::lower;

pub struct LedgerMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl LedgerMockBuilder {
    /// Creates a new ledger mock builder with a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    fn page_matcher(token: Address, cursor: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::Regex(format!(r#""cursor"\s*:\s*"{cursor}""#)),
            Matcher::Regex(format!(r#""token"\s*:\s*"{}""#, lower(token))),
        ])
    }

    /// Serves `records` for the page of `token` that starts after `cursor`.
    ///
    /// The page is expected to be requested exactly once.
    pub fn mock_page(&mut self, token: Address, cursor: &str, records: &[Value]) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Self::page_matcher(token, cursor))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "data": { "accountTokenSnapshots": records } }).to_string())
            .expect(1)
            .create();

        self.mocks.push(mock);
        self
    }

    /// Like [`mock_page`](Self::mock_page) but may be requested any number of times.
    pub fn mock_page_repeated(
        &mut self,
        token: Address,
        cursor: &str,
        records: &[Value],
    ) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Self::page_matcher(token, cursor))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "data": { "accountTokenSnapshots": records } }).to_string())
            .expect_at_least(1)
            .create();

        self.mocks.push(mock);
        self
    }

    /// Responds to every query with a GraphQL `errors` list.
    pub fn mock_graphql_error(&mut self, message: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "data": null, "errors": [{ "message": message }] }).to_string())
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks a server error (500) for every query.
    pub fn mock_server_error(&mut self) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .with_status(500)
            .with_body("Internal Server Error")
            .create();

        self.mocks.push(mock);
        self
    }

    /// Verifies every mock was requested the expected number of times.
    #[must_use]
    pub fn verify_all_called(&self) -> bool {
        self.mocks.iter().all(Mock::matched)
    }
}
