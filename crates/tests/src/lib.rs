//! Integration tests for flowsnap.
//!
//! Every test drives the real HTTP clients against `mockito` servers standing in
//! for the ledger's GraphQL endpoint and a JSON-RPC node:
//!
//! - `pipeline_tests`: pagination, reconciliation, verification and publication
//! - `runtime_tests`: runtime wiring, persistence, hydration and schedulers
//! - `api_tests`: the holder read API served from a runtime's store
//! - `config_tests`: layered configuration loading
//! - `mock_infrastructure`: reusable ledger and JSON-RPC mocks
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod pipeline_tests;

#[cfg(test)]
mod runtime_tests;



/// Mock infrastructure for testing
pub mod mock_infrastructure;
