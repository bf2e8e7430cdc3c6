//! HTTP middleware for the read API.

pub mod correlation_id;

pub use correlation_id::{
    correlation_span, create_request_id_layers, CorrelationId, UuidRequestIdGenerator,
    X_REQUEST_ID,
};
