use thiserror::Error;

/// Classification of JSON-RPC errors returned by a node.
///
/// The verifier only retries categories that can succeed on a later attempt:
/// rate limits and provider-side failures. A revert from `balanceOf` means the
/// token contract rejected the call and will keep doing so at the pinned block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorCategory {
    /// Invalid request, method not found, invalid params.
    ClientError,
    /// Internal error or server error not caused by the call itself.
    ProviderError,
    /// Rate limiting at JSON-RPC level (-32005) or limit wording in -32000 messages.
    RateLimit,
    /// Malformed response from the node.
    ParseError,
    /// The call reverted or ran out of gas.
    ExecutionError,
}

impl RpcErrorCategory {
    /// Classifies a JSON-RPC error code and message into a category.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32700: Parse error
    /// - -32600: Invalid Request
    /// - -32601: Method not found
    /// - -32602: Invalid params
    /// - -32603: Internal error
    /// - -32000 to -32099: Server errors (varies by message content)
    /// - -32005: Limit exceeded (rate limiting)
    #[must_use]
    pub fn from_code_and_message(code: i32, message: &str) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32602..=-32600 => Self::ClientError,
            -32603 => Self::ProviderError,
            -32005 => Self::RateLimit,
            -32099..=-32000 => {
                let message_lower = message.to_lowercase();
                if message_lower.contains("execution reverted") ||
                    message_lower.contains("revert") ||
                    message_lower.contains("out of gas")
                {
                    Self::ExecutionError
                } else if message_lower.contains("rate limit") ||
                    message_lower.contains("too many requests") ||
                    message_lower.contains("limit exceeded")
                {
                    Self::RateLimit
                } else {
                    Self::ProviderError
                }
            }
            _ => Self::ProviderError,
        }
    }

    /// Returns `true` if this error category can succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ProviderError)
    }

    /// Returns a static string representation for log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientError => "client_error",
            Self::ProviderError => "provider_error",
            Self::RateLimit => "rate_limit",
            Self::ParseError => "parse_error",
            Self::ExecutionError => "execution_error",
        }
    }
}

/// Errors that can occur when talking to a chain node or the ledger endpoint.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RpcError {
    /// Request exceeded the configured timeout duration.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish a connection to the endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP-level error occurred (non-2xx status code).
    ///
    /// First field is the HTTP status code, second is the (truncated) body.
    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    /// JSON-RPC error returned by the node.
    #[error("RPC error {0}: {1}")]
    RpcError(i32, String),

    /// Network-level error from the underlying HTTP client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response could not be parsed or was malformed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request could not be built or serialized.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP client's concurrency semaphore was closed.
    #[error("Concurrency limit reached: {0}")]
    ConcurrencyLimit(String),
}

impl RpcError {
    /// Returns the RPC error category if this is a JSON-RPC error.
    #[must_use]
    pub fn rpc_category(&self) -> Option<RpcErrorCategory> {
        match self {
            Self::RpcError(code, message) => {
                Some(RpcErrorCategory::from_code_and_message(*code, message))
            }
            _ => None,
        }
    }

    /// Returns `true` if this error is transient and the call should be retried.
    ///
    /// Transient errors include:
    /// - Timeouts and network/connection failures
    /// - HTTP 5xx server errors and HTTP 429 rate limiting
    /// - JSON-RPC rate limit and provider errors
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::ConnectionFailed(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            Self::RpcError(_, _) => self.rpc_category().is_some_and(|cat| cat.is_transient()),
            _ => false,
        }
    }
}
