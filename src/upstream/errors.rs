// Failures of external calls made by workflow steps

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    Timeout {
        operation: String,
        duration_ms: u64,
    },
    RateLimited {
        retry_after_secs: Option<u64>,
    },
    Server {
        status: u16,
        message: String,
    },
    Client {
        status: u16,
        message: String,
    },
    NetworkError(String),
    InvalidResponse(String),
}

impl UpstreamError {
    /// Transient failures worth another attempt: timeouts, rate limits,
    /// 5xx responses and dropped connections.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Timeout { .. } => true,
            UpstreamError::RateLimited { .. } => true,
            UpstreamError::Server { .. } => true,
            UpstreamError::NetworkError(_) => true,
            // 408 and 429 are transient even when reported as client errors
            UpstreamError::Client { status, .. } => matches!(status, 408 | 429),
            UpstreamError::InvalidResponse(_) => false,
        }
    }

    /// One line suitable for embedding in a step's inline error.
    pub fn summary(&self) -> String {
        match self {
            UpstreamError::Timeout { operation, duration_ms } => {
                format!("'{operation}' timed out after {duration_ms}ms")
            }
            UpstreamError::RateLimited { retry_after_secs: Some(secs) } => {
                format!("rate limited by the service, retry in {secs}s")
            }
            UpstreamError::RateLimited { retry_after_secs: None } => {
                "rate limited by the service".to_string()
            }
            UpstreamError::Server { status, message } => format!("service error {status}: {message}"),
            UpstreamError::Client { status, message } => format!("request rejected {status}: {message}"),
            UpstreamError::NetworkError(msg) => format!("network error: {msg}"),
            UpstreamError::InvalidResponse(msg) => format!("unexpected response: {msg}"),
        }
    }
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::Timeout { operation, duration_ms } => {
                writeln!(f, "Upstream Operation Timeout")?;
                writeln!(f, "──────────────────────────")?;
                write!(f, "⏰ Operation '{operation}' timed out after {duration_ms}ms\n\n")?;
                writeln!(f, "🔧 RECOMMENDED ACTIONS:")?;
                writeln!(f, "   → Check network connectivity")?;
                write!(f, "   → Raise upstream.timeout_secs if the service is slow")
            }
            UpstreamError::RateLimited { retry_after_secs } => {
                writeln!(f, "Upstream Rate Limit Exceeded")?;
                writeln!(f, "────────────────────────────")?;
                match retry_after_secs {
                    Some(secs) => write!(f, "⏱️  Service asked us to wait {secs}s\n\n")?,
                    None => write!(f, "⏱️  Service rejected the request as too frequent\n\n")?,
                }
                writeln!(f, "🔧 IMMEDIATE SOLUTIONS:")?;
                writeln!(f, "   → Wait and submit the step again")?;
                write!(f, "   → Lower upstream.requests_per_second")
            }
            UpstreamError::Server { status, message } => {
                writeln!(f, "Upstream Service Error")?;
                writeln!(f, "──────────────────────")?;
                write!(f, "🌐 HTTP {status}: {message}\n\n")?;
                writeln!(f, "🔧 TROUBLESHOOTING:")?;
                write!(f, "   → The service failed; earlier steps are unaffected, retry later")
            }
            UpstreamError::Client { status, message } => {
                writeln!(f, "Upstream Request Rejected")?;
                writeln!(f, "─────────────────────────")?;
                write!(f, "🌐 HTTP {status}: {message}\n\n")?;
                writeln!(f, "🔧 TROUBLESHOOTING:")?;
                match status {
                    401 | 403 => write!(f, "   → Check the credentials configured for this service"),
                    404 => write!(f, "   → The requested resource does not exist; check the submitted value"),
                    _ => write!(f, "   → Check the value submitted for this step"),
                }
            }
            UpstreamError::NetworkError(msg) => {
                writeln!(f, "Upstream Network Error")?;
                writeln!(f, "──────────────────────")?;
                write!(f, "🌐 {msg}\n\n")?;
                writeln!(f, "🔧 LOCAL TROUBLESHOOTING:")?;
                writeln!(f, "   → Check internet connectivity")?;
                write!(f, "   → Check proxy and firewall settings")
            }
            UpstreamError::InvalidResponse(msg) => {
                writeln!(f, "Unexpected Upstream Response")?;
                writeln!(f, "────────────────────────────")?;
                write!(f, "📄 {msg}")
            }
        }
    }
}

impl std::error::Error for UpstreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(UpstreamError::Timeout { operation: "x".into(), duration_ms: 10 }.is_retryable());
        assert!(UpstreamError::RateLimited { retry_after_secs: None }.is_retryable());
        assert!(UpstreamError::Server { status: 503, message: "busy".into() }.is_retryable());
        assert!(UpstreamError::NetworkError("reset".into()).is_retryable());
        assert!(UpstreamError::Client { status: 429, message: "slow down".into() }.is_retryable());

        assert!(!UpstreamError::Client { status: 401, message: "no".into() }.is_retryable());
        assert!(!UpstreamError::InvalidResponse("garbage".into()).is_retryable());
    }

    #[test]
    fn test_display_includes_details() {
        let rendered = UpstreamError::Server { status: 502, message: "bad gateway".into() }.to_string();
        assert!(rendered.contains("HTTP 502: bad gateway"));
        assert_eq!(
            UpstreamError::Timeout { operation: "fetch".into(), duration_ms: 250 }.summary(),
            "'fetch' timed out after 250ms"
        );
    }
}
