use std::fmt;

/// PostgREST code for a single-object request that matched zero or many rows.
pub const NO_SINGLE_ROW: &str = "PGRST116";

#[derive(Debug)]
pub enum StoreError {
    MissingConfig(&'static str),
    InvalidConfig(String),
    Timeout,
    ConnectionFailed(String),
    DnsResolution(String),
    ProxyError(String),
    TlsError(String),
    Database {
        status: u16,
        code: Option<String>,
        message: String,
    },
    Decode(String),
    InvalidAirport(String),
    InvalidDate(String),
    Validation(String),
    Operation {
        op: &'static str,
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn during(self, op: &'static str) -> Self {
        Self::Operation {
            op,
            source: Box::new(self),
        }
    }

    /// The error underneath any operation labels.
    pub fn root(&self) -> &StoreError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Self::Database { code: Some(code), .. } if code == NO_SINGLE_ROW
        )
    }

    pub fn no_single_row(rows: usize) -> Self {
        Self::Database {
            status: 406,
            code: Some(NO_SINGLE_ROW.to_string()),
            message: format!(
                "JSON object requested, multiple (or no) rows returned (the result contains {rows} rows)"
            ),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConfig(var) => write!(
                f,
                "missing {var} — set it in the environment before starting"
            ),
            Self::InvalidConfig(detail) => write!(f, "invalid configuration: {detail}"),
            Self::Timeout => write!(
                f,
                "request timed out — the database API may be slow or unreachable. \
                 Try increasing --timeout or check your connection"
            ),
            Self::ConnectionFailed(detail) => write!(
                f,
                "connection failed — check your internet connection ({detail})"
            ),
            Self::DnsResolution(host) => write!(
                f,
                "DNS resolution failed for {host} — check SUPABASE_URL and your connection"
            ),
            Self::ProxyError(detail) => write!(
                f,
                "proxy error — check your --proxy URL is correct ({detail})"
            ),
            Self::TlsError(detail) => write!(
                f,
                "TLS/SSL error — connection to the database API failed ({detail})"
            ),
            Self::Database {
                status,
                code,
                message,
            } => match code {
                Some(code) => write!(f, "{message} (HTTP {status}, {code})"),
                None => write!(f, "{message} (HTTP {status})"),
            },
            Self::Decode(detail) => write!(f, "unexpected response payload — {detail}"),
            Self::InvalidAirport(code) => write!(
                f,
                "invalid airport code \"{code}\" — must be exactly 3 letters (e.g. SGN, HAN, DAD)"
            ),
            Self::InvalidDate(date) => write!(
                f,
                "invalid date \"{date}\" — must be YYYY-MM-DD format (e.g. 2025-08-15)"
            ),
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::Operation { op, source } => write!(f, "error {op}: {source}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Operation { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub fn from_http_error(err: wreq::Error) -> StoreError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();

    if err.is_timeout() {
        return StoreError::Timeout;
    }

    if err.is_connect() {
        if lower.contains("dns") || lower.contains("resolve") || lower.contains("getaddrinfo") {
            return StoreError::DnsResolution(msg);
        }
        return StoreError::ConnectionFailed(msg);
    }

    if lower.contains("proxy") || lower.contains("socks") {
        return StoreError::ProxyError(msg);
    }

    if lower.contains("tls") || lower.contains("ssl") || lower.contains("certificate") {
        return StoreError::TlsError(msg);
    }

    if lower.contains("builder error") && lower.contains("uri") {
        return StoreError::ProxyError(msg);
    }

    StoreError::ConnectionFailed(msg)
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// Decodes a PostgREST error body. Anything that isn't the usual
/// `{code, message, details, hint}` object is kept verbatim as the message.
pub fn from_response_body(status: u16, body: &str) -> StoreError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let mut message = parsed
                .message
                .unwrap_or_else(|| format!("request failed with HTTP {status}"));
            if let Some(details) = parsed.details.filter(|d| !d.is_empty()) {
                message.push_str(&format!(" — {details}"));
            }
            if let Some(hint) = parsed.hint.filter(|h| !h.is_empty()) {
                message.push_str(&format!(" (hint: {hint})"));
            }
            StoreError::Database {
                status,
                code: parsed.code,
                message,
            }
        }
        Err(_) => {
            let trimmed = body.trim();
            StoreError::Database {
                status,
                code: None,
                message: if trimmed.is_empty() {
                    format!("request failed with HTTP {status}")
                } else {
                    trimmed.to_string()
                },
            }
        }
    }
}
