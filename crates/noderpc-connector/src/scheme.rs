//! Transport selection by endpoint URL scheme.

use noderpc_core::error::ClientError;
use url::Url;

const WS_SCHEMES: &[&str] = &["ws", "wss"];
const HTTP_SCHEMES: &[&str] = &["", "http", "https"];

/// Transport family shared by every endpoint of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Ws,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Ws => write!(f, "ws"),
        }
    }
}

/// Scheme of `url`, `""` when it has none.
fn scheme_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.scheme().to_string(),
        Err(_) => String::new(),
    }
}

/// The single transport family all `urls` agree on.
pub fn detect_scheme<S: AsRef<str>>(urls: &[S]) -> Result<Scheme, ClientError> {
    let mut is_ws = false;
    let mut is_http = false;
    for url in urls {
        let scheme = scheme_of(url.as_ref());
        is_ws |= WS_SCHEMES.contains(&scheme.as_str());
        is_http |= HTTP_SCHEMES.contains(&scheme.as_str());
    }
    match (is_http, is_ws) {
        (true, false) => Ok(Scheme::Http),
        (false, true) => Ok(Scheme::Ws),
        _ => Err(ClientError::InvalidNodeSchemes(
            "all nodes must use one scheme family: http(s) or ws(s)".into(),
        )),
    }
}

/// Give scheme-less HTTP endpoints an explicit `http://` prefix.
pub fn normalize(url: &str) -> String {
    if scheme_of(url).is_empty() {
        format!("http://{url}")
    } else {
        url.to_string()
    }
}
