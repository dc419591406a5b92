//! Channel endpoint URLs derived from configuration.

use crate::codec::ENGINE_IO_VERSION;
use feastline_core::FeastlineError;
use feastline_core::config::ChannelConfig;
use feastline_core::connection::TransportKind;
use feastline_core::error::Result;
use reqwest::Url;

/// Fixed service endpoint of the event channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Builds the endpoint from `channel.base_url` and `channel.path`.
    ///
    /// `ws`/`wss` base URLs are accepted and mapped to `http`/`https`.
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| FeastlineError::config(format!("invalid base_url '{}': {}", config.base_url, e)))?;

        let scheme = match base.scheme() {
            "http" | "ws" => "http",
            "https" | "wss" => "https",
            other => {
                return Err(FeastlineError::config(format!(
                    "unsupported base_url scheme '{}'",
                    other
                )));
            }
        };
        base.set_scheme(scheme)
            .map_err(|_| FeastlineError::config("cannot normalize base_url scheme"))?;

        let path = format!("/{}/", config.path.trim_matches('/'));
        base.set_path(&path);
        base.set_query(None);
        Ok(Self { base })
    }

    /// URL for one transport request, with the session id once known.
    pub fn url(&self, transport: TransportKind, sid: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if transport == TransportKind::Websocket {
            let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
            // http(s) -> ws(s) is always a permitted scheme change
            let _ = url.set_scheme(scheme);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("EIO", &ENGINE_IO_VERSION.to_string());
            query.append_pair("transport", &transport.to_string());
            if let Some(sid) = sid {
                query.append_pair("sid", sid);
            }
        }
        url
    }
}
