//! InfluxDB 1.x HTTP sink.
//!
//! `POST {url}/write?db=..&rp=..&consistency=..&precision=ms` with a
//! line-protocol body. Any 2xx status is success.

use reqwest::blocking::Client;

use crate::core::errors::{ItelError, Result};
use crate::sink::{BatchPoints, PointSink, SinkIdentity, line_protocol};

/// Blocking HTTP client bound to one endpoint and credential pair.
pub struct InfluxHttpSink {
    write_url: String,
    credentials: Option<(String, String)>,
    http: Client,
}

impl std::fmt::Debug for InfluxHttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxHttpSink")
            .field("write_url", &self.write_url)
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl InfluxHttpSink {
    /// Build a client for `identity`. No request is made until the first write.
    ///
    /// # Errors
    /// `Delivery` when the HTTP client cannot be constructed.
    pub fn connect(identity: &SinkIdentity) -> Result<Self> {
        let http = Client::builder().timeout(identity.timeout).build()?;
        Ok(Self {
            write_url: format!("{}/write", identity.url.trim().trim_end_matches('/')),
            credentials: identity
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
            http,
        })
    }
}

impl PointSink for InfluxHttpSink {
    fn write(&mut self, batch: &BatchPoints) -> Result<()> {
        let body = line_protocol::encode_points(batch.points());
        if body.is_empty() {
            return Ok(());
        }

        let mut request = self
            .http
            .post(&self.write_url)
            .query(&[
                ("db", batch.database.as_str()),
                ("rp", batch.retention_policy.as_str()),
                ("consistency", batch.consistency.as_str()),
                ("precision", "ms"),
            ])
            .body(body);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let resp = request.send()?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = resp.text().unwrap_or_default();
        Err(ItelError::delivery(
            self.endpoint(),
            format!("status {status}: {}", detail.trim()),
        ))
    }

    fn endpoint(&self) -> String {
        self.write_url.clone()
    }
}
