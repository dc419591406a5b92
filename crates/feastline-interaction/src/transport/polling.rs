//! HTTP long-polling fallback transport.
//!
//! Each `recv` with an empty buffer issues one GET that the server holds
//! open until it has packets (at worst a ping). Each `send` is one POST.

use super::{Transport, TransportStream};
use crate::codec::{self, EnginePacket};
use crate::endpoint::Endpoint;
use async_trait::async_trait;
use feastline_core::FeastlineError;
use feastline_core::connection::TransportKind;
use feastline_core::error::Result;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct PollingTransport {
    client: reqwest::Client,
}

impl PollingTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn TransportStream>> {
        let url = endpoint.url(TransportKind::Polling, None);
        tracing::debug!("[Channel] Opening polling session {}", url);
        let packets = get_packets(&self.client, url).await?;

        let sid = match packets.first() {
            Some(EnginePacket::Open(info)) => info.sid.clone(),
            other => {
                return Err(FeastlineError::handshake(format!(
                    "expected open packet, got {:?}",
                    other
                )));
            }
        };

        Ok(Box::new(PollingStream {
            client: self.client.clone(),
            endpoint: endpoint.clone(),
            sid,
            buffer: packets.into(),
            closed: false,
        }))
    }
}

async fn get_packets(client: &reqwest::Client, url: reqwest::Url) -> Result<Vec<EnginePacket>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FeastlineError::transport(format!("poll request failed: {}", e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FeastlineError::transport(format!("poll returned HTTP {}", status)));
    }
    let body = response
        .text()
        .await
        .map_err(|e| FeastlineError::transport(format!("poll body unreadable: {}", e)))?;
    codec::decode_payload(&body)
}

struct PollingStream {
    client: reqwest::Client,
    endpoint: Endpoint,
    sid: String,
    buffer: VecDeque<EnginePacket>,
    closed: bool,
}

#[async_trait]
impl TransportStream for PollingStream {
    async fn send(&mut self, packet: EnginePacket) -> Result<()> {
        if self.closed {
            return Err(FeastlineError::ChannelClosed);
        }
        let url = self.endpoint.url(TransportKind::Polling, Some(&self.sid));
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(codec::encode_payload(&[packet]))
            .send()
            .await
            .map_err(|e| FeastlineError::transport(format!("post failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(FeastlineError::transport(format!(
                "post returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>> {
        loop {
            if let Some(packet) = self.buffer.pop_front() {
                if packet == EnginePacket::Close {
                    self.closed = true;
                    return Ok(None);
                }
                return Ok(Some(packet));
            }
            if self.closed {
                return Ok(None);
            }
            let url = self.endpoint.url(TransportKind::Polling, Some(&self.sid));
            self.buffer.extend(get_packets(&self.client, url).await?);
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let url = self.endpoint.url(TransportKind::Polling, Some(&self.sid));
        let _ = self
            .client
            .post(url)
            .body(EnginePacket::Close.encode())
            .send()
            .await;
    }
}
