//! Full-duplex WebSocket transport.

use super::{Transport, TransportStream};
use crate::codec::EnginePacket;
use crate::endpoint::Endpoint;
use async_trait::async_trait;
use feastline_core::FeastlineError;
use feastline_core::connection::TransportKind;
use feastline_core::error::Result;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }

    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn TransportStream>> {
        let url = endpoint.url(TransportKind::Websocket, None);
        tracing::debug!("[Channel] Opening websocket {}", url);
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| FeastlineError::transport(format!("websocket connect failed: {}", e)))?;
        Ok(Box::new(WebSocketStreamAdapter { stream }))
    }
}

struct WebSocketStreamAdapter {
    stream: WsStream,
}

#[async_trait]
impl TransportStream for WebSocketStreamAdapter {
    async fn send(&mut self, packet: EnginePacket) -> Result<()> {
        self.stream
            .send(Message::Text(packet.encode().into()))
            .await
            .map_err(|e| FeastlineError::transport(format!("websocket send failed: {}", e)))
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return EnginePacket::decode(text.as_str()).map(Some),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        tracing::warn!("[Channel] Failed to answer websocket ping: {}", e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .as_ref()
                        .map(|f| format!("code: {}, reason: {}", f.code, f.reason))
                        .unwrap_or_else(|| "no reason".to_string());
                    tracing::debug!("[Channel] Websocket closed by server: {}", reason);
                    return Ok(None);
                }
                // Socket.IO binary attachments and raw frames are not used
                Some(Ok(Message::Binary(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    return Err(FeastlineError::transport(format!("websocket error: {}", e)));
                }
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self
            .stream
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "client disconnect".into(),
            })))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feastline_core::config::ChannelConfig;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const OPEN: &str = r#"0{"sid":"ws1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

    #[tokio::test]
    async fn test_exchanges_text_frames_until_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            ws.send(Message::Text(OPEN.into())).await.unwrap();
            ws.send(Message::Text("2".into())).await.unwrap();

            let reply = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => break text.to_string(),
                    Some(Ok(_)) => continue,
                    other => panic!("expected a text reply, got {:?}", other),
                }
            };
            ws.close(None).await.unwrap();
            reply
        });

        let config = ChannelConfig {
            base_url: format!("http://{}", addr),
            ..Default::default()
        };
        let endpoint = Endpoint::from_config(&config).unwrap();
        let mut stream = WebSocketTransport::new().connect(&endpoint).await.unwrap();

        let Some(EnginePacket::Open(info)) = stream.recv().await.unwrap() else {
            panic!("expected open packet first");
        };
        assert_eq!(info.sid, "ws1");
        assert_eq!(stream.recv().await.unwrap(), Some(EnginePacket::Ping(None)));

        stream.send(EnginePacket::Pong(None)).await.unwrap();
        assert_eq!(stream.recv().await.unwrap(), None);
        assert_eq!(server.await.unwrap(), "3");
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ChannelConfig {
            base_url: format!("http://{}", addr),
            ..Default::default()
        };
        let endpoint = Endpoint::from_config(&config).unwrap();
        let err = WebSocketTransport::new().connect(&endpoint).await.err().unwrap();
        assert!(matches!(err, FeastlineError::Transport(_)), "{:?}", err);
    }
}
