//! WebSocket client for the viewer stream.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;
use uuid::Uuid;

use super::ClientError;
use crate::objects::ws::{WsClientMessage, WsServerMessage};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A connected viewer: one consumer channel on the server.
pub struct ViewerClient {
    socket: Socket,
    channel_id: Option<Uuid>,
}

impl ViewerClient {
    /// Connect to `GET /ws` under `base_url` (an `ws://` or `wss://` URL).
    ///
    /// Waits for the server's `welcome` frame so the channel id is known
    /// before returning.
    pub async fn connect(base_url: &Url) -> Result<Self, ClientError> {
        let url = base_url.join("/ws")?;
        let (socket, _) = connect_async(url.as_str()).await?;
        let mut client = Self {
            socket,
            channel_id: None,
        };
        while client.channel_id.is_none() {
            match client.next_message().await? {
                Some(WsServerMessage::Welcome { channel_id }) => {
                    client.channel_id = Some(channel_id);
                }
                Some(_) => {}
                None => break,
            }
        }
        Ok(client)
    }

    /// The channel the server attached for this connection.
    pub fn channel_id(&self) -> Option<Uuid> {
        self.channel_id
    }

    /// Send a module management request.
    pub async fn send(&mut self, message: &WsClientMessage) -> Result<(), ClientError> {
        let json = serde_json::to_string(message)?;
        self.socket.send(Message::Text(json)).await?;
        Ok(())
    }

    /// Receive the next server message, or `None` once the server closed
    /// the connection.
    pub async fn next_message(&mut self) -> Result<Option<WsServerMessage>, ClientError> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Close the connection, detaching the channel on the server.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}
