//! OSC-over-UDP ingress.
//!
//! Receives datagrams, decodes them with `rosc` and feeds every contained
//! message to the [`EventIngest`] processor. Bundles are flattened in
//! order. A datagram that fails to decode yields no events.

use kanau::processor::Processor;
use oscfx_core::events::RawMessage;
use oscfx_core::processors::EventIngest;
use oscfx_sdk::objects::OscArg;
use rosc::{OscPacket, OscType};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct OscIngress {
    socket: UdpSocket,
    ingest: Arc<EventIngest>,
    max_packet_size: usize,
    shutdown_rx: watch::Receiver<bool>,
}

impl OscIngress {
    /// Bind the UDP socket.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to receive OSC packets on
    /// * `ingest` - Processor every decoded message is handed to
    /// * `max_packet_size` - Receive buffer size; longer datagrams are truncated
    /// * `shutdown_rx` - Receiver for shutdown signal
    pub async fn bind(
        addr: SocketAddr,
        ingest: Arc<EventIngest>,
        max_packet_size: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            ingest,
            max_packet_size,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive until shutdown is signalled.
    pub async fn run(mut self) {
        info!(addr = ?self.local_addr().ok(), "OSC ingress started");
        let mut buf = vec![0u8; self.max_packet_size];

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("OSC ingress received shutdown signal");
                        break;
                    }
                }

                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => self.handle_datagram(&buf[..len], peer).await,
                        Err(e) => warn!(error = %e, "Failed to receive OSC datagram"),
                    }
                }
            }
        }

        info!("OSC ingress shutdown complete");
    }

    async fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr) {
        let packet = match rosc::decoder::decode_udp(datagram) {
            Ok((_, packet)) => packet,
            Err(e) => {
                warn!(%peer, error = ?e, "Skipping undecodable OSC datagram");
                return;
            }
        };

        let mut messages = Vec::new();
        flatten_packet(packet, &mut messages);
        debug!(%peer, count = messages.len(), "Received OSC packet");

        for message in messages {
            // Infallible: malformed messages are logged and counted by the ingest.
            let _ = self.ingest.process(message).await;
        }
    }
}

/// Collect every message in `packet`, descending into bundles in order.
pub fn flatten_packet(packet: OscPacket, out: &mut Vec<RawMessage>) {
    match packet {
        OscPacket::Message(message) => {
            let args = message.args.into_iter().map(convert_arg).collect();
            out.push(RawMessage::new(message.addr, args));
        }
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten_packet(inner, out);
            }
        }
    }
}

fn convert_arg(arg: OscType) -> OscArg {
    match arg {
        OscType::Int(v) => OscArg::Int(v.into()),
        OscType::Long(v) => OscArg::Int(v),
        OscType::Float(v) => OscArg::Float(v.into()),
        OscType::Double(v) => OscArg::Float(v),
        OscType::String(v) => OscArg::String(v),
        OscType::Blob(v) => OscArg::Blob(v),
        OscType::Bool(v) => OscArg::Bool(v),
        OscType::Char(c) => OscArg::String(c.to_string()),
        OscType::Nil => OscArg::Nil,
        other => OscArg::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscfx_core::config::HubConfig;
    use oscfx_core::effects::EffectAggregator;
    use oscfx_core::events::ChannelMessage;
    use oscfx_core::processors::BroadcastHub;
    use rosc::{OscBundle, OscMessage};
    use std::time::Duration;

    fn message(addr: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        })
    }

    #[test]
    fn test_flatten_nested_bundles_in_order() {
        let packet = OscPacket::Bundle(OscBundle {
            timetag: (0, 1).into(),
            content: vec![
                message("/Note_1_A_40_5", vec![OscType::Int(1)]),
                OscPacket::Bundle(OscBundle {
                    timetag: (0, 1).into(),
                    content: vec![message("/Note_1_A_41_5", vec![OscType::Double(0.5)])],
                }),
                message("/Note_1_A_42_5", vec![OscType::String("x".into()), OscType::Nil]),
            ],
        });

        let mut out = Vec::new();
        flatten_packet(packet, &mut out);
        let addresses: Vec<_> = out.iter().map(|m| m.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["/Note_1_A_40_5", "/Note_1_A_41_5", "/Note_1_A_42_5"]
        );
        assert_eq!(out[0].args, vec![OscArg::Int(1)]);
        assert_eq!(out[1].args, vec![OscArg::Float(0.5)]);
        assert_eq!(out[2].args, vec![OscArg::String("x".into()), OscArg::Nil]);
    }

    #[tokio::test]
    async fn test_udp_loopback_reaches_channel() {
        let hub = Arc::new(BroadcastHub::new(
            HubConfig::default(),
            Arc::new(EffectAggregator::new()),
        ));
        let mut channel = hub.attach().await;
        let ingest = Arc::new(EventIngest::new(hub.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ingress = OscIngress::bind(
            "127.0.0.1:0".parse().unwrap(),
            ingest.clone(),
            1024,
            shutdown_rx,
        )
        .await
        .unwrap();
        let target = ingress.local_addr().unwrap();
        let task = tokio::spawn(ingress.run());

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"not osc", target).await.unwrap();
        let packet = message("/Note_1_Alice_40_5", vec![OscType::Int(1)]);
        let bytes = rosc::encoder::encode(&packet).unwrap();
        sender.send_to(&bytes, target).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), channel.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            ChannelMessage::Event(event) => {
                assert_eq!(event.address(), "/Note_1_Alice_40_5");
                assert_eq!(event.ref_label(), "Alice");
                assert_eq!(event.args(), &[OscArg::Int(1)]);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
