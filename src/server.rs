// src/server.rs
//
// WebSocket listener for the browser control UI.
//
// Accepts one peer at a time and runs the bridge loop for it; the serial
// device is lent to exactly one bridge at any moment, so device access is
// serialized by construction. The socket is adapted to the bridge's text
// channels by a pair of pump tasks.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

use crate::bridge::{run_bridge, BridgeConfig, BridgeEnd};
use crate::io::serial::ByteDevice;
use crate::io::IoError;

/// Capacity of the text channels between the socket pumps and the bridge
const CHANNEL_CAPACITY: usize = 32;

/// Accept WebSocket peers and bridge each one to the serial device.
///
/// Returns `Ok` when the shutdown signal fires and `Err` on a fatal device
/// fault - the device has no resync mechanism, so the process cannot
/// usefully keep listening once it fails.
pub async fn run_server<D: ByteDevice>(
    listener: TcpListener,
    mut device: D,
    config: BridgeConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), IoError> {
    loop {
        let (stream, peer_addr) = tokio::select! {
            res = listener.accept() => match res {
                Ok(conn) => conn,
                Err(e) => {
                    tlog!("[server] Accept failed: {}", e);
                    continue;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
                continue;
            }
        };

        let socket = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                tlog!("[server] WebSocket handshake with {} failed: {}", peer_addr, e);
                continue;
            }
        };

        tlog!("[server] Connected to web interface at {}", peer_addr);

        let (mut ws_sink, mut ws_stream) = socket.split();
        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        // Socket -> bridge. Only text messages carry commands; tungstenite
        // answers pings itself and everything else is ignored.
        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_stream.next().await {
                match msg {
                    Ok(Message::Text(txt)) => {
                        if inbound_tx.send(txt.as_str().to_string()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        // Bridge -> socket. Ends when the bridge drops its sender.
        let writer = tokio::spawn(async move {
            while let Some(line) = outbound_rx.recv().await {
                if ws_sink.send(Message::text(line)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sink.close().await;
        });

        let result = run_bridge(
            &mut device,
            inbound_rx,
            outbound_tx,
            &config,
            shutdown.clone(),
        )
        .await;

        // The reader may still be parked on a live socket (shutdown or
        // device fault); the writer drains and closes once its channel ends.
        reader.abort();
        let _ = writer.await;

        match result {
            Ok(BridgeEnd::PeerClosed) => {
                tlog!("[server] Disconnected from web interface at {}", peer_addr);
            }
            Ok(BridgeEnd::Shutdown) => return Ok(()),
            Err(e) => {
                tlog!("[server] Fatal device fault: {}", e);
                return Err(e);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::device::testing::ScriptedDevice;
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::connect_async;

    async fn start_server(
        device: ScriptedDevice,
    ) -> (std::net::SocketAddr, watch::Sender<bool>, tokio::task::JoinHandle<Result<(), IoError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_server(
            listener,
            device,
            BridgeConfig::default(),
            shutdown_rx,
        ));
        (addr, shutdown_tx, handle)
    }

    #[tokio::test]
    async fn test_end_to_end_command_and_diagnostic() {
        let device = ScriptedDevice::emitting(b"OK\n");
        let written = device.written_handle();
        let (addr, shutdown_tx, handle) = start_server(device).await;

        let (mut socket, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        socket
            .send(Message::text(r#"{"servos":{"0":255}}"#))
            .await
            .unwrap();

        // The drain pass after the command forwards the device line.
        let reply = socket.next().await.unwrap().unwrap();
        assert_eq!(reply, Message::text("OK"));
        assert_eq!(*written.lock().unwrap(), vec![0x02, 0x01, 0xFF, 0xFF]);

        socket.close(None).await.unwrap();
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_server_survives_peer_disconnect() {
        let device = ScriptedDevice::emitting(b"hello\nagain\n");
        let (addr, shutdown_tx, handle) = start_server(device).await;

        // First peer connects, triggers a drain, and leaves.
        let (mut first, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        first
            .send(Message::text(r#"{"servos":{"0":1}}"#))
            .await
            .unwrap();
        assert_eq!(first.next().await.unwrap().unwrap(), Message::text("hello"));
        first.close(None).await.unwrap();

        // Second peer is accepted against the same device.
        let (mut second, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        second
            .send(Message::text(r#"{"servos":{"0":2}}"#))
            .await
            .unwrap();
        assert_eq!(second.next().await.unwrap().unwrap(), Message::text("again"));
        second.close(None).await.unwrap();

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_without_peer() {
        let device = ScriptedDevice::quiet();
        let (_addr, shutdown_tx, handle) = start_server(device).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
