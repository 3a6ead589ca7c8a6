// Datagram listener - binds the UDP port, dispatches each datagram to the
// handler, and runs the background session-expiry sweep.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::handler::Handler;

/// Largest datagram this service will attempt to decode. Anything the OS
/// hands us beyond this was already truncated by the local MTU; we just
/// need a buffer big enough for the widest real packet (a 256-byte SRP
/// value plus framing).
const MAX_DATAGRAM_SIZE: usize = 512;

pub async fn run(
    bind_addr: SocketAddr,
    handler: Arc<Handler>,
    sweep_interval: Duration,
    session_ttl: Duration,
) -> anyhow::Result<()> {
    let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
    tracing::info!("Listening on {}", bind_addr);

    let sweep_handler = handler.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            let removed = sweep_handler.sessions.sweep(session_ttl);
            if removed > 0 {
                tracing::debug!("swept {} expired session(s)", removed);
            }
        }
    });

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, src)) => {
                        let datagram = buf[..len].to_vec();
                        let socket = socket.clone();
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            dispatch(&handler, &socket, &datagram, src).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!("recv_from failed: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received, stopping listener");
                return Ok(());
            }
        }
    }
}

// Each call runs inside its own `tokio::spawn`'d task (see `run` above), so a
// panic here is caught by that task's own unwind boundary, logged by tokio,
// and never brings down the worker.
async fn dispatch(handler: &Handler, socket: &UdpSocket, datagram: &[u8], src: SocketAddr) {
    let source_ip = match src.ip() {
        std::net::IpAddr::V4(v4) => v4.octets(),
        std::net::IpAddr::V6(_) => [0, 0, 0, 0],
    };

    if let Some(reply) = handler.handle(datagram, source_ip).await {
        if let Err(e) = socket.send_to(&reply, src).await {
            tracing::warn!("send_to {} failed: {}", src, e);
        }
    }
}
