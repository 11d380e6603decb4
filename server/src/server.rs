//! TCP front door: accept loop, one read task per connection, one
//! writer task per session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::driver::disconnect_cleanup;
use crate::error::GameError;
use crate::messaging::MessageSender;
use crate::router::PacketRouter;
use crate::services::Services;
use crate::session::{writer_task, Session};

pub struct GameServer {
    services: Arc<Services>,
    connections: Arc<AtomicUsize>,
}

impl GameServer {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Accepts until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), GameError> {
        let address = format!(
            "{}:{}",
            self.services.config.server.host, self.services.config.server.port
        );
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| GameError::Storage(format!("binding {address}: {e}")))?;
        log::info!("listening on {address}");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let max = self.services.config.server.max_connections;
                            if self.connections.load(Ordering::Relaxed) >= max {
                                log::warn!("connection limit ({max}) reached, dropping {peer}");
                                continue;
                            }
                            self.connections.fetch_add(1, Ordering::Relaxed);
                            log::info!("new connection from {peer}");

                            let services = self.services.clone();
                            let connections = self.connections.clone();
                            tokio::spawn(async move {
                                handle_connection(services, stream, peer).await;
                                connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(err) => log::error!("accept failed: {err}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("listener stopped");
        Ok(())
    }
}

/// Reads frames until the peer closes; one TCP read is one frame.
async fn handle_connection(
    services: Arc<Services>,
    stream: TcpStream,
    peer: std::net::SocketAddr,
) {
    let _ = stream.set_nodelay(true);
    let (mut read_half, write_half) = stream.into_split();

    let outbox_capacity = (services.config.server.buffer_size / 16).max(64);
    let session = Session::new(peer, outbox_capacity);
    let sender = MessageSender::new(session.outbox.clone(), peer.to_string());

    let writer = tokio::spawn(writer_task(session.outbox.clone(), write_half));

    let mut buffer = vec![0u8; services.config.server.buffer_size];
    loop {
        if session.outbox.is_closed() {
            break;
        }
        match read_half.read(&mut buffer).await {
            Ok(0) => {
                log::info!("connection closed by {peer}");
                break;
            }
            Ok(len) => {
                PacketRouter::route(&services, &session, &sender, &buffer[..len]).await;
            }
            Err(err) => {
                log::info!("read error from {peer}: {err}");
                break;
            }
        }
    }

    // TCP close does not broadcast; the QUIT handler already announced
    // when the exit was voluntary.
    disconnect_cleanup(&services, &session, false).await;
    let _ = writer.await;
    log::info!("session for {peer} torn down");
}
