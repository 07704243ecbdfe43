//! TCP endpoints
//!
//! A bound endpoint runs an accept loop and spawns one reader and one writer
//! task per peer. A connected endpoint runs one reader and one writer task.
//! All tasks stop once the owning [`Link`] is dropped; writers first flush
//! what is already queued and hold a [`WriterToken`] until they are done.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use crate::envelope::{Envelope, Identity, Kind};

use super::codec;
use super::error::TransportError;
use super::link::Link;
use super::writers::WriterToken;

const READ_BUFFER_SIZE: usize = 64 * 1024;

type PeerMap = Arc<RwLock<HashMap<Identity, mpsc::Sender<Envelope>>>>;

/// Listen for peers; inbound envelopes are tagged with the sender's identity
///
/// Returns the link and the actual local address (useful with port 0).
pub async fn bind(
    addr: SocketAddr,
    capacity: usize,
    token: WriterToken,
) -> Result<(Link, SocketAddr), TransportError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| unavailable(addr, source))?;
    let local = listener
        .local_addr()
        .map_err(|source| unavailable(addr, source))?;

    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    let peers: PeerMap = Arc::new(RwLock::new(HashMap::new()));

    tokio::spawn(accept_loop(listener, inbound_tx, Arc::clone(&peers), capacity, token));
    tokio::spawn(route_outbound(outbound_rx, peers));

    Ok((Link::new(outbound_tx, inbound_rx), local))
}

/// Connect to a single peer
pub async fn connect(addr: &str, capacity: usize, token: WriterToken) -> Result<Link, TransportError> {
    let socket = TcpStream::connect(addr)
        .await
        .map_err(|source| unavailable(addr, source))?;
    if let Err(e) = socket.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
    }

    let (reader, writer) = socket.into_split();
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

    let label = addr.to_string();
    tokio::spawn(write_frames(writer, outbound_rx, label.clone(), token));
    tokio::spawn(async move {
        read_frames(reader, None, &inbound_tx, &label).await;
        tracing::info!(peer = %label, "Upstream closed");
    });

    Ok(Link::new(outbound_tx, inbound_rx))
}

/// Listen for one consumer of a raw byte stream
///
/// Bytes queued before the consumer connects wait in the sink's queue.
pub async fn bind_raw(
    addr: SocketAddr,
    capacity: usize,
    token: WriterToken,
) -> Result<(mpsc::Sender<Bytes>, SocketAddr), TransportError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| unavailable(addr, source))?;
    let local = listener
        .local_addr()
        .map_err(|source| unavailable(addr, source))?;

    let (tx, rx) = mpsc::channel(capacity);
    tokio::spawn(async move {
        match listener.accept().await {
            Ok((socket, peer_addr)) => {
                tracing::info!(peer = %peer_addr, "Raw consumer connected");
                write_raw(socket, rx, token).await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to accept raw consumer"),
        }
    });

    Ok((tx, local))
}

/// Connect to a consumer of a raw byte stream
pub async fn connect_raw(
    addr: &str,
    capacity: usize,
    token: WriterToken,
) -> Result<mpsc::Sender<Bytes>, TransportError> {
    let socket = TcpStream::connect(addr)
        .await
        .map_err(|source| unavailable(addr, source))?;

    let (tx, rx) = mpsc::channel(capacity);
    tokio::spawn(write_raw(socket, rx, token));
    Ok(tx)
}

fn unavailable(addr: impl ToString, source: std::io::Error) -> TransportError {
    TransportError::Unavailable {
        address: addr.to_string(),
        source,
    }
}

async fn accept_loop(
    listener: TcpListener,
    inbound: mpsc::Sender<Envelope>,
    peers: PeerMap,
    capacity: usize,
    token: WriterToken,
) {
    let mut next_peer_id: u64 = 1;

    loop {
        let accepted = tokio::select! {
            _ = inbound.closed() => break,
            accepted = listener.accept() => accepted,
        };

        let (socket, peer_addr) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        let identity = Identity::from(format!("{}#{}", peer_addr, next_peer_id));
        next_peer_id += 1;

        let (reader, writer) = socket.into_split();
        let (peer_tx, peer_rx) = mpsc::channel(capacity);
        peers.write().await.insert(identity.clone(), peer_tx);

        tracing::debug!(peer = %identity, "Peer connected");

        tokio::spawn(write_frames(writer, peer_rx, identity.to_string(), token.clone()));

        let inbound = inbound.clone();
        let peers = Arc::clone(&peers);
        tokio::spawn(async move {
            let label = identity.to_string();
            read_frames(reader, Some(&identity), &inbound, &label).await;

            peers.write().await.remove(&identity);
            tracing::debug!(peer = %identity, "Peer disconnected");

            let gone = Envelope::addressed(Kind::DeleteWorker, identity, Bytes::new());
            let _ = inbound.send(gone).await;
        });
    }

    tracing::debug!("Accept loop stopped");
}

async fn route_outbound(mut outbound: mpsc::Receiver<Envelope>, peers: PeerMap) {
    while let Some(envelope) = outbound.recv().await {
        match envelope.identity().ok().cloned() {
            Some(identity) => {
                let peer = peers.read().await.get(&identity).cloned();
                match peer {
                    Some(tx) => deliver(&tx, &identity, envelope),
                    None => {
                        tracing::warn!(
                            peer = %identity,
                            kind = %envelope.kind(),
                            "Unknown peer, envelope lost"
                        );
                    }
                }
            }
            None => {
                let targets: Vec<_> = peers
                    .read()
                    .await
                    .iter()
                    .map(|(id, tx)| (id.clone(), tx.clone()))
                    .collect();
                for (identity, tx) in targets {
                    deliver(&tx, &identity, envelope.clone());
                }
            }
        }
    }

    // Closing every peer queue lets the writers flush and exit
    peers.write().await.clear();
}

/// Hand an envelope to one peer writer; a slow peer never stalls the others
fn deliver(tx: &mpsc::Sender<Envelope>, identity: &Identity, envelope: Envelope) {
    let kind = envelope.kind();
    match tx.try_send(envelope) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            tracing::warn!(peer = %identity, kind = %kind, "Peer queue full, envelope lost");
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(peer = %identity, kind = %kind, "Peer writer gone, envelope lost");
        }
    }
}

async fn read_frames<R>(
    mut reader: R,
    identity: Option<&Identity>,
    inbound: &mpsc::Sender<Envelope>,
    label: &str,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

    loop {
        loop {
            match codec::decode(&mut buf) {
                Ok(Some(envelope)) => {
                    let envelope = match identity {
                        Some(id) => envelope.with_identity(id.clone()),
                        None => envelope,
                    };
                    if inbound.send(envelope).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(peer = %label, error = %e, "Dropping peer after bad frame");
                    return;
                }
            }
        }

        match reader.read_buf(&mut buf).await {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(peer = %label, error = %e, "Read failed");
                return;
            }
        }
    }
}

async fn write_frames<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<Envelope>,
    label: String,
    _token: WriterToken,
) where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();

    while let Some(envelope) = rx.recv().await {
        buf.clear();
        if let Err(e) = codec::encode(&envelope, &mut buf) {
            tracing::warn!(peer = %label, error = %e, "Envelope not encodable, skipped");
            continue;
        }
        if let Err(e) = writer.write_all(&buf).await {
            tracing::debug!(peer = %label, error = %e, "Write failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

async fn write_raw<W>(mut writer: W, mut rx: mpsc::Receiver<Bytes>, _token: WriterToken)
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = rx.recv().await {
        if let Err(e) = writer.write_all(&chunk).await {
            tracing::warn!(error = %e, "Raw sink write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}
