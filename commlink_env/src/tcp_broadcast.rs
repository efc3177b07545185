//! Live broadcast transport: every TCP connection is a listener.
//!
//! Frames are written raw, back to back. The packet tag fixes each frame's
//! length, so the byte stream needs no extra framing.

use crate::error::EnvError;
use crate::network::BroadcastTransport;
use crate::types::ListenerId;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of frames a listener may fall behind before it starts losing them.
pub const DEFAULT_LISTENER_BACKLOG: usize = 4096;

/// Accepts listeners on a TCP port and fans frames out to all of them.
///
/// A slow listener never blocks `broadcast`: its queue is bounded and the
/// oldest frames are discarded once it lags. A fresher value for the same
/// pair arrives on the next tick anyway.
pub struct TcpBroadcaster {
    /// Sender side of the fan-out channel
    tx: broadcast::Sender<Arc<[u8]>>,
    
    /// Live listener count
    listeners: Arc<AtomicUsize>,
    
    /// Address actually bound (port 0 resolves here)
    local_addr: SocketAddr,
    
    /// Accept loop
    accept_task: JoinHandle<()>,
}

impl TcpBroadcaster {
    /// Binds the listening socket and starts accepting listeners.
    ///
    /// Must be called from inside a tokio runtime.
    pub async fn bind(addr: &str, backlog: usize) -> Result<Self, EnvError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| EnvError::bind(addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| EnvError::bind(addr, e))?;
        
        let (tx, _) = broadcast::channel(backlog.max(1));
        let listeners = Arc::new(AtomicUsize::new(0));
        
        let accept_task = tokio::spawn(accept_loop(listener, tx.clone(), Arc::clone(&listeners)));
        info!("Broadcasting to listeners on {}", local_addr);
        
        Ok(Self {
            tx,
            listeners,
            local_addr,
            accept_task,
        })
    }
    
    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl BroadcastTransport for TcpBroadcaster {
    fn broadcast(&self, frame: &[u8]) -> Result<usize, EnvError> {
        // `send` only fails when nobody is subscribed.
        Ok(self.tx.send(Arc::from(frame)).unwrap_or(0))
    }
    
    fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::Relaxed)
    }
}

impl Drop for TcpBroadcaster {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: broadcast::Sender<Arc<[u8]>>,
    listeners: Arc<AtomicUsize>,
) {
    let next_id = AtomicU64::new(0);
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let id = ListenerId(next_id.fetch_add(1, Ordering::Relaxed));
                let _ = stream.set_nodelay(true);
                listeners.fetch_add(1, Ordering::Relaxed);
                info!("{} connected from {}", id, peer);
                tokio::spawn(serve_listener(id, stream, tx.subscribe(), Arc::clone(&listeners)));
            }
            Err(e) => {
                warn!("Accept failed: {}", e);
            }
        }
    }
}

async fn serve_listener(
    id: ListenerId,
    mut stream: TcpStream,
    mut rx: broadcast::Receiver<Arc<[u8]>>,
    listeners: Arc<AtomicUsize>,
) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                if let Err(e) = stream.write_all(&frame).await {
                    debug!("{} dropped: {}", id, e);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("{} lagging, skipped {} frames", id, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    listeners.fetch_sub(1, Ordering::Relaxed);
    info!("{} disconnected", id);
}
