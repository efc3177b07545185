//! Capturing broadcast transport with fault injection.

use commlink_core::{Packet, ProtocolError};
use commlink_env::{BroadcastTransport, EnvError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory stand-in for the listener socket.
///
/// Cloning shares the capture buffer, so a runner can keep one handle
/// while the emitter owns the other.
#[derive(Clone, Default)]
pub struct SimTransport {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    offline: Arc<AtomicBool>,
    rejected: Arc<AtomicU64>,
    listeners: usize,
}

impl SimTransport {
    /// A transport with one simulated listener.
    pub fn new() -> Self {
        Self {
            listeners: 1,
            ..Default::default()
        }
    }
    
    /// Makes every following broadcast fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
    
    /// Broadcasts refused while offline.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }
    
    pub fn frame_count(&self) -> usize {
        self.lock().len()
    }
    
    /// Removes and returns everything captured so far.
    pub fn take_frames(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.lock())
    }
    
    /// Decodes and drains the capture buffer.
    pub fn take_packets(&self) -> Result<Vec<Packet>, ProtocolError> {
        self.take_frames()
            .iter()
            .map(|frame| Packet::decode(frame).map(|(packet, _)| packet))
            .collect()
    }
    
    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BroadcastTransport for SimTransport {
    fn broadcast(&self, frame: &[u8]) -> Result<usize, EnvError> {
        if self.offline.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(EnvError::network("simulated listener socket offline"));
        }
        self.lock().push(frame.to_vec());
        Ok(self.listeners)
    }
    
    fn listener_count(&self) -> usize {
        self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_capture_and_decode() {
        let transport = SimTransport::new();
        let handle = transport.clone();
        
        transport.broadcast(&Packet::Heartbeat.encode()).unwrap();
        transport.broadcast(&Packet::quality(1, 2, 0.25).encode()).unwrap();
        
        assert_eq!(handle.frame_count(), 2);
        let packets = handle.take_packets().unwrap();
        assert_eq!(packets[0], Packet::Heartbeat);
        assert_eq!(packets[1], Packet::Quality { from: 1, to: 2, quality: 0.5 });
        assert_eq!(handle.frame_count(), 0);
    }
    
    #[test]
    fn test_offline_transport_rejects() {
        let transport = SimTransport::new();
        transport.set_offline(true);
        
        assert!(transport.broadcast(&[b'H']).is_err());
        assert_eq!(transport.rejected(), 1);
        assert_eq!(transport.frame_count(), 0);
        
        transport.set_offline(false);
        assert_eq!(transport.broadcast(&[b'H']).unwrap(), 1);
    }
    
    #[test]
    fn test_malformed_capture_surfaces_protocol_error() {
        let transport = SimTransport::new();
        transport.broadcast(&[b'Z']).unwrap();
        assert_eq!(transport.take_packets(), Err(ProtocolError::UnknownTag(b'Z')));
    }
}
