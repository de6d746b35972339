//! Non-blocking datagram sources for input frames.
//!
//! The input session only ever sees the [`FrameSource`] trait: one call, one
//! datagram, `Ok(None)` when nothing is waiting. Datagrams are fire-and-forget;
//! there are no acks and nothing is buffered across ticks.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Largest accepted datagram payload; larger sends are truncated by the socket.
pub const MAX_FRAME_LEN: usize = 512;

// Transport setup errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("can't bind to port {port}: {source}")]
    UdpBind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("can't bind unix socket at {path}: {source}")]
    UnixBind {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A non-blocking supplier of raw input frames.
///
/// `poll_frame` fills `buf` with at most one datagram and returns its length.
/// `Ok(None)` means no data right now; it is the normal idle result, never an
/// error. Implementations must not block.
pub trait FrameSource: Send {
    fn poll_frame(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

/// UDP datagram source bound to the wildcard address.
pub struct UdpFrameSource {
    socket: UdpSocket,
}

impl UdpFrameSource {
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        // prefer v6 wildcard (usually dual-stack), fall back to v4
        let candidates = [
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        ];

        let socket = UdpSocket::bind(&candidates[..])
            .map_err(|source| TransportError::UdpBind { port, source })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| TransportError::UdpBind { port, source })?;

        info!("successfully bound to port {}", port);
        Ok(Self { socket })
    }
}

impl FrameSource for UdpFrameSource {
    fn poll_frame(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv(buf) {
            Ok(len) => {
                debug!("received {} byte datagram", len);
                Ok(Some(len))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Unix datagram source at a filesystem path.
pub struct UnixFrameSource {
    socket: UnixDatagram,
    path: PathBuf,
}

impl UnixFrameSource {
    pub fn bind_at(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();

        // a stale socket file from a previous run blocks the bind
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("could not remove stale socket {}: {}", path.display(), e);
            }
        }

        let socket = UnixDatagram::bind(&path).map_err(|source| TransportError::UnixBind {
            path: path.display().to_string(),
            source,
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| TransportError::UnixBind {
                path: path.display().to_string(),
                source,
            })?;

        info!("successfully bound unix socket at {}", path.display());
        Ok(Self { socket, path })
    }
}

impl FrameSource for UnixFrameSource {
    fn poll_frame(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv(buf) {
            Ok(len) => Ok(Some(len)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for UnixFrameSource {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// In-memory FIFO source for tests and captured-traffic replays.
#[derive(Debug, Default)]
pub struct QueueFrameSource {
    frames: VecDeque<Vec<u8>>,
}

impl QueueFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: impl Into<Vec<u8>>) {
        self.frames.push_back(frame.into());
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for QueueFrameSource {
    fn poll_frame(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.frames.pop_front() {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(Some(len))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_source_is_fifo_and_reports_empty() {
        let mut source = QueueFrameSource::new();
        source.push(b"first".as_slice());
        source.push(b"second".as_slice());

        let mut buf = [0u8; MAX_FRAME_LEN];
        assert_eq!(source.poll_frame(&mut buf).unwrap(), Some(5));
        assert_eq!(&buf[..5], b"first");
        assert_eq!(source.poll_frame(&mut buf).unwrap(), Some(6));
        assert_eq!(&buf[..6], b"second");
        assert_eq!(source.poll_frame(&mut buf).unwrap(), None);
    }

    #[test]
    fn udp_source_round_trip_without_blocking() {
        // port 0 asks the OS for a free port
        let mut source = UdpFrameSource::bind(0).expect("bind failed");
        let local = source.socket.local_addr().unwrap();

        let mut buf = [0u8; MAX_FRAME_LEN];
        assert_eq!(source.poll_frame(&mut buf).unwrap(), None);

        // talk over whichever loopback family the wildcard bind picked
        let (sender_addr, target): (SocketAddr, SocketAddr) = if local.is_ipv4() {
            (
                (Ipv4Addr::LOCALHOST, 0).into(),
                (Ipv4Addr::LOCALHOST, local.port()).into(),
            )
        } else {
            (
                (Ipv6Addr::LOCALHOST, 0).into(),
                (Ipv6Addr::LOCALHOST, local.port()).into(),
            )
        };
        let sender = UdpSocket::bind(sender_addr).unwrap();
        sender.send_to(b"button 1 WIIMOTE_A", target).unwrap();

        // datagram delivery on loopback is fast but not instantaneous
        let mut received = None;
        for _ in 0..100 {
            if let Some(len) = source.poll_frame(&mut buf).unwrap() {
                received = Some(len);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(received, Some(18));
        assert_eq!(&buf[..18], b"button 1 WIIMOTE_A");
    }
}
