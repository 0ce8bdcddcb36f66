//! Transport abstraction: any byte-oriented channel.
//!
//! Concrete implementations:
//! - TCP socket to the classifier peer ([`TcpTransport`])
//! - scripted peers in the integration tests
//!
//! The classification channel is generic over `Transport`, so adding a
//! new transport requires zero changes to the request/response logic.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use log::info;

/// Byte-oriented transport channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write as much of `data` as the transport takes right now.
    /// Returns the number of bytes actually written, 0 if it is full.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Whether the peer is still there. A transport that cannot tell
    /// reports `true`.
    fn is_connected(&self) -> bool {
        true
    }
}

// ───────────────────────────────────────────────────────────────
// TCP
// ───────────────────────────────────────────────────────────────

/// Non-blocking TCP connection to a single classifier peer.
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    connected: bool,
}

impl TcpTransport {
    /// Listen on `listen_addr` and block until one peer connects.
    pub fn accept(listen_addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(listen_addr)?;
        info!("Classifier link: waiting for peer on {}", listener.local_addr()?);
        let (stream, peer) = listener.accept()?;
        Self::from_stream(stream, peer)
    }

    /// Connect out to a peer that is already listening.
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let peer = stream.peer_addr()?;
        Self::from_stream(stream, peer)
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        info!("Classifier link: peer {} connected", peer);
        Ok(Self {
            stream,
            peer,
            connected: true,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    type Error = io::Error;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        match self.stream.read(buf) {
            Ok(0) if !buf.is_empty() => {
                info!("Classifier link: peer {} closed the connection", self.peer);
                self.connected = false;
                Err(io::ErrorKind::UnexpectedEof.into())
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                self.connected = false;
                Err(e)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        loop {
            match self.stream.write(data) {
                Ok(0) if !data.is_empty() => {
                    self.connected = false;
                    return Err(io::ErrorKind::WriteZero.into());
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.connected = false;
                    return Err(e);
                }
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.flush() {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            other => other,
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
