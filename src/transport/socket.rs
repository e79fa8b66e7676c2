//! Blocking TCP sockets for channel connections.
use std::{
    fmt,
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    time::Duration,
};

use super::TransportError;

/// A connected TCP stream.
///
/// [`Socket::send`] and [`Socket::receive`] always transfer the whole buffer, retrying
/// after partial writes and reads.
#[derive(Debug)]
pub struct Socket {
    stream: TcpStream,
}

impl Socket {
    /// Connect to the first reachable address of `addr`.
    pub fn connect<A: ToSocketAddrs + fmt::Debug>(
        addr: A,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let connect_err = |source| TransportError::Connect {
            addr: format!("{addr:?}"),
            source,
        };
        let mut last_err = None;
        for resolved in addr.to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&resolved, timeout) {
                Ok(stream) => return Ok(Self { stream }),
                Err(err) => last_err = Some(err),
            }
        }
        Err(connect_err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        })))
    }

    /// Write all of `buf`.
    pub fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(buf)?;
        Ok(())
    }

    /// Fill all of `buf`.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.stream.read_exact(buf)?;
        Ok(())
    }

    /// A second handle to the same connection.
    pub fn try_clone(&self) -> Result<Self, TransportError> {
        Ok(Self {
            stream: self.stream.try_clone()?,
        })
    }

    /// Shut down the read, write or both halves of the connection.
    pub fn shutdown(&self, how: Shutdown) -> Result<(), TransportError> {
        self.stream.shutdown(how)?;
        Ok(())
    }

    /// See [`TcpStream::set_nodelay`].
    pub fn set_nodelay(&self, nodelay: bool) -> Result<(), TransportError> {
        self.stream.set_nodelay(nodelay)?;
        Ok(())
    }

    /// See [`TcpStream::set_read_timeout`].
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// See [`TcpStream::set_write_timeout`].
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Address of the peer.
    pub fn peer_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.stream.peer_addr()?)
    }

    /// Local address of the connection.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.stream.local_addr()?)
    }
}

impl From<TcpStream> for Socket {
    fn from(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// A bound TCP listener accepting channel connections.
#[derive(Debug)]
pub struct SocketListener {
    listener: TcpListener,
}

impl SocketListener {
    /// Bind to `addr`. Use port 0 to let the OS pick a free port.
    pub fn bind<A: ToSocketAddrs + fmt::Debug>(addr: A) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(&addr).map_err(|source| TransportError::Bind {
            addr: format!("{addr:?}"),
            source,
        })?;
        Ok(Self { listener })
    }

    /// Block until a peer connects.
    pub fn accept(&self) -> Result<Socket, TransportError> {
        let (stream, _) = self.listener.accept().map_err(TransportError::Accept)?;
        Ok(Socket { stream })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}
