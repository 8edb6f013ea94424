//! # TCP Connection
//!
//! Purpose: Own one socket to the server, write encoded commands to it and
//! decode replies from it.
//!
//! ## Design Principles
//! 1. **RAII Close**: Dropping a `Connection` shuts the socket down; a failed
//!    shutdown is logged, never propagated.
//! 2. **Split Halves**: The read half can move to its own thread while the
//!    write half stays with the owner (subscriptions need this).
//! 3. **Direct Writes**: Commands are encoded into a reused buffer and written
//!    with a single `write_all`.

use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::BytesMut;
use cfgsync_common::{Command, RespReader, RespValue};

use crate::config::HostAddr;
use crate::error::{ClientError, ClientResult};

/// Write half of a connection. Shuts the whole socket down on drop.
pub(crate) struct Connection {
    stream: TcpStream,
    host: HostAddr,
    write_buf: BytesMut,
}

impl Connection {
    /// Connects to `host`, trying each resolved address in turn.
    ///
    /// Subscription sockets pass no read timeout and rely on the heartbeat
    /// instead.
    pub(crate) fn open(
        host: &HostAddr,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> ClientResult<(Self, RespReader<TcpStream>)> {
        let stream = connect_stream(host, connect_timeout)?;
        stream.set_read_timeout(read_timeout)?;
        stream.set_write_timeout(write_timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        let reader = RespReader::new(stream.try_clone()?);
        let conn = Connection {
            stream,
            host: host.clone(),
            write_buf: BytesMut::with_capacity(256),
        };
        Ok((conn, reader))
    }

    /// Encodes and writes one command.
    pub(crate) fn send(&mut self, command: &Command) -> ClientResult<()> {
        self.write_buf.clear();
        command.encode_into(&mut self.write_buf);
        self.stream.write_all(&self.write_buf)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Changes the read timeout; applies to the reader half too.
    pub(crate) fn set_read_timeout(&self, timeout: Option<Duration>) -> ClientResult<()> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Shuts the socket down, unblocking any reader on the other half.
    pub(crate) fn shutdown(&self) {
        if let Err(err) = self.stream.shutdown(Shutdown::Both) {
            // NotConnected just means the peer got there first.
            if err.kind() != std::io::ErrorKind::NotConnected {
                tracing::warn!(host = %self.host, error = %err, "close socket failed");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sends `command` and reads exactly one reply.
pub(crate) fn exec(
    conn: &mut Connection,
    reader: &mut RespReader<TcpStream>,
    command: &Command,
) -> ClientResult<RespValue> {
    conn.send(command)?;
    match reader.read_value()? {
        Some(reply) => Ok(reply),
        None => Err(ClientError::Connection(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("connection closed before `{}` reply", command.name()),
        ))),
    }
}

fn connect_stream(host: &HostAddr, timeout: Duration) -> ClientResult<TcpStream> {
    let addrs = (host.hostname(), host.port()).to_socket_addrs()?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(ClientError::Connection(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("`{}` resolved to no addresses", host),
        )
    })))
}
