//! Asynchronous client for the GPS daemon
//!
//! Connects to the daemon over TCP, performs the protocol version handshake,
//! and exposes the fix report stream as an async [`futures_util::Stream`].
//! The stream is non-restartable: it lives for the lifetime of the
//! connection, and a consumer that stops polling it releases the connection.

use futures_util::io::BufReader;

use crate::daemon::protocol::{DecodeReport, Report, Watch};
use crate::{Result, error::BridgeError};

/// Wire protocol definitions and report decoding
pub mod protocol;

/// Protocol major version this client requires
const PROTOCOL_MAJOR: i32 = 3;

/// Client for the GPS daemon's JSON protocol
///
/// # Type Parameters
/// * `Stream` - The underlying async I/O stream type (e.g., TcpStream)
#[derive(Debug)]
pub struct DaemonClient<Stream> {
    reader: BufReader<Stream>,
    buf: Vec<u8>,
}

impl DaemonClient<tokio_util::compat::Compat<tokio::net::TcpStream>> {
    /// Connects to the GPS daemon over TCP
    ///
    /// Dials `addr` (host:port, conventionally port 2947) and performs the
    /// version handshake.
    pub async fn connect(addr: &str) -> Result<Self> {
        use tokio_util::compat::TokioAsyncReadCompatExt;

        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .map_err(BridgeError::Io)?;
        DaemonClient::open(stream.compat()).await
    }
}

impl<Stream> DaemonClient<Stream>
where
    Stream: futures_io::AsyncRead + futures_io::AsyncWrite + Unpin,
{
    /// Opens a client over the provided async stream
    ///
    /// Reads the daemon's version banner and verifies protocol
    /// compatibility before returning.
    pub async fn open(stream: Stream) -> Result<Self> {
        let mut client = DaemonClient {
            reader: BufReader::new(stream),
            buf: Vec::new(),
        };

        client.ensure_version().await?;
        Ok(client)
    }

    /// Sends a command to the daemon
    async fn send(&mut self, command: &str) -> Result<()> {
        use futures_util::AsyncWriteExt;

        self.reader
            .write_all(command.as_bytes())
            .await
            .map_err(BridgeError::Io)
    }

    /// Receives the next report from the daemon
    ///
    /// Returns `None` if the connection is closed.
    async fn recv(&mut self) -> Result<Option<Report>> {
        futures_util::future::poll_fn(|cx| {
            std::pin::Pin::new(&mut self.reader).poll_report(cx, &mut self.buf)
        })
        .await
    }

    /// Ensures the connected daemon speaks a supported protocol version
    ///
    /// The first line the daemon sends after accepting a connection is its
    /// version banner; the major version must match exactly.
    async fn ensure_version(&mut self) -> Result<()> {
        match self.recv().await? {
            Some(Report::Version(version)) => {
                if version.proto_major != PROTOCOL_MAJOR {
                    Err(BridgeError::UnsupportedProtocolVersion((
                        version.proto_major,
                        version.proto_minor,
                    )))
                } else {
                    Ok(())
                }
            }
            Some(_) => Err(BridgeError::Daemon("expected version banner from daemon")),
            None => Err(BridgeError::Daemon(
                "connection closed before version banner",
            )),
        }
    }

    /// Subscribes to the daemon's JSON report stream
    ///
    /// Sends the watch request and consumes the acknowledgement sequence
    /// (a device list followed by the effective watch policy), then hands
    /// the connection over as a [`FixStream`].
    pub async fn watch(mut self) -> Result<FixStream<Stream>> {
        self.send(&protocol::watch_command(&Watch::json())).await?;

        loop {
            match self.recv().await? {
                Some(Report::Watch(watch)) => {
                    if watch.enable != Some(true) {
                        return Err(BridgeError::Daemon("daemon did not enable watch mode"));
                    }
                    break;
                }
                // The device list, and any report that beats the
                // acknowledgement onto the wire.
                Some(_) => continue,
                None => {
                    return Err(BridgeError::Daemon(
                        "connection closed before watch acknowledgement",
                    ));
                }
            }
        }

        Ok(FixStream { inner: self })
    }
}

/// Async stream of daemon reports
///
/// Yields each decoded report as it arrives for the lifetime of the
/// connection; the stream ends when the daemon closes the connection. A
/// line that fails to decode is yielded as an error without ending the
/// stream, so consumers can skip it and keep reading.
#[derive(Debug)]
pub struct FixStream<Stream> {
    inner: DaemonClient<Stream>,
}

impl<Stream> futures_util::Stream for FixStream<Stream>
where
    Stream: futures_io::AsyncRead + Unpin,
{
    type Item = Result<Report>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let reader = std::pin::Pin::new(&mut this.inner.reader);

        match reader.poll_report(cx, &mut this.inner.buf) {
            std::task::Poll::Ready(Ok(Some(report))) => std::task::Poll::Ready(Some(Ok(report))),
            std::task::Poll::Ready(Ok(None)) => std::task::Poll::Ready(None),
            std::task::Poll::Ready(Err(err)) => std::task::Poll::Ready(Some(Err(err))),
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}
