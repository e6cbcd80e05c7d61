//! Asynchronous connection.

use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::document::DocumentCodec;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::opts::Opts;
use crate::protocol::serialize::write_message;
use crate::state::parse::ParseState;

use super::stream::Stream;

/// Async connection that sends and receives whole messages.
///
/// Works for either side of the protocol: a client connects with
/// [`Conn::new`], a server wraps accepted sockets with
/// [`Conn::new_with_stream`].
pub struct Conn<C: DocumentCodec> {
    stream: Stream,
    codec: C,
    opts: Opts,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    /// Bytes received past the end of the previous message
    remainder: Vec<u8>,
    next_request_id: i32,
    is_broken: bool,
}

impl<C: DocumentCodec> Conn<C> {
    /// Connect to a server.
    pub async fn new<O: TryInto<Opts>>(opts: O, codec: C) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts = opts.try_into()?;

        let stream = match &opts.socket {
            #[cfg(unix)]
            Some(socket_path) => Stream::unix(UnixStream::connect(socket_path).await?),
            #[cfg(not(unix))]
            Some(_) => return Err(Error::InvalidUsage("unix sockets are not supported".into())),
            None => {
                if opts.host.is_empty() {
                    return Err(Error::InvalidUsage("host is empty".into()));
                }
                let tcp = TcpStream::connect(opts.addr()).await?;
                tcp.set_nodelay(opts.nodelay)?;
                Stream::tcp(tcp)
            }
        };
        tracing::debug!(addr = %opts.addr(), "connected");

        Ok(Self::new_with_stream(stream, opts, codec))
    }

    /// Wrap an existing stream.
    pub fn new_with_stream(stream: Stream, opts: Opts, codec: C) -> Self {
        Self {
            stream,
            codec,
            read_buffer: vec![0; opts.read_chunk_size.max(1)],
            write_buffer: Vec::with_capacity(8192),
            opts,
            remainder: Vec::new(),
            next_request_id: 1,
            is_broken: false,
        }
    }

    /// The document codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Peer address for TCP connections.
    pub fn peer_addr(&self) -> Option<std::net::SocketAddr> {
        self.stream.peer_addr()
    }

    /// Check if the connection is broken.
    pub fn is_broken(&self) -> bool {
        self.is_broken
    }

    /// Allocate a request id for an outgoing message.
    pub fn next_request_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }

    /// Serialize and write a message.
    pub async fn send(&mut self, message: &Message<C::Document>) -> Result<()> {
        let result = self.send_inner(message).await;
        self.track(result)
    }

    async fn send_inner(&mut self, message: &Message<C::Document>) -> Result<()> {
        self.write_buffer.clear();
        let len = write_message(&mut self.write_buffer, message, &self.codec)?;
        tracing::debug!(op_code = %message.op_code(), len, "send");
        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next message.
    ///
    /// Any failure breaks the connection: the bytes read so far are gone with
    /// the parse state, so the stream position is unknown.
    pub async fn recv(&mut self) -> Result<Message<C::Document>> {
        let result = self.recv_inner().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "recv failed; connection is broken");
            self.is_broken = true;
        }
        result
    }

    async fn recv_inner(&mut self) -> Result<Message<C::Document>> {
        let mut state = ParseState::with_remainder(&self.codec, std::mem::take(&mut self.remainder));
        let mut complete = state.feed(&[])?.is_complete();

        while !complete {
            if let Some(header) = state.header() {
                self.opts.check_message_size(header)?;
            }
            let n = self.stream.read(&mut self.read_buffer).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            tracing::trace!(n, "read chunk");
            complete = state.feed(&self.read_buffer[..n])?.is_complete();
        }
        if let Some(header) = state.header() {
            self.opts.check_message_size(header)?;
        }

        let (message, remainder) = state.finish()?;
        self.remainder = remainder;
        tracing::debug!(op_code = %message.op_code(), len = message.header().message_length, "recv");
        Ok(message)
    }

    /// Send a message and read the reply.
    ///
    /// A reply whose `responseTo` does not match the request id is still
    /// returned; it is logged since the peer may be answering out of order.
    pub async fn call(&mut self, message: &Message<C::Document>) -> Result<Message<C::Document>> {
        self.send(message).await?;
        let reply = self.recv().await?;
        if reply.response_to() != message.request_id() {
            tracing::warn!(
                request_id = message.request_id(),
                response_to = reply.response_to(),
                "reply does not match request"
            );
        }
        Ok(reply)
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_connection_broken() {
                self.is_broken = true;
            }
        }
        result
    }
}
