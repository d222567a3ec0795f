use crate::dispatcher::Site;
use crate::stream::{encode_response, read_request};
use routex_core::{Request, Response, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Serves a [`Site`] over HTTP/1.1, one request per connection.
///
/// Each request runs with a fresh, empty session: session persistence belongs
/// to whatever host fronts this server.
pub struct SiteServer {
    listener: TcpListener,
    site: Arc<Site>,
}

impl SiteServer {
    pub async fn bind(addr: SocketAddr, site: Arc<Site>) -> std::io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1024)?;

        let listener = TcpListener::from_std(std::net::TcpListener::from(socket))?;
        Ok(Self { listener, site })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener fails.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Serving on http://{}", self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let site = self.site.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, site).await {
                    tracing::debug!("{}: {}", peer, e);
                }
            });
        }
    }
}

/// Answers one request on `stream`.
///
/// If the connection is reset while the response is being computed, the
/// in-flight stages are dropped and nothing is written. A client that only
/// shuts down its write side still receives the response.
pub async fn serve_connection(stream: TcpStream, site: Arc<Site>) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let head = match read_request(&mut reader).await {
        Ok(Some(head)) => head,
        Ok(None) => return Ok(()),
        Err(e) => {
            let bad = encode_response(&Response::with_status(400), false);
            write.write_all(&bad).await?;
            return Err(e);
        }
    };

    let head_only = head.method == "HEAD";
    let response = if head.method != "GET" && !head_only {
        Response::with_status(405)
    } else {
        let mut request = Request::new(head.target.clone());
        let mut peek = [0u8; 1];
        // EOF is a half-close and still gets its response; only a reset
        // connection cancels the request. Any other outcome disables the
        // branch and the dispatch runs to completion.
        tokio::select! {
            response = site.dispatch(&mut request) => response,
            Err(e) = reader.read(&mut peek) => {
                tracing::debug!("{} {}: client went away: {}", head.method, head.target, e);
                return Ok(());
            }
        }
    };

    tracing::debug!("{} {} -> {}", head.method, head.target, response.status);
    write.write_all(&encode_response(&response, head_only)).await?;
    write.shutdown().await
}
