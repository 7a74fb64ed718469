//! The hyper accept loop behind [`HttpProvider`].
//!
//! Each accepted connection runs on its own task. Per request the server
//! collects the body, acquires a pooled context, binds it to the incoming
//! [`RawRequest`] and a fresh [`ResponseBuffer`], calls the handler and
//! sends the buffer back. The context returns to the pool even when the
//! handler panics, in which case the client receives `500`.
//!
//! Accept errors back off and retry unless the listener itself is broken.
use core::convert::Infallible;
use core::future::Future;
use core::time::Duration;
use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
#[cfg(feature = "tls")]
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
#[cfg(feature = "tls")]
use tokio_rustls::{rustls, TlsAcceptor};

use crate::body::Body;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::provider::{HttpProvider, Provider};
use crate::request::{ConnInfo, RawRequest};
#[cfg(feature = "tls")]
use crate::request::TlsInfo;
use crate::response::ResponseBuffer;
use crate::values::HeaderValues;

type WireResponse = http::Response<Full<Bytes>>;

const MIN_ACCEPT_DELAY: Duration = Duration::from_millis(5);
const MAX_ACCEPT_DELAY: Duration = Duration::from_secs(1);

fn status_response(status: StatusCode) -> WireResponse {
    let mut response = http::Response::new(Full::default());
    *response.status_mut() = status;
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Errors meaning the listener itself is unusable. Anything else, including
/// running out of descriptors or memory, passes once load drops.
fn is_fatal(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::InvalidInput
    )
}

async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr)> {
    accept_with(move || listener.accept()).await
}

/// Calls `next` until it succeeds, sleeping between failed attempts with a
/// delay that doubles from 5ms up to 1s.
async fn accept_with<T, F, Fut>(mut next: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut delay = MIN_ACCEPT_DELAY;
    loop {
        match next().await {
            Ok(conn) => return Ok(conn),
            Err(error) if is_fatal(&error) => return Err(Error::Accept(error)),
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    retry_in_ms = delay.as_millis() as u64,
                    "accept failed"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_ACCEPT_DELAY);
            }
        }
    }
}

async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| Error::Bind {
        addr: addr.to_owned(),
        source,
    })
}

impl HttpProvider {
    /// Serves `handler` on an already bound listener.
    ///
    /// Runs until the listener breaks. Other accept errors are retried.
    pub async fn serve(self: Arc<Self>, listener: TcpListener, handler: impl Handler) -> Result<()> {
        self.serve_shared(listener, Arc::new(handler)).await
    }

    /// Serves `handler` over TLS on an already bound listener.
    ///
    /// A failed handshake only affects its own connection.
    #[cfg(feature = "tls")]
    pub async fn serve_tls(
        self: Arc<Self>,
        listener: TcpListener,
        acceptor: TlsAcceptor,
        handler: impl Handler,
    ) -> Result<()> {
        self.serve_tls_shared(listener, acceptor, Arc::new(handler)).await
    }

    pub(crate) async fn bind_and_serve(
        self: Arc<Self>,
        addr: String,
        handler: Arc<dyn Handler>,
    ) -> Result<()> {
        let listener = bind(&addr).await?;
        self.serve_shared(listener, handler).await
    }

    #[cfg(feature = "tls")]
    pub(crate) async fn bind_and_serve_tls(
        self: Arc<Self>,
        addr: String,
        cert_file: PathBuf,
        key_file: PathBuf,
        handler: Arc<dyn Handler>,
    ) -> Result<()> {
        let acceptor = load_tls_acceptor(&cert_file, &key_file)?;
        let listener = bind(&addr).await?;
        self.serve_tls_shared(listener, acceptor, handler).await
    }

    async fn serve_shared(self: Arc<Self>, listener: TcpListener, handler: Arc<dyn Handler>) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, tls = false, "HTTP provider listening");

        loop {
            let (stream, remote_addr) = accept(&listener).await?;
            let provider = Arc::clone(&self);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let conn = ConnInfo {
                    remote_addr,
                    tls: None,
                };
                provider
                    .serve_connection(TokioIo::new(stream), conn, handler)
                    .await;
            });
        }
    }

    #[cfg(feature = "tls")]
    async fn serve_tls_shared(
        self: Arc<Self>,
        listener: TcpListener,
        acceptor: TlsAcceptor,
        handler: Arc<dyn Handler>,
    ) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, tls = true, "HTTP provider listening");

        loop {
            let (stream, remote_addr) = accept(&listener).await?;
            let provider = Arc::clone(&self);
            let handler = Arc::clone(&handler);
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let stream = match acceptor.accept(stream).await {
                    Ok(stream) => stream,
                    Err(error) => {
                        tracing::debug!(remote_addr = %remote_addr, error = %error, "TLS handshake failed");
                        return;
                    }
                };
                let conn = ConnInfo {
                    remote_addr,
                    tls: Some(Arc::new(tls_info(stream.get_ref().1))),
                };
                provider
                    .serve_connection(TokioIo::new(stream), conn, handler)
                    .await;
            });
        }
    }

    async fn serve_connection<I>(self: Arc<Self>, io: I, conn: ConnInfo, handler: Arc<dyn Handler>)
    where
        I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        let remote_addr = conn.remote_addr;
        let provider = Arc::clone(&self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let provider = Arc::clone(&provider);
            let handler = Arc::clone(&handler);
            let conn = conn.clone();
            async move { Ok::<_, Infallible>(provider.dispatch(request, conn, handler).await) }
        });

        let mut builder = http1::Builder::new();
        builder.keep_alive(self.config().keep_alive).timer(TokioTimer::new());
        if let Some(timeout) = self.config().header_read_timeout {
            builder.header_read_timeout(timeout);
        }
        if let Err(error) = builder.serve_connection(io, service).await {
            tracing::debug!(remote_addr = %remote_addr, error = %error, "connection closed with error");
        }
    }

    async fn dispatch(
        &self,
        request: http::Request<Incoming>,
        conn: ConnInfo,
        handler: Arc<dyn Handler>,
    ) -> WireResponse {
        let (mut parts, incoming) = request.into_parts();
        let limit = self.config().max_body_size;
        let collected = match Limited::new(incoming, limit).collect().await {
            Ok(collected) => collected,
            Err(error) if error.downcast_ref::<LengthLimitError>().is_some() => {
                let error = Error::BodyTooLarge { limit };
                tracing::warn!(remote_addr = %conn.remote_addr, error = %error, "rejecting request");
                return status_response(StatusCode::PAYLOAD_TOO_LARGE);
            }
            Err(error) => {
                tracing::debug!(remote_addr = %conn.remote_addr, error = %error, "failed to read request body");
                return status_response(StatusCode::BAD_REQUEST);
            }
        };

        let trailer = collected.trailers().map(HeaderValues::from);
        let remote_addr = conn.remote_addr;
        parts.extensions.insert(conn);
        let body = Body::from_bytes(collected.to_bytes());
        let mut raw = RawRequest::from_http(http::Request::from_parts(parts, body));
        if let Some(trailer) = trailer {
            raw.trailer = trailer;
        }

        self.respond(raw, &*handler, remote_addr)
    }

    /// Runs `handler` on a pooled context bound to `raw`.
    ///
    /// The handler runs under `catch_unwind`, so the context is released on
    /// every path out of here.
    fn respond(&self, raw: RawRequest, handler: &dyn Handler, remote_addr: SocketAddr) -> WireResponse {
        let mut ctx = self.acquire_context();
        ctx.http_request().set_transport_request(raw);
        ctx.http_response()
            .set_transport_response_writer(ResponseBuffer::new());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&mut *ctx)));
        let response = match outcome {
            Ok(()) => ctx
                .http_response()
                .take_transport_response_writer()
                .unwrap_or_default()
                .into_http(),
            Err(payload) => {
                tracing::error!(
                    remote_addr = %remote_addr,
                    panic = panic_message(&*payload),
                    "handler panicked"
                );
                status_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
        self.release_context(ctx);
        response
    }
}

/// Loads a PEM certificate chain and private key into a [`TlsAcceptor`].
///
/// The acceptor advertises `http/1.1` through ALPN.
#[cfg(feature = "tls")]
pub fn load_tls_acceptor(cert_file: &Path, key_file: &Path) -> Result<TlsAcceptor> {
    use rustls::pki_types::pem::PemObject;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer};

    let tls_error = |path: &Path, reason: String| Error::Tls {
        path: path.to_owned(),
        reason,
    };

    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(cert_file)
        .and_then(|certs| certs.collect())
        .map_err(|error| tls_error(cert_file, error.to_string()))?;
    if certs.is_empty() {
        return Err(tls_error(cert_file, "no certificates found".into()));
    }
    let key = PrivateKeyDer::from_pem_file(key_file)
        .map_err(|error| tls_error(key_file, error.to_string()))?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(feature = "tls")]
fn tls_info(conn: &rustls::ServerConnection) -> TlsInfo {
    TlsInfo {
        protocol_version: conn.protocol_version().map(|version| format!("{version:?}")),
        cipher_suite: conn
            .negotiated_cipher_suite()
            .map(|suite| format!("{:?}", suite.suite())),
        alpn_protocol: conn.alpn_protocol().map(<[u8]>::to_vec),
        server_name: conn.server_name().map(str::to_owned),
        peer_certificates: conn
            .peer_certificates()
            .map(|certs| {
                certs
                    .iter()
                    .map(|cert| Bytes::copy_from_slice(cert.as_ref()))
                    .collect()
            })
            .unwrap_or_default(),
    }
}
