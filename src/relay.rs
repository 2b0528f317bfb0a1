use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::Method;
use n0_error::{Result, e};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn, warn_span};

use crate::{
    error::RelayError,
    parse::{Authority, HttpRequest},
    prefetch::prefetch_links,
    resolve::{ResolveHost, SystemResolver},
};

/// Response written to clients whose request method is anything but GET.
pub(crate) const REJECTION_RESPONSE: &[u8] = b"HTTP/1.1 500\r\nConnection: close\r\n\r\n\r\n";

/// Configuration for the relay server.
#[derive(derive_more::Debug, Clone, Default)]
pub struct RelayOpts {
    /// Resolver used to prefetch DNS for links found in relayed HTML.
    /// `None` disables prefetching entirely.
    #[debug("{:?}", resolver.as_ref().map(|_| "Arc<dyn ResolveHost>"))]
    pub(crate) resolver: Option<Arc<dyn ResolveHost>>,
}

impl RelayOpts {
    /// Enables prefetching backed by the host's DNS configuration.
    pub fn with_system_resolver() -> Self {
        Self::with_resolver(SystemResolver::new())
    }

    /// Enables prefetching with a custom resolver.
    pub fn with_resolver(resolver: impl ResolveHost + 'static) -> Self {
        Self {
            resolver: Some(Arc::new(resolver)),
        }
    }
}

/// Accepts connections from `listener` and relays each exchange in a new task.
///
/// One task per connection, unbounded; the loop never waits for an exchange
/// to finish before accepting the next. Runs until the listener fails.
/// Dropping the returned future tears down in-flight connection tasks.
pub async fn relay_accept_loop(listener: TcpListener, opts: RelayOpts) -> Result<()> {
    let cancel_token = CancellationToken::new();
    let _cancel_guard = cancel_token.clone().drop_guard();
    let mut conn_id = 0u64;
    loop {
        let (client, peer_addr) = listener.accept().await?;
        conn_id += 1;
        let opts = opts.clone();
        tokio::spawn(
            cancel_token
                .child_token()
                .run_until_cancelled_owned(async move {
                    debug!("new connection from {}", peer_addr);
                    if let Err(err) = relay_exchange(client, &opts).await {
                        warn!("exchange failed: {err:#}");
                    } else {
                        debug!("exchange finished");
                    }
                })
                .instrument(warn_span!("relay-conn", id = %conn_id)),
        );
    }
}

/// Drives one full exchange on an accepted client connection.
///
/// Reads and frames the client request, rejects non-GET methods with a fixed
/// 500 response, dials the origin, forwards a rebuilt request with
/// `Connection: close`, drains the origin to end-of-stream, and writes the
/// response back to the client byte-for-byte. When prefetching is enabled, a
/// detached task receives a copy of the response bytes; delivery to the
/// client never waits on it.
///
/// Both sockets are owned here and closed on every exit path.
pub async fn relay_exchange(mut client: TcpStream, opts: &RelayOpts) -> Result<(), RelayError> {
    let request = HttpRequest::read(&mut client)
        .await
        .map_err(|source| e!(RelayError::Framing { source }))?;
    debug!(method = %request.method, host = %request.host, path = %request.path, "framed request");

    // Policy rejection, not an error: the exchange completes with the fixed
    // 500 response and the origin is never dialed.
    if request.method != Method::GET {
        debug!(method = %request.method, "rejecting non-GET method");
        client
            .write_all(REJECTION_RESPONSE)
            .await
            .map_err(|source| e!(RelayError::Client { source }))?;
        client.shutdown().await.ok();
        return Ok(());
    }

    let authority = Authority::from_host_str(&request.host)
        .map_err(|source| e!(RelayError::Framing { source }))?;
    let mut origin = connect_origin(&authority).await?;
    debug!(%authority, "connected to origin");

    origin
        .write_all(&request.to_origin_bytes())
        .await
        .map_err(|source| e!(RelayError::Origin { source }))?;

    let raw = drain_origin(&mut origin).await;
    debug!(response_len = raw.len(), "drained origin response");

    // The prefetch task shares nothing with this exchange but a cheap
    // read-only copy of the bytes; it never gates delivery.
    if let Some(resolver) = &opts.resolver {
        spawn_prefetch(raw.clone(), resolver.clone());
    }

    client
        .write_all(&raw)
        .await
        .map_err(|source| e!(RelayError::Client { source }))?;
    client.shutdown().await.ok();
    Ok(())
}

/// Opens the origin connection for an exchange. No retry, no timeout.
async fn connect_origin(authority: &Authority) -> Result<TcpStream, RelayError> {
    TcpStream::connect(authority.to_addr()).await.map_err(|source| {
        e!(RelayError::Connect {
            authority: authority.clone(),
            source
        })
    })
}

/// Accumulates the origin's response until end-of-stream.
///
/// A read error after the request was forwarded is treated as end of
/// response: the relay is best-effort and partial data is still delivered.
async fn drain_origin(origin: &mut TcpStream) -> Bytes {
    let mut raw = BytesMut::with_capacity(8 * 1024);
    loop {
        match origin.read_buf(&mut raw).await {
            Ok(0) => break,
            Ok(_) => continue,
            Err(err) => {
                debug!("origin read ended with error: {err}");
                break;
            }
        }
    }
    raw.freeze()
}

fn spawn_prefetch(raw: Bytes, resolver: Arc<dyn ResolveHost>) {
    tokio::spawn(
        async move {
            if let Err(err) = prefetch_links(raw, resolver).await {
                debug!("prefetch aborted: {err:#}");
            }
        }
        .instrument(warn_span!("prefetch")),
    );
}
