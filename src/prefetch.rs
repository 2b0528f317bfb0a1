use std::sync::Arc;

use bytes::Bytes;
use n0_error::{StackResultExt, e};
use tracing::{debug, trace};
use url::Url;

use crate::{
    decode::decode_body,
    error::PrefetchError,
    html::anchor_hrefs,
    parse::HttpResponse,
    resolve::ResolveHost,
};

/// The only media type that qualifies a response for link prefetching.
const HTML_MEDIA_TYPE: &str = "text/html";

/// Inspects a relayed response and resolves the hostnames its links point at.
///
/// Runs on its own task with a read-only copy of the response bytes; nothing
/// here can affect the exchange that captured them. Responses that are not
/// declared `text/html` are a silent no-op. Gzip-encoded bodies are
/// decompressed first; a link whose `href` does not parse is skipped without
/// aborting the remaining links.
pub async fn prefetch_links(
    raw: Bytes,
    resolver: Arc<dyn ResolveHost>,
) -> Result<(), PrefetchError> {
    let (header_len, response) = HttpResponse::parse_with_len(&raw)
        .and_then(|parsed| parsed.context("Incomplete HTTP response"))
        .map_err(|source| e!(PrefetchError::Response { source }))?;

    if response.content_type() != Some(HTML_MEDIA_TYPE) {
        trace!(content_type = ?response.content_type(), "response is not html, skipping prefetch");
        return Ok(());
    }

    let body = decode_body(&raw[header_len..], response.content_encoding())?;
    let body = String::from_utf8_lossy(&body);

    let mut resolved = 0usize;
    for href in anchor_hrefs(&body) {
        let Some(host) = link_host(&href) else {
            continue;
        };
        debug!(%host, "prefetching dns for link target");
        resolver.resolve(&host).await;
        resolved += 1;
    }
    debug!(resolved, "prefetch pass finished");
    Ok(())
}

/// Extracts the host a link points at.
///
/// Relative links and links that do not parse as URLs have none; each is
/// reported at debug level and skipped.
fn link_host(href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(url) => url.host_str().map(str::to_owned),
        Err(err) => {
            debug!(%href, "skipping link that does not parse as a url: {err}");
            None
        }
    }
}
