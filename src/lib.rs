//! Forward HTTP proxy with opportunistic DNS prefetching.
//!
//! Each accepted connection carries exactly one exchange: the client's GET
//! request is framed, forwarded to the origin with `Connection: close`, and
//! the origin's response is relayed back byte-for-byte. When a relayed
//! response is HTML, a detached task walks its anchors and resolves the
//! linked hostnames so the resolver cache is warm for whatever the client
//! clicks next — without ever delaying the response itself.

mod decode;
mod error;
mod html;
mod parse;
mod prefetch;
mod relay;
mod resolve;


pub use {
    decode::decode_body,
    error::{PrefetchError, RelayError},
    html::anchor_hrefs,
    parse::{Authority, HttpRequest, HttpResponse},
    prefetch::prefetch_links,
    relay::{RelayOpts, relay_accept_loop, relay_exchange},
    resolve::{ResolveHost, SystemResolver},
};
