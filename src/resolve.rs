use std::{fmt::Debug, pin::Pin};

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use tracing::debug;

/// Best-effort hostname lookup used by the prefetch pipeline.
///
/// The result is discarded; the lookup exists only to warm resolver caches
/// for hosts a client is likely to request next. Implementations must never
/// surface failures to the caller.
pub trait ResolveHost: Send + Sync + Debug {
    fn resolve<'a>(&'a self, host: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Resolver backed by the host's DNS configuration.
#[derive(derive_more::Debug)]
#[debug("SystemResolver")]
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    /// Creates a resolver from the system configuration, falling back to the
    /// default upstream servers when none can be read.
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|err| {
            debug!("no usable system resolver configuration ({err}), using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolveHost for SystemResolver {
    fn resolve<'a>(&'a self, host: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            match self.resolver.lookup_ip(host).await {
                Ok(lookup) => {
                    debug!(%host, addrs = lookup.iter().count(), "prefetched host")
                }
                Err(err) => debug!(%host, "prefetch lookup failed: {err}"),
            }
        })
    }
}
