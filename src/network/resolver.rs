use std::net::{IpAddr, SocketAddr};

use tracing::debug;
use trust_dns_resolver::config::LookupIpStrategy;
use trust_dns_resolver::system_conf::read_system_conf;
use trust_dns_resolver::TokioAsyncResolver;

use crate::core::{AddressFamily, Error, Result};

/// Resolves `host` into the socket addresses to poll, in resolver order.
///
/// IP literals bypass DNS. Names are looked up for both A and AAAA records
/// and then restricted to `family`. An empty result is a resolution failure.
pub async fn resolve(host: &str, port: u16, family: AddressFamily) -> Result<Vec<SocketAddr>> {
    let ips: Vec<IpAddr> = match host.parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => lookup(host).await?,
    };

    let addrs = admit(ips, port, family);
    if addrs.is_empty() {
        return Err(Error::resolution(host, "no address of the requested family"));
    }

    debug!("Found {} peers to check", addrs.len());
    Ok(addrs)
}

async fn lookup(host: &str) -> Result<Vec<IpAddr>> {
    let (config, mut opts) = read_system_conf().map_err(|e| Error::resolution(host, e))?;
    opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

    let resolver = TokioAsyncResolver::tokio(config, opts).map_err(|e| Error::resolution(host, e))?;
    let lookup = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| Error::resolution(host, e))?;

    Ok(lookup.iter().collect())
}

/// Pairs addresses with the port and drops those outside `family`
fn admit(ips: Vec<IpAddr>, port: u16, family: AddressFamily) -> Vec<SocketAddr> {
    let mut addrs: Vec<SocketAddr> = Vec::with_capacity(ips.len());
    for ip in ips {
        let addr = SocketAddr::new(ip, port);
        if family.admits(&addr) && !addrs.contains(&addr) {
            addrs.push(addr);
        }
    }
    addrs
}
