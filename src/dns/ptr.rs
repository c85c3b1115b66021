use eyre::{
    eyre,
    Result,
};
use std::net::Ipv4Addr;

/// Wildcard reverse-lookup suffix used when no narrower reverse domain is
/// configured. The zone covering it must pre-exist at the provider.
pub const DEFAULT_PTR_DOMAIN: &str = "in-addr.arpa.";

/// Derives the canonical reverse-lookup name for a dotted-quad IPv4 address:
/// octets reversed, joined with '.', suffixed with the reverse domain.
///
/// Parsing is strict. A malformed address is an error rather than a record
/// pointing somewhere in 0.0.0.0 space.
pub fn ptr_name(ip: &str, ptr_domain: &str) -> Result<String> {
    let addr: Ipv4Addr = ip
        .parse()
        .map_err(|_| eyre!("not a valid IPv4 address: {ip:?}"))?;
    let [a, b, c, d] = addr.octets();
    Ok(format!("{d}.{c}.{b}.{a}.{ptr_domain}"))
}
