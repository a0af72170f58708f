use std::io;
use std::net::{Ipv4Addr, SocketAddr};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("lookup {0} failed, {1}")]
    Io(String, #[source] io::Error),

    #[error("no address found for {0}")]
    NoAddress(String),
}

/// Resolve `addr` to the first address the system resolver returns.
///
/// Literal socket addresses never hit the resolver, and an empty host such
/// as `:41000` stands for the unspecified IPv4 address.
pub async fn resolve(addr: &str) -> Result<SocketAddr, ResolveError> {
    if let Ok(addr) = addr.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Some(port) = addr.strip_prefix(':') {
        if let Ok(port) = port.parse::<u16>() {
            return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
        }
    }

    lookup(addr)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::NoAddress(addr.to_string()))
}

/// All addresses of a `host:port` string, in resolver order.
pub async fn lookup(addr: &str) -> Result<Vec<SocketAddr>, ResolveError> {
    let addrs = tokio::net::lookup_host(addr)
        .await
        .map_err(|err| ResolveError::Io(addr.to_string(), err))?
        .collect::<Vec<_>>();

    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_host() {
        let addr = resolve(":41000").await.unwrap();
        assert_eq!(addr, "0.0.0.0:41000".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn literal() {
        let addr = resolve("127.0.0.1:20000").await.unwrap();
        assert_eq!(addr, "127.0.0.1:20000".parse::<SocketAddr>().unwrap());

        let addr = resolve("[::1]:53").await.unwrap();
        assert!(addr.is_ipv6());
    }

    #[tokio::test]
    async fn localhost() {
        let addrs = lookup("localhost:8080").await.unwrap();
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|addr| addr.port() == 8080));
    }

    #[tokio::test]
    async fn missing_port() {
        let result = resolve("localhost").await;
        assert!(matches!(result, Err(ResolveError::Io(..))));
    }
}
