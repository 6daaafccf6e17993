//! Address classification used by candidate ranking.

use std::net::{IpAddr, Ipv4Addr};

use rand::Rng as _;

/// True for addresses on the local network: RFC 1918, loopback and
/// link-local ranges.
pub(crate) fn is_local_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// Prefix distance between two addresses: the number of bits after the
/// longest common prefix, with IPv4 mapped into IPv6 space. Smaller means
/// topologically closer.
pub(crate) fn cidr_distance(a: IpAddr, b: IpAddr) -> u32 {
    let a = to_v6_bytes(a);
    let b = to_v6_bytes(b);
    let mut common = 0u32;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = x ^ y;
        if diff == 0 {
            common += 8;
        } else {
            common += diff.leading_zeros();
            break;
        }
    }
    128 - common
}

/// A random IPv4 address, used as the ranking tiebreaker while seeding so
/// no peer is systematically preferred.
pub(crate) fn random_external() -> IpAddr {
    let mut bytes = [0u8; 4];
    rand::rng().fill(&mut bytes[..]);
    IpAddr::V4(Ipv4Addr::from(bytes))
}

fn to_v6_bytes(addr: IpAddr) -> [u8; 16] {
    match addr {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_addresses() {
        assert!(is_local_address("192.168.1.10".parse().unwrap()));
        assert!(is_local_address("10.0.0.1".parse().unwrap()));
        assert!(is_local_address("172.16.5.5".parse().unwrap()));
        assert!(is_local_address("127.0.0.1".parse().unwrap()));
        assert!(is_local_address("169.254.0.1".parse().unwrap()));
        assert!(is_local_address("::1".parse().unwrap()));
        assert!(is_local_address("fe80::1".parse().unwrap()));
        assert!(!is_local_address("8.8.8.8".parse().unwrap()));
        assert!(!is_local_address("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_cidr_distance() {
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(cidr_distance(a, a), 0);
        // differs in the last bit of the mapped form
        let b: IpAddr = "10.0.0.0".parse().unwrap();
        assert_eq!(cidr_distance(a, b), 1);
        // closer prefixes yield smaller distances
        let near: IpAddr = "10.0.1.1".parse().unwrap();
        let far: IpAddr = "11.0.0.1".parse().unwrap();
        assert!(cidr_distance(a, near) < cidr_distance(a, far));
    }

    #[test]
    fn test_cidr_distance_mixed_families() {
        let v4: IpAddr = "8.8.8.8".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(cidr_distance(v4, v6) > 32);
    }
}
