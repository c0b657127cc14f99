use serde::{Deserialize, Serialize};

/// Layer 3 protocol number for IPv4 (`AF_INET`).
pub const AF_INET: u8 = 2;

/// Layer 3 protocol number for IPv6 (`AF_INET6`).
pub const AF_INET6: u8 = 10;

/// IP protocol numbers the comparator distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
    Dccp,
    Icmpv6,
    Sctp,
    UdpLite,
    Other(u8),
}

impl Protocol {
    /// Convert to the IANA protocol number.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Icmp => 1,
            Self::Tcp => 6,
            Self::Udp => 17,
            Self::Dccp => 33,
            Self::Icmpv6 => 58,
            Self::Sctp => 132,
            Self::UdpLite => 136,
            Self::Other(n) => n,
        }
    }

    /// Create from a raw protocol number.
    pub fn from_u8(n: u8) -> Self {
        match n {
            1 => Self::Icmp,
            6 => Self::Tcp,
            17 => Self::Udp,
            33 => Self::Dccp,
            58 => Self::Icmpv6,
            132 => Self::Sctp,
            136 => Self::UdpLite,
            other => Self::Other(other),
        }
    }

    /// Which protocol-specific tuple fields this protocol carries.
    pub fn l4_class(self) -> L4Class {
        match self {
            Self::Icmp | Self::Icmpv6 => L4Class::Icmp,
            Self::Tcp | Self::Udp | Self::UdpLite | Self::Dccp | Self::Sctp => L4Class::Ports,
            Self::Other(_) => L4Class::Opaque,
        }
    }

    /// Whether connection tracking keeps a per-protocol state machine.
    pub fn tracks_state(self) -> bool {
        matches!(self, Self::Tcp | Self::Sctp | Self::Dccp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Icmp => "icmp",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Dccp => "dccp",
            Self::Icmpv6 => "icmpv6",
            Self::Sctp => "sctp",
            Self::UdpLite => "udplite",
            Self::Other(_) => "other",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(n) => write!(f, "proto-{n}"),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Shape of the layer 4 part of a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum L4Class {
    /// Source and destination ports.
    Ports,
    /// ICMP id, type and code.
    Icmp,
    /// Nothing beyond the protocol number.
    Opaque,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_roundtrip() {
        for n in 0..=u8::MAX {
            assert_eq!(Protocol::from_u8(n).to_u8(), n);
        }
    }

    #[test]
    fn protocol_classes() {
        assert_eq!(Protocol::Icmp.l4_class(), L4Class::Icmp);
        assert_eq!(Protocol::Icmpv6.l4_class(), L4Class::Icmp);
        for p in [
            Protocol::Tcp,
            Protocol::Udp,
            Protocol::UdpLite,
            Protocol::Dccp,
            Protocol::Sctp,
        ] {
            assert_eq!(p.l4_class(), L4Class::Ports, "{p}");
        }
        assert_eq!(Protocol::from_u8(47).l4_class(), L4Class::Opaque);
    }

    #[test]
    fn protocol_display() {
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
        assert_eq!(Protocol::Other(47).to_string(), "proto-47");
    }
}
