use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::common::entity::{AF_INET, AF_INET6, L4Class, Protocol};

use super::compare;
use super::error::ConnTrackError;
use super::flags::ComparisonFlags;

// ── Attribute identifiers ────────────────────────────────────────────

/// Direction of a tuple within a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Original,
    Reply,
}

impl Direction {
    pub const ALL: [Self; 2] = [Self::Original, Self::Reply];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "orig",
            Self::Reply => "reply",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes carried by each tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TupleAttr {
    L3Proto,
    L4Proto,
    Ipv4Src,
    Ipv4Dst,
    Ipv6Src,
    Ipv6Dst,
    PortSrc,
    PortDst,
    IcmpId,
    IcmpType,
    IcmpCode,
}

impl TupleAttr {
    pub const ALL: [Self; 11] = [
        Self::L3Proto,
        Self::L4Proto,
        Self::Ipv4Src,
        Self::Ipv4Dst,
        Self::Ipv6Src,
        Self::Ipv6Dst,
        Self::PortSrc,
        Self::PortDst,
        Self::IcmpId,
        Self::IcmpType,
        Self::IcmpCode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::L3Proto => "l3proto",
            Self::L4Proto => "l4proto",
            Self::Ipv4Src => "ipv4_src",
            Self::Ipv4Dst => "ipv4_dst",
            Self::Ipv6Src => "ipv6_src",
            Self::Ipv6Dst => "ipv6_dst",
            Self::PortSrc => "port_src",
            Self::PortDst => "port_dst",
            Self::IcmpId => "icmp_id",
            Self::IcmpType => "icmp_type",
            Self::IcmpCode => "icmp_code",
        }
    }
}

/// Connection-wide metadata attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaAttr {
    Id,
    Mark,
    Timeout,
    Status,
    TcpState,
    SctpState,
    DccpState,
    Zone,
}

impl MetaAttr {
    pub const ALL: [Self; 8] = [
        Self::Id,
        Self::Mark,
        Self::Timeout,
        Self::Status,
        Self::TcpState,
        Self::SctpState,
        Self::DccpState,
        Self::Zone,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Mark => "mark",
            Self::Timeout => "timeout",
            Self::Status => "status",
            Self::TcpState => "tcp_state",
            Self::SctpState => "sctp_state",
            Self::DccpState => "dccp_state",
            Self::Zone => "zone",
        }
    }
}

/// Identifier of a single record attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attr {
    Tuple(Direction, TupleAttr),
    Meta(MetaAttr),
}

impl Attr {
    /// Every attribute, tuples first (original, then reply), then metadata.
    pub fn all() -> impl Iterator<Item = Attr> {
        Direction::ALL
            .into_iter()
            .flat_map(|dir| TupleAttr::ALL.into_iter().map(move |a| Attr::Tuple(dir, a)))
            .chain(MetaAttr::ALL.into_iter().map(Attr::Meta))
    }
}

impl std::fmt::Display for Attr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tuple(dir, attr) => write!(f, "{dir}.{}", attr.as_str()),
            Self::Meta(attr) => f.write_str(attr.as_str()),
        }
    }
}

// ── Protocol states ──────────────────────────────────────────────────

macro_rules! proto_state {
    ($(#[$doc:meta])* $name:ident, $proto:literal, { $($variant:ident = $val:literal => $s:literal),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn to_u8(self) -> u8 {
                match self {
                    $(Self::$variant => $val),+
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ConnTrackError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($val => Ok(Self::$variant),)+
                    _ => Err(ConnTrackError::UnknownState {
                        protocol: $proto,
                        value,
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

proto_state!(
    /// TCP connection tracking state, kernel numbering.
    TcpState, "tcp", {
        None = 0 => "none",
        SynSent = 1 => "syn_sent",
        SynRecv = 2 => "syn_recv",
        Established = 3 => "established",
        FinWait = 4 => "fin_wait",
        CloseWait = 5 => "close_wait",
        LastAck = 6 => "last_ack",
        TimeWait = 7 => "time_wait",
        Close = 8 => "close",
        SynSent2 = 9 => "syn_sent2",
    }
);

proto_state!(
    /// SCTP association state, kernel numbering.
    SctpState, "sctp", {
        None = 0 => "none",
        Closed = 1 => "closed",
        CookieWait = 2 => "cookie_wait",
        CookieEchoed = 3 => "cookie_echoed",
        Established = 4 => "established",
        ShutdownSent = 5 => "shutdown_sent",
        ShutdownRecd = 6 => "shutdown_recd",
        ShutdownAckSent = 7 => "shutdown_ack_sent",
        HeartbeatSent = 8 => "heartbeat_sent",
        HeartbeatAcked = 9 => "heartbeat_acked",
    }
);

proto_state!(
    /// DCCP connection state, kernel numbering.
    DccpState, "dccp", {
        None = 0 => "none",
        Request = 1 => "request",
        Respond = 2 => "respond",
        PartOpen = 3 => "partopen",
        Open = 4 => "open",
        CloseReq = 5 => "closereq",
        Closing = 6 => "closing",
        TimeWait = 7 => "time_wait",
        Ignore = 8 => "ignore",
        Invalid = 9 => "invalid",
    }
);

/// Per-protocol connection state. The variant follows the original
/// tuple's layer 4 protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtoState {
    Tcp(TcpState),
    Sctp(SctpState),
    Dccp(DccpState),
}

impl ProtoState {
    pub fn protocol(self) -> Protocol {
        match self {
            Self::Tcp(_) => Protocol::Tcp,
            Self::Sctp(_) => Protocol::Sctp,
            Self::Dccp(_) => Protocol::Dccp,
        }
    }
}

bitflags! {
    /// Connection status bits (`IPS_*` layout). Unknown bits are kept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ConnStatus: u32 {
        const EXPECTED = 1 << 0;
        const SEEN_REPLY = 1 << 1;
        const ASSURED = 1 << 2;
        const CONFIRMED = 1 << 3;
        const SRC_NAT = 1 << 4;
        const DST_NAT = 1 << 5;
        const SEQ_ADJUST = 1 << 6;
        const SRC_NAT_DONE = 1 << 7;
        const DST_NAT_DONE = 1 << 8;
        const DYING = 1 << 9;
        const FIXED_TIMEOUT = 1 << 10;
        const TEMPLATE = 1 << 11;
        const UNTRACKED = 1 << 12;
        const HELPER = 1 << 13;
        const OFFLOAD = 1 << 14;

        const _ = !0;
    }
}

// ── Layer 4 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    pub src: Option<u16>,
    pub dst: Option<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpFields {
    pub id: Option<u16>,
    pub icmp_type: Option<u8>,
    pub code: Option<u8>,
}

/// Protocol-specific part of a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum L4Fields {
    Ports(PortPair),
    Icmp(IcmpFields),
    Opaque,
}

impl L4Fields {
    fn for_class(class: L4Class) -> Self {
        match class {
            L4Class::Ports => Self::Ports(PortPair::default()),
            L4Class::Icmp => Self::Icmp(IcmpFields::default()),
            L4Class::Opaque => Self::Opaque,
        }
    }

    fn class(&self) -> L4Class {
        match self {
            Self::Ports(_) => L4Class::Ports,
            Self::Icmp(_) => L4Class::Icmp,
            Self::Opaque => L4Class::Opaque,
        }
    }
}

/// Layer 4 protocol number together with the fields it implies.
///
/// The field variant is chosen from the protocol number, so a TCP tuple
/// has no ICMP fields to read and an ICMP tuple has no ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer4 {
    protonum: u8,
    fields: L4Fields,
}

impl Layer4 {
    pub fn new(protonum: u8) -> Self {
        Self {
            protonum,
            fields: L4Fields::for_class(Protocol::from_u8(protonum).l4_class()),
        }
    }

    pub fn protonum(&self) -> u8 {
        self.protonum
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::from_u8(self.protonum)
    }

    pub fn fields(&self) -> &L4Fields {
        &self.fields
    }

    pub fn ports(&self) -> Option<&PortPair> {
        match &self.fields {
            L4Fields::Ports(p) => Some(p),
            _ => None,
        }
    }

    pub fn icmp(&self) -> Option<&IcmpFields> {
        match &self.fields {
            L4Fields::Icmp(i) => Some(i),
            _ => None,
        }
    }

    pub fn port_src(&self) -> Option<u16> {
        self.ports().and_then(|p| p.src)
    }

    pub fn port_dst(&self) -> Option<u16> {
        self.ports().and_then(|p| p.dst)
    }

    pub fn icmp_id(&self) -> Option<u16> {
        self.icmp().and_then(|i| i.id)
    }

    pub fn icmp_type(&self) -> Option<u8> {
        self.icmp().and_then(|i| i.icmp_type)
    }

    pub fn icmp_code(&self) -> Option<u8> {
        self.icmp().and_then(|i| i.code)
    }

    fn is_consistent(&self) -> bool {
        self.fields.class() == self.protocol().l4_class()
    }
}

// ── Tuple ────────────────────────────────────────────────────────────

/// One direction of a tracked connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnTuple {
    l3protonum: Option<u8>,
    l4: Option<Layer4>,
    src: Option<IpAddr>,
    dst: Option<IpAddr>,
}

impl ConnTuple {
    pub fn l3protonum(&self) -> Option<u8> {
        self.l3protonum
    }

    pub fn layer4(&self) -> Option<&Layer4> {
        self.l4.as_ref()
    }

    pub fn l4protonum(&self) -> Option<u8> {
        self.l4.map(|l4| l4.protonum)
    }

    pub fn src(&self) -> Option<IpAddr> {
        self.src
    }

    pub fn dst(&self) -> Option<IpAddr> {
        self.dst
    }

    pub fn ipv4_src(&self) -> Option<Ipv4Addr> {
        v4(self.src)
    }

    pub fn ipv4_dst(&self) -> Option<Ipv4Addr> {
        v4(self.dst)
    }

    pub fn ipv6_src(&self) -> Option<Ipv6Addr> {
        v6(self.src)
    }

    pub fn ipv6_dst(&self) -> Option<Ipv6Addr> {
        v6(self.dst)
    }

    pub fn port_src(&self) -> Option<u16> {
        self.l4.as_ref().and_then(Layer4::port_src)
    }

    pub fn port_dst(&self) -> Option<u16> {
        self.l4.as_ref().and_then(Layer4::port_dst)
    }

    pub fn icmp_id(&self) -> Option<u16> {
        self.l4.as_ref().and_then(Layer4::icmp_id)
    }

    pub fn icmp_type(&self) -> Option<u8> {
        self.l4.as_ref().and_then(Layer4::icmp_type)
    }

    pub fn icmp_code(&self) -> Option<u8> {
        self.l4.as_ref().and_then(Layer4::icmp_code)
    }

    pub fn is_set(&self, attr: TupleAttr) -> bool {
        match attr {
            TupleAttr::L3Proto => self.l3protonum.is_some(),
            TupleAttr::L4Proto => self.l4.is_some(),
            TupleAttr::Ipv4Src => self.ipv4_src().is_some(),
            TupleAttr::Ipv4Dst => self.ipv4_dst().is_some(),
            TupleAttr::Ipv6Src => self.ipv6_src().is_some(),
            TupleAttr::Ipv6Dst => self.ipv6_dst().is_some(),
            TupleAttr::PortSrc => self.port_src().is_some(),
            TupleAttr::PortDst => self.port_dst().is_some(),
            TupleAttr::IcmpId => self.icmp_id().is_some(),
            TupleAttr::IcmpType => self.icmp_type().is_some(),
            TupleAttr::IcmpCode => self.icmp_code().is_some(),
        }
    }

    fn unset(&mut self, attr: TupleAttr) {
        match attr {
            TupleAttr::L3Proto => self.l3protonum = None,
            TupleAttr::L4Proto => self.l4 = None,
            TupleAttr::Ipv4Src if self.ipv4_src().is_some() => self.src = None,
            TupleAttr::Ipv4Dst if self.ipv4_dst().is_some() => self.dst = None,
            TupleAttr::Ipv6Src if self.ipv6_src().is_some() => self.src = None,
            TupleAttr::Ipv6Dst if self.ipv6_dst().is_some() => self.dst = None,
            _ => match self.l4.as_mut().map(|l4| &mut l4.fields) {
                Some(L4Fields::Ports(p)) => match attr {
                    TupleAttr::PortSrc => p.src = None,
                    TupleAttr::PortDst => p.dst = None,
                    _ => {}
                },
                Some(L4Fields::Icmp(i)) => match attr {
                    TupleAttr::IcmpId => i.id = None,
                    TupleAttr::IcmpType => i.icmp_type = None,
                    TupleAttr::IcmpCode => i.code = None,
                    _ => {}
                },
                _ => {}
            },
        }
    }

    /// Invariants the setters uphold: one address family per tuple and
    /// layer 4 fields matching the protocol number.
    fn check_shape(&self, direction: Direction) -> Result<(), ConnTrackError> {
        if let (Some(src), Some(dst)) = (self.src, self.dst)
            && src.is_ipv4() != dst.is_ipv4()
        {
            return Err(ConnTrackError::AddressFamilyMismatch {
                direction,
                src_family: family_name(src),
                dst_family: family_name(dst),
            });
        }

        if let Some(l4) = self.l4
            && !l4.is_consistent()
        {
            let attr = match l4.fields {
                L4Fields::Ports(_) => TupleAttr::PortSrc,
                L4Fields::Icmp(_) => TupleAttr::IcmpId,
                L4Fields::Opaque => TupleAttr::L4Proto,
            };
            return Err(ConnTrackError::NotApplicable {
                attr: Attr::Tuple(direction, attr),
                protonum: l4.protonum,
            });
        }

        Ok(())
    }

    fn validate(&self, direction: Direction) -> Result<(), ConnTrackError> {
        self.check_shape(direction)?;

        if let Some(l3) = self.l3protonum
            && let Some(addr) = self.src.or(self.dst)
        {
            let expected = if addr.is_ipv4() { AF_INET } else { AF_INET6 };
            if l3 != expected {
                return Err(ConnTrackError::L3ProtocolMismatch {
                    direction,
                    l3protonum: l3,
                    family: family_name(addr),
                });
            }
        }

        Ok(())
    }
}

fn v4(addr: Option<IpAddr>) -> Option<Ipv4Addr> {
    match addr {
        Some(IpAddr::V4(a)) => Some(a),
        _ => None,
    }
}

fn v6(addr: Option<IpAddr>) -> Option<Ipv6Addr> {
    match addr {
        Some(IpAddr::V6(a)) => Some(a),
        _ => None,
    }
}

fn family_name(addr: IpAddr) -> &'static str {
    if addr.is_ipv4() { "ipv4" } else { "ipv6" }
}

// ── Metadata ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    id: Option<u32>,
    mark: Option<u32>,
    /// Seconds remaining.
    timeout: Option<u32>,
    status: Option<ConnStatus>,
    proto_state: Option<ProtoState>,
    zone: Option<u16>,
}

impl Metadata {
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn mark(&self) -> Option<u32> {
        self.mark
    }

    pub fn timeout(&self) -> Option<u32> {
        self.timeout
    }

    pub fn status(&self) -> Option<ConnStatus> {
        self.status
    }

    pub fn proto_state(&self) -> Option<ProtoState> {
        self.proto_state
    }

    pub fn tcp_state(&self) -> Option<TcpState> {
        match self.proto_state {
            Some(ProtoState::Tcp(s)) => Some(s),
            _ => None,
        }
    }

    pub fn sctp_state(&self) -> Option<SctpState> {
        match self.proto_state {
            Some(ProtoState::Sctp(s)) => Some(s),
            _ => None,
        }
    }

    pub fn dccp_state(&self) -> Option<DccpState> {
        match self.proto_state {
            Some(ProtoState::Dccp(s)) => Some(s),
            _ => None,
        }
    }

    pub fn zone(&self) -> Option<u16> {
        self.zone
    }

    pub fn is_set(&self, attr: MetaAttr) -> bool {
        match attr {
            MetaAttr::Id => self.id.is_some(),
            MetaAttr::Mark => self.mark.is_some(),
            MetaAttr::Timeout => self.timeout.is_some(),
            MetaAttr::Status => self.status.is_some(),
            MetaAttr::TcpState => self.tcp_state().is_some(),
            MetaAttr::SctpState => self.sctp_state().is_some(),
            MetaAttr::DccpState => self.dccp_state().is_some(),
            MetaAttr::Zone => self.zone.is_some(),
        }
    }

    fn unset(&mut self, attr: MetaAttr) {
        match attr {
            MetaAttr::Id => self.id = None,
            MetaAttr::Mark => self.mark = None,
            MetaAttr::Timeout => self.timeout = None,
            MetaAttr::Status => self.status = None,
            MetaAttr::TcpState | MetaAttr::SctpState | MetaAttr::DccpState => {
                if self.is_set(attr) {
                    self.proto_state = None;
                }
            }
            MetaAttr::Zone => self.zone = None,
        }
    }
}

// ── Connection record ────────────────────────────────────────────────

/// A tracked connection as a sparse set of attributes.
///
/// Every attribute is optional. Accessors return `None` for attributes that
/// are not set, and the set of `Some` accessors is the record's presence set
/// (see [`ConnectionRecord::is_set`]).
///
/// Deserialization enforces the same per-tuple invariants as the setters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConnectionRecord")]
pub struct ConnectionRecord {
    orig: ConnTuple,
    reply: ConnTuple,
    meta: Metadata,
}

#[derive(Deserialize)]
struct RawConnectionRecord {
    #[serde(default)]
    orig: ConnTuple,
    #[serde(default)]
    reply: ConnTuple,
    #[serde(default)]
    meta: Metadata,
}

impl TryFrom<RawConnectionRecord> for ConnectionRecord {
    type Error = ConnTrackError;

    fn try_from(raw: RawConnectionRecord) -> Result<Self, Self::Error> {
        raw.orig.check_shape(Direction::Original)?;
        raw.reply.check_shape(Direction::Reply)?;
        Ok(Self {
            orig: raw.orig,
            reply: raw.reply,
            meta: raw.meta,
        })
    }
}

impl ConnectionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tuple(&self, direction: Direction) -> &ConnTuple {
        match direction {
            Direction::Original => &self.orig,
            Direction::Reply => &self.reply,
        }
    }

    fn tuple_mut(&mut self, direction: Direction) -> &mut ConnTuple {
        match direction {
            Direction::Original => &mut self.orig,
            Direction::Reply => &mut self.reply,
        }
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    /// Whether `attr` currently holds a value.
    pub fn is_set(&self, attr: Attr) -> bool {
        match attr {
            Attr::Tuple(dir, a) => self.tuple(dir).is_set(a),
            Attr::Meta(a) => self.meta.is_set(a),
        }
    }

    /// Iterate over the attributes currently set.
    pub fn attrs(&self) -> impl Iterator<Item = Attr> + '_ {
        Attr::all().filter(|a| self.is_set(*a))
    }

    /// Clear `attr`. Clearing the layer 4 protocol also clears its ports or
    /// ICMP fields.
    pub fn unset(&mut self, attr: Attr) -> &mut Self {
        match attr {
            Attr::Tuple(dir, a) => self.tuple_mut(dir).unset(a),
            Attr::Meta(a) => self.meta.unset(a),
        }
        self
    }

    /// Selective comparison against `other`; see [`compare::compare`].
    pub fn matches(&self, other: &ConnectionRecord, flags: ComparisonFlags) -> bool {
        compare::compare(self, other, flags)
    }

    // ── Tuple setters ───────────────────────────────────────────────

    pub fn set_l3protonum(&mut self, direction: Direction, l3protonum: u8) -> &mut Self {
        self.tuple_mut(direction).l3protonum = Some(l3protonum);
        self
    }

    /// Set the layer 4 protocol. Changing to a different protocol discards
    /// previously set ports or ICMP fields.
    pub fn set_l4protonum(&mut self, direction: Direction, protonum: u8) -> &mut Self {
        let tuple = self.tuple_mut(direction);
        if tuple.l4protonum() != Some(protonum) {
            tuple.l4 = Some(Layer4::new(protonum));
        }
        self
    }

    pub fn set_src(
        &mut self,
        direction: Direction,
        addr: IpAddr,
    ) -> Result<&mut Self, ConnTrackError> {
        let tuple = self.tuple_mut(direction);
        if let Some(dst) = tuple.dst
            && dst.is_ipv4() != addr.is_ipv4()
        {
            return Err(ConnTrackError::AddressFamilyMismatch {
                direction,
                src_family: family_name(addr),
                dst_family: family_name(dst),
            });
        }
        tuple.src = Some(addr);
        Ok(self)
    }

    pub fn set_dst(
        &mut self,
        direction: Direction,
        addr: IpAddr,
    ) -> Result<&mut Self, ConnTrackError> {
        let tuple = self.tuple_mut(direction);
        if let Some(src) = tuple.src
            && src.is_ipv4() != addr.is_ipv4()
        {
            return Err(ConnTrackError::AddressFamilyMismatch {
                direction,
                src_family: family_name(src),
                dst_family: family_name(addr),
            });
        }
        tuple.dst = Some(addr);
        Ok(self)
    }

    pub fn set_port_src(
        &mut self,
        direction: Direction,
        port: u16,
    ) -> Result<&mut Self, ConnTrackError> {
        self.ports_mut(direction, TupleAttr::PortSrc)?.src = Some(port);
        Ok(self)
    }

    pub fn set_port_dst(
        &mut self,
        direction: Direction,
        port: u16,
    ) -> Result<&mut Self, ConnTrackError> {
        self.ports_mut(direction, TupleAttr::PortDst)?.dst = Some(port);
        Ok(self)
    }

    pub fn set_icmp_id(
        &mut self,
        direction: Direction,
        id: u16,
    ) -> Result<&mut Self, ConnTrackError> {
        self.icmp_mut(direction, TupleAttr::IcmpId)?.id = Some(id);
        Ok(self)
    }

    pub fn set_icmp_type(
        &mut self,
        direction: Direction,
        icmp_type: u8,
    ) -> Result<&mut Self, ConnTrackError> {
        self.icmp_mut(direction, TupleAttr::IcmpType)?.icmp_type = Some(icmp_type);
        Ok(self)
    }

    pub fn set_icmp_code(
        &mut self,
        direction: Direction,
        code: u8,
    ) -> Result<&mut Self, ConnTrackError> {
        self.icmp_mut(direction, TupleAttr::IcmpCode)?.code = Some(code);
        Ok(self)
    }

    fn layer4_mut(
        &mut self,
        direction: Direction,
        attr: TupleAttr,
    ) -> Result<&mut Layer4, ConnTrackError> {
        self.tuple_mut(direction)
            .l4
            .as_mut()
            .ok_or(ConnTrackError::MissingL4Protocol {
                direction,
                attr: Attr::Tuple(direction, attr),
            })
    }

    fn ports_mut(
        &mut self,
        direction: Direction,
        attr: TupleAttr,
    ) -> Result<&mut PortPair, ConnTrackError> {
        let l4 = self.layer4_mut(direction, attr)?;
        let protonum = l4.protonum;
        match &mut l4.fields {
            L4Fields::Ports(p) => Ok(p),
            _ => Err(ConnTrackError::NotApplicable {
                attr: Attr::Tuple(direction, attr),
                protonum,
            }),
        }
    }

    fn icmp_mut(
        &mut self,
        direction: Direction,
        attr: TupleAttr,
    ) -> Result<&mut IcmpFields, ConnTrackError> {
        let l4 = self.layer4_mut(direction, attr)?;
        let protonum = l4.protonum;
        match &mut l4.fields {
            L4Fields::Icmp(i) => Ok(i),
            _ => Err(ConnTrackError::NotApplicable {
                attr: Attr::Tuple(direction, attr),
                protonum,
            }),
        }
    }

    // ── Metadata setters ────────────────────────────────────────────

    pub fn set_id(&mut self, id: u32) -> &mut Self {
        self.meta.id = Some(id);
        self
    }

    pub fn set_mark(&mut self, mark: u32) -> &mut Self {
        self.meta.mark = Some(mark);
        self
    }

    pub fn set_timeout(&mut self, timeout_secs: u32) -> &mut Self {
        self.meta.timeout = Some(timeout_secs);
        self
    }

    pub fn set_status(&mut self, status: ConnStatus) -> &mut Self {
        self.meta.status = Some(status);
        self
    }

    /// Set the per-protocol state. Replaces any state of another protocol.
    pub fn set_proto_state(&mut self, state: ProtoState) -> &mut Self {
        self.meta.proto_state = Some(state);
        self
    }

    pub fn set_zone(&mut self, zone: u16) -> &mut Self {
        self.meta.zone = Some(zone);
        self
    }

    /// Check cross-attribute consistency: address families per tuple, layer
    /// 3 protocol against addresses, layer 4 fields against the protocol
    /// number, and the protocol state against the original layer 4 protocol.
    pub fn validate(&self) -> Result<(), ConnTrackError> {
        for dir in Direction::ALL {
            self.tuple(dir).validate(dir)?;
        }

        if let Some(state) = self.meta.proto_state
            && let Some(protonum) = self.orig.l4protonum()
            && state.protocol().to_u8() != protonum
        {
            return Err(ConnTrackError::StateProtocolMismatch {
                state: state.protocol().as_str(),
                protonum,
            });
        }

        Ok(())
    }
}
