#![no_main]

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use libfuzzer_sys::fuzz_target;

use domain::common::entity::{AF_INET, AF_INET6, Protocol};
use domain::conntrack::entity::{
    ConnStatus, ConnectionRecord, DccpState, Direction, ProtoState, SctpState, TcpState,
};
use domain::conntrack::flags::ComparisonFlags;

// Fuzz the record comparator.
//
// Layout:
//   [0..4]  = comparison flags (u32 LE, unknown bits retained)
//   rest    = two records, each: presence mask (u16 LE) followed by values
//
// Properties checked:
//   - empty scope matches any pair
//   - compare(R, R) holds for wildcard/mask when timeout ordering allows equality
//   - a fully populated record matches itself under STRICT|ALL
//   - strict implies mask implies wildcard for the same scope

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn u8(&mut self) -> u8 {
        let b = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes([self.u8(), self.u8()])
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes([self.u8(), self.u8(), self.u8(), self.u8()])
    }

    fn addr(&mut self, v6: bool) -> IpAddr {
        if v6 {
            let mut octets = [0u8; 16];
            for b in &mut octets {
                *b = self.u8();
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        } else {
            IpAddr::V4(Ipv4Addr::from(self.u32()))
        }
    }
}

fn build_record(c: &mut Cursor<'_>, force_full: bool) -> ConnectionRecord {
    let mask = if force_full { u16::MAX } else { c.u16() };
    let has = |bit: u16| mask & (1 << bit) != 0;
    let v6 = c.u8() & 1 != 0;
    let proto = c.u8();

    let mut r = ConnectionRecord::new();
    for (i, dir) in Direction::ALL.into_iter().enumerate() {
        let base = i as u16 * 5;
        if has(base) {
            r.set_l3protonum(dir, if v6 { AF_INET6 } else { AF_INET });
        }
        if has(base + 1) {
            r.set_l4protonum(dir, proto);
        }
        if has(base + 2) {
            let _ = r.set_src(dir, c.addr(v6));
        }
        if has(base + 3) {
            let _ = r.set_dst(dir, c.addr(v6));
        }
        if has(base + 4) {
            // Only the setters that apply to the protocol succeed.
            let _ = r.set_port_src(dir, c.u16());
            let _ = r.set_port_dst(dir, c.u16());
            let _ = r.set_icmp_id(dir, c.u16());
            let _ = r.set_icmp_type(dir, c.u8());
            let _ = r.set_icmp_code(dir, c.u8());
        }
    }

    if has(10) {
        r.set_id(c.u32()).set_mark(c.u32());
    }
    if has(11) {
        r.set_timeout(c.u32());
    }
    if has(12) {
        r.set_status(ConnStatus::from_bits_retain(c.u32()));
    }
    if has(13) {
        let value = c.u8();
        let state = match Protocol::from_u8(proto) {
            Protocol::Tcp => TcpState::try_from(value % 10).ok().map(ProtoState::Tcp),
            Protocol::Sctp => SctpState::try_from(value % 10).ok().map(ProtoState::Sctp),
            Protocol::Dccp => DccpState::try_from(value % 10).ok().map(ProtoState::Dccp),
            _ => None,
        };
        if let Some(state) = state {
            r.set_proto_state(state);
        }
    }
    if has(14) {
        r.set_zone(c.u16());
    }

    r
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let mut c = Cursor { data, pos: 0 };
    let flags = ComparisonFlags::from_bits_retain(c.u32());
    let a = build_record(&mut c, false);
    let b = build_record(&mut c, false);
    let full = build_record(&mut c, true);

    let _ = a.validate();
    let _ = b.validate();

    // Empty scope.
    let modes = ComparisonFlags::MASK | ComparisonFlags::STRICT;
    let kept = modes | ComparisonFlags::TIMEOUT_LESS_EQUAL;
    let empty_scope = flags & kept & !ComparisonFlags::ALL;
    assert!(a.matches(&b, empty_scope));

    // Reflexivity outside strict mode.
    let mut reflexive = flags & !ComparisonFlags::STRICT;
    if reflexive.has_timeout_ordering() {
        reflexive |= ComparisonFlags::TIMEOUT_EQUAL;
    }
    assert!(a.matches(&a, reflexive));

    // Strict reflexivity on a fully populated record.
    assert!(full.matches(&full, ComparisonFlags::STRICT | ComparisonFlags::ALL));

    // Mode ordering for the same scope and timeout bits.
    let base = flags & !modes;
    if a.matches(&b, base | ComparisonFlags::STRICT) {
        assert!(a.matches(&b, base | ComparisonFlags::MASK));
    }
    if a.matches(&b, base | ComparisonFlags::MASK) {
        assert!(a.matches(&b, base));
    }
});
