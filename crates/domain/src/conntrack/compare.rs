//! Selective structural comparison of connection records.
//!
//! Every attribute goes through [`gate`], which decides from presence and
//! the comparison mode whether the field predicate runs, whether absence is
//! a wildcard, or whether absence fails the comparison. Field predicates only
//! ever see values that are set on both records.

use std::cmp::Ordering;
use std::net::IpAddr;

use crate::common::entity::{L4Class, Protocol};

use super::entity::{ConnStatus, ConnTuple, ConnectionRecord, Direction, Layer4, ProtoState};
use super::flags::{CompareMode, ComparisonFlags};

/// Compare `a` against `b` under `flags`.
///
/// With a full scope (`ALL`, ignoring mode and timeout bits) metadata, the
/// original tuple and the reply tuple are compared in that order. Otherwise
/// only the tuples selected by `ORIGINAL` and `REPLY` are compared and
/// metadata is skipped.
///
/// `a` is the pattern side: under `MASK` its unset attributes are wildcards,
/// and the status comparison requires the bits set in `a` to be set in `b`
/// (not the other way around).
///
/// **Empty scope matches everything**: when neither `ORIGINAL`, `REPLY` nor
/// `ALL` is set, nothing is compared and the result is `true` for any two
/// records.
pub fn compare(a: &ConnectionRecord, b: &ConnectionRecord, flags: ComparisonFlags) -> bool {
    let mode = flags.mode();

    if flags.is_full_scope() {
        return cmp_meta(a, b, mode, flags)
            && cmp_tuple(a.tuple(Direction::Original), b.tuple(Direction::Original), mode)
            && cmp_tuple(a.tuple(Direction::Reply), b.tuple(Direction::Reply), mode);
    }

    if flags.contains(ComparisonFlags::ORIGINAL)
        && !cmp_tuple(a.tuple(Direction::Original), b.tuple(Direction::Original), mode)
    {
        return false;
    }

    if flags.contains(ComparisonFlags::REPLY)
        && !cmp_tuple(a.tuple(Direction::Reply), b.tuple(Direction::Reply), mode)
    {
        return false;
    }

    true
}

// ── Presence gate ────────────────────────────────────────────────────

/// Run `eq` if the attribute is set on both sides, otherwise decide from
/// the mode alone.
fn gate<T>(a: Option<T>, b: Option<T>, mode: CompareMode, eq: impl FnOnce(T, T) -> bool) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => eq(a, b),
        (Some(_), None) if mode == CompareMode::Mask => false,
        _ => mode != CompareMode::Strict,
    }
}

// ── Field predicates ─────────────────────────────────────────────────

fn same<T: PartialEq>(a: T, b: T) -> bool {
    a == b
}

/// Every status bit set on the pattern must be set on the candidate.
fn status_covers(a: ConnStatus, b: ConnStatus) -> bool {
    (a.bits() & b.bits()) == a.bits()
}

/// Exact equality unless an ordering was requested, in which case any
/// requested ordering that holds is a match.
fn timeout_matches(a: u32, b: u32, flags: ComparisonFlags) -> bool {
    if !flags.has_timeout_ordering() {
        return a == b;
    }

    match a.cmp(&b) {
        Ordering::Greater => flags.contains(ComparisonFlags::TIMEOUT_GREATER_THAN),
        Ordering::Less => flags.contains(ComparisonFlags::TIMEOUT_LESS_THAN),
        Ordering::Equal => flags.contains(ComparisonFlags::TIMEOUT_EQUAL),
    }
}

// ── Tuple ────────────────────────────────────────────────────────────

fn cmp_tuple(a: &ConnTuple, b: &ConnTuple, mode: CompareMode) -> bool {
    gate(a.l3protonum(), b.l3protonum(), mode, same)
        && gate(a.layer4(), b.layer4(), mode, |x, y| cmp_layer4(x, y, mode))
        && gate(a.src(), b.src(), mode, |x, y| cmp_addr(x, y, mode))
        && gate(a.dst(), b.dst(), mode, |x, y| cmp_addr(x, y, mode))
}

/// Same family: byte-exact equality. Different families: each address is
/// set on one side only, so the outcome is the gate's verdict for a
/// one-sided attribute.
fn cmp_addr(a: IpAddr, b: IpAddr, mode: CompareMode) -> bool {
    match (a, b) {
        (IpAddr::V4(x), IpAddr::V4(y)) => x.octets() == y.octets(),
        (IpAddr::V6(x), IpAddr::V6(y)) => x.octets() == y.octets(),
        _ => one_sided(mode),
    }
}

/// Verdict for an attribute set on exactly one side when the other side
/// holds the same attribute for a different protocol or family. Mask and
/// strict both fail because the pattern's attribute is missing on the
/// candidate under one reading or the other.
fn one_sided(mode: CompareMode) -> bool {
    mode == CompareMode::Wildcard
}

/// Protocol numbers must agree outright; the protocol then decides which
/// sub-fields are compared. Protocols without sub-fields match on the
/// number alone.
fn cmp_layer4(a: &Layer4, b: &Layer4, mode: CompareMode) -> bool {
    if a.protonum() != b.protonum() {
        return false;
    }

    match Protocol::from_u8(a.protonum()).l4_class() {
        L4Class::Icmp => {
            gate(a.icmp_id(), b.icmp_id(), mode, same)
                && gate(a.icmp_code(), b.icmp_code(), mode, same)
                && gate(a.icmp_type(), b.icmp_type(), mode, same)
        }
        L4Class::Ports => {
            gate(a.port_src(), b.port_src(), mode, same)
                && gate(a.port_dst(), b.port_dst(), mode, same)
        }
        L4Class::Opaque => true,
    }
}

// ── Metadata ─────────────────────────────────────────────────────────

fn cmp_meta(
    a: &ConnectionRecord,
    b: &ConnectionRecord,
    mode: CompareMode,
    flags: ComparisonFlags,
) -> bool {
    let (ma, mb) = (a.meta(), b.meta());
    gate(ma.id(), mb.id(), mode, same)
        && gate(ma.mark(), mb.mark(), mode, same)
        && gate(ma.timeout(), mb.timeout(), mode, |x, y| timeout_matches(x, y, flags))
        && gate(ma.status(), mb.status(), mode, status_covers)
        && cmp_proto_state(a, b, mode)
        && gate(ma.zone(), mb.zone(), mode, same)
}

/// TCP, SCTP and DCCP state are one tagged attribute. It is only gated when
/// one of the records carries a state or has a tuple in either direction
/// whose protocol keeps one, so two UDP records are not failed by strict
/// mode for lacking a TCP state.
fn cmp_proto_state(a: &ConnectionRecord, b: &ConnectionRecord, mode: CompareMode) -> bool {
    if !state_applies(a) && !state_applies(b) {
        return true;
    }

    gate(
        a.meta().proto_state(),
        b.meta().proto_state(),
        mode,
        |x, y| match (x, y) {
            (ProtoState::Tcp(s), ProtoState::Tcp(t)) => s == t,
            (ProtoState::Sctp(s), ProtoState::Sctp(t)) => s == t,
            (ProtoState::Dccp(s), ProtoState::Dccp(t)) => s == t,
            _ => one_sided(mode),
        },
    )
}

fn state_applies(r: &ConnectionRecord) -> bool {
    r.meta().proto_state().is_some()
        || Direction::ALL.into_iter().any(|dir| {
            r.tuple(dir)
                .l4protonum()
                .is_some_and(|p| Protocol::from_u8(p).tracks_state())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity::{AF_INET, AF_INET6};
    use crate::conntrack::entity::{Attr, DccpState, MetaAttr, SctpState, TcpState, TupleAttr};

    const TCP: u8 = 6;
    const UDP: u8 = 17;
    const ICMP: u8 = 1;
    const GRE: u8 = 47;

    const ORIG: Direction = Direction::Original;
    const REPLY: Direction = Direction::Reply;

    // ── Test helpers ───────────────────────────────────────────────

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn set_tuple(
        r: &mut ConnectionRecord,
        dir: Direction,
        proto: u8,
        src: &str,
        sport: u16,
        dst: &str,
        dport: u16,
    ) {
        let src = ip(src);
        let l3 = if src.is_ipv4() { AF_INET } else { AF_INET6 };
        r.set_l3protonum(dir, l3).set_l4protonum(dir, proto);
        r.set_src(dir, src).unwrap();
        r.set_dst(dir, ip(dst)).unwrap();
        r.set_port_src(dir, sport).unwrap();
        r.set_port_dst(dir, dport).unwrap();
    }

    /// A TCP record with every applicable attribute set.
    fn make_full_tcp() -> ConnectionRecord {
        let mut r = ConnectionRecord::new();
        set_tuple(&mut r, ORIG, TCP, "1.2.3.4", 80, "5.6.7.8", 443);
        set_tuple(&mut r, REPLY, TCP, "5.6.7.8", 443, "1.2.3.4", 80);
        r.set_id(42)
            .set_mark(0x10)
            .set_timeout(120)
            .set_status(ConnStatus::SEEN_REPLY | ConnStatus::ASSURED | ConnStatus::CONFIRMED)
            .set_proto_state(ProtoState::Tcp(TcpState::Established))
            .set_zone(3);
        r
    }

    fn make_icmp(id: u16, icmp_type: u8, code: u8) -> ConnectionRecord {
        let mut r = ConnectionRecord::new();
        r.set_l3protonum(ORIG, AF_INET).set_l4protonum(ORIG, ICMP);
        r.set_src(ORIG, ip("10.0.0.1")).unwrap();
        r.set_dst(ORIG, ip("10.0.0.2")).unwrap();
        r.set_icmp_id(ORIG, id).unwrap();
        r.set_icmp_type(ORIG, icmp_type).unwrap();
        r.set_icmp_code(ORIG, code).unwrap();
        r
    }

    fn meta_only() -> ConnectionRecord {
        ConnectionRecord::new()
    }

    // ── Gate ───────────────────────────────────────────────────────

    #[test]
    fn gate_both_present_runs_predicate_in_every_mode() {
        for mode in [CompareMode::Wildcard, CompareMode::Mask, CompareMode::Strict] {
            assert!(gate(Some(1), Some(1), mode, same));
            assert!(!gate(Some(1), Some(2), mode, same));
        }
    }

    #[test]
    fn gate_pattern_only() {
        assert!(gate(Some(1), None, CompareMode::Wildcard, same));
        assert!(!gate(Some(1), None, CompareMode::Mask, same));
        assert!(!gate(Some(1), None, CompareMode::Strict, same));
    }

    #[test]
    fn gate_candidate_only() {
        assert!(gate(None, Some(1), CompareMode::Wildcard, same));
        assert!(gate(None, Some(1), CompareMode::Mask, same));
        assert!(!gate(None, Some(1), CompareMode::Strict, same));
    }

    #[test]
    fn gate_neither_present() {
        assert!(gate::<u8>(None, None, CompareMode::Wildcard, same));
        assert!(gate::<u8>(None, None, CompareMode::Mask, same));
        assert!(!gate::<u8>(None, None, CompareMode::Strict, same));
    }

    #[test]
    fn gate_skips_predicate_when_absent() {
        let called = std::cell::Cell::new(false);
        gate(Some(1), None, CompareMode::Wildcard, |_, _| {
            called.set(true);
            true
        });
        assert!(!called.get());
    }

    // ── Reflexivity ────────────────────────────────────────────────

    #[test]
    fn strict_all_is_reflexive_on_full_record() {
        let r = make_full_tcp();
        assert!(compare(&r, &r, ComparisonFlags::STRICT | ComparisonFlags::ALL));
    }

    #[test]
    fn strict_all_is_reflexive_on_full_icmp_record() {
        let mut r = make_icmp(9, 8, 0);
        r.set_l3protonum(REPLY, AF_INET6).set_l4protonum(REPLY, 58);
        r.set_src(REPLY, ip("2001:db8::2")).unwrap();
        r.set_dst(REPLY, ip("2001:db8::1")).unwrap();
        r.set_icmp_id(REPLY, 9).unwrap();
        r.set_icmp_type(REPLY, 129).unwrap();
        r.set_icmp_code(REPLY, 0).unwrap();
        r.set_id(1)
            .set_mark(0)
            .set_timeout(30)
            .set_status(ConnStatus::CONFIRMED)
            .set_zone(0);
        assert!(compare(&r, &r, ComparisonFlags::STRICT | ComparisonFlags::ALL));
    }

    #[test]
    fn strict_requires_state_for_stateful_protocol() {
        let mut r = make_full_tcp();
        r.unset(Attr::Meta(MetaAttr::TcpState));
        assert!(!compare(&r, &r, ComparisonFlags::STRICT | ComparisonFlags::ALL));
        assert!(compare(&r, &r, ComparisonFlags::ALL));
    }

    #[test]
    fn strict_does_not_require_state_for_udp() {
        let mut r = ConnectionRecord::new();
        set_tuple(&mut r, ORIG, UDP, "10.0.0.1", 5353, "10.0.0.2", 53);
        set_tuple(&mut r, REPLY, UDP, "10.0.0.2", 53, "10.0.0.1", 5353);
        r.set_id(5)
            .set_mark(0)
            .set_timeout(30)
            .set_status(ConnStatus::empty())
            .set_zone(0);
        assert!(compare(&r, &r, ComparisonFlags::STRICT | ComparisonFlags::ALL));
    }

    #[test]
    fn wildcard_all_is_reflexive() {
        let r = make_full_tcp();
        assert!(compare(&r, &r, ComparisonFlags::ALL));
        assert!(compare(&r, &r, ComparisonFlags::ALL | ComparisonFlags::MASK));
    }

    // ── Mask mode ──────────────────────────────────────────────────

    #[test]
    fn mask_unset_pattern_attribute_is_wildcard() {
        let candidate = make_full_tcp();
        let mut pattern = make_full_tcp();
        pattern.unset(Attr::Meta(MetaAttr::Mark));
        pattern.unset(Attr::Tuple(ORIG, TupleAttr::PortSrc));
        let flags = ComparisonFlags::ALL | ComparisonFlags::MASK;
        assert!(compare(&pattern, &candidate, flags));

        let mut other = candidate.clone();
        other.set_mark(0xdead);
        other.set_port_src(ORIG, 1).unwrap();
        assert!(compare(&pattern, &other, flags));
    }

    #[test]
    fn mask_pattern_attribute_missing_on_candidate_fails() {
        let pattern = make_full_tcp();
        let mut candidate = make_full_tcp();
        candidate.unset(Attr::Meta(MetaAttr::Zone));
        let flags = ComparisonFlags::ALL | ComparisonFlags::MASK;
        assert!(!compare(&pattern, &candidate, flags));
        // Without mask the missing zone is don't-care.
        assert!(compare(&pattern, &candidate, ComparisonFlags::ALL));
    }

    #[test]
    fn mask_pattern_port_missing_on_candidate_fails() {
        let pattern = make_full_tcp();
        let mut candidate = make_full_tcp();
        candidate.unset(Attr::Tuple(ORIG, TupleAttr::PortDst));
        assert!(!compare(
            &pattern,
            &candidate,
            ComparisonFlags::ORIGINAL | ComparisonFlags::MASK
        ));
    }

    #[test]
    fn mask_sparse_pattern_filters_on_source_port_only() {
        let mut pattern = ConnectionRecord::new();
        pattern.set_l4protonum(ORIG, TCP);
        pattern.set_port_src(ORIG, 80).unwrap();
        let flags = ComparisonFlags::ORIGINAL | ComparisonFlags::MASK;

        assert!(compare(&pattern, &make_full_tcp(), flags));

        let mut other = make_full_tcp();
        other.set_port_src(ORIG, 8080).unwrap();
        assert!(!compare(&pattern, &other, flags));
    }

    #[test]
    fn mask_is_asymmetric() {
        let mut pattern = ConnectionRecord::new();
        pattern.set_mark(0x10);
        let full = make_full_tcp();
        let flags = ComparisonFlags::ALL | ComparisonFlags::MASK;
        assert!(compare(&pattern, &full, flags));
        assert!(!compare(&full, &pattern, flags));
    }

    // ── Strict mode ────────────────────────────────────────────────

    #[test]
    fn strict_asymmetric_presence_fails_both_ways() {
        let a = make_full_tcp();
        let mut b = make_full_tcp();
        b.unset(Attr::Meta(MetaAttr::Id));
        let flags = ComparisonFlags::ALL | ComparisonFlags::STRICT;
        assert!(!compare(&a, &b, flags));
        assert!(!compare(&b, &a, flags));
    }

    #[test]
    fn strict_mutual_absence_fails() {
        let mut a = make_full_tcp();
        a.unset(Attr::Meta(MetaAttr::Zone));
        let b = a.clone();
        assert!(!compare(&a, &b, ComparisonFlags::ALL | ComparisonFlags::STRICT));
    }

    // ── Status ─────────────────────────────────────────────────────

    #[test]
    fn status_is_required_bits_pattern() {
        let mut a = meta_only();
        let mut b = meta_only();
        a.set_status(ConnStatus::from_bits_retain(0b0101));
        b.set_status(ConnStatus::from_bits_retain(0b1101));
        assert!(compare(&a, &b, ComparisonFlags::ALL));
        assert!(!compare(&b, &a, ComparisonFlags::ALL));
    }

    #[test]
    fn empty_status_pattern_matches_any_status() {
        let mut a = meta_only();
        let mut b = meta_only();
        a.set_status(ConnStatus::empty());
        b.set_status(ConnStatus::ASSURED | ConnStatus::DYING);
        assert!(compare(&a, &b, ComparisonFlags::ALL));
    }

    // ── Timeout ────────────────────────────────────────────────────

    fn timeouts(a: u32, b: u32) -> (ConnectionRecord, ConnectionRecord) {
        let mut ra = meta_only();
        let mut rb = meta_only();
        ra.set_timeout(a);
        rb.set_timeout(b);
        (ra, rb)
    }

    #[test]
    fn timeout_exact_without_refinement() {
        let (a, b) = timeouts(10, 20);
        assert!(!compare(&a, &b, ComparisonFlags::ALL));
        let (a, b) = timeouts(20, 20);
        assert!(compare(&a, &b, ComparisonFlags::ALL));
    }

    #[test]
    fn timeout_less_than() {
        let (a, b) = timeouts(10, 20);
        assert!(compare(&a, &b, ComparisonFlags::ALL | ComparisonFlags::TIMEOUT_LESS_THAN));
    }

    #[test]
    fn timeout_greater_than_unsatisfied_fails() {
        let (a, b) = timeouts(10, 20);
        assert!(!compare(&a, &b, ComparisonFlags::ALL | ComparisonFlags::TIMEOUT_GREATER_THAN));
        let (a, b) = timeouts(30, 20);
        assert!(compare(&a, &b, ComparisonFlags::ALL | ComparisonFlags::TIMEOUT_GREATER_THAN));
    }

    #[test]
    fn timeout_combined_orderings() {
        let flags = ComparisonFlags::ALL | ComparisonFlags::TIMEOUT_LESS_EQUAL;
        let (a, b) = timeouts(20, 20);
        assert!(compare(&a, &b, flags));
        let (a, b) = timeouts(10, 20);
        assert!(compare(&a, &b, flags));
        let (a, b) = timeouts(30, 20);
        assert!(!compare(&a, &b, flags));

        let both = ComparisonFlags::ALL
            | ComparisonFlags::TIMEOUT_LESS_THAN
            | ComparisonFlags::TIMEOUT_GREATER_THAN;
        let (a, b) = timeouts(30, 20);
        assert!(compare(&a, &b, both));
        let (a, b) = timeouts(20, 20);
        assert!(!compare(&a, &b, both));
    }

    #[test]
    fn timeout_equal_alone_is_exact() {
        let flags = ComparisonFlags::ALL | ComparisonFlags::TIMEOUT_EQUAL;
        let (a, b) = timeouts(20, 20);
        assert!(compare(&a, &b, flags));
        let (a, b) = timeouts(10, 20);
        assert!(!compare(&a, &b, flags));
    }

    // ── Scope ──────────────────────────────────────────────────────

    #[test]
    fn empty_scope_matches_anything() {
        let a = make_full_tcp();
        let b = make_icmp(1, 8, 0);
        assert!(compare(&a, &b, ComparisonFlags::empty()));
        assert!(compare(&a, &b, ComparisonFlags::STRICT));
        assert!(compare(&a, &ConnectionRecord::new(), ComparisonFlags::MASK));
    }

    #[test]
    fn meta_flag_alone_compares_nothing() {
        let mut a = meta_only();
        let mut b = meta_only();
        a.set_mark(1);
        b.set_mark(2);
        assert!(compare(&a, &b, ComparisonFlags::META));
        assert!(!compare(&a, &b, ComparisonFlags::ALL));
    }

    #[test]
    fn original_scope_skips_metadata_and_reply() {
        let a = make_full_tcp();
        let mut b = make_full_tcp();
        b.set_mark(0xffff);
        b.set_dst(REPLY, ip("9.9.9.9")).unwrap();
        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL));
        assert!(!compare(&a, &b, ComparisonFlags::REPLY));
        assert!(!compare(&a, &b, ComparisonFlags::ORIGINAL | ComparisonFlags::REPLY));
        assert!(!compare(&a, &b, ComparisonFlags::ALL));
    }

    #[test]
    fn both_tuples_without_meta_ignore_metadata() {
        let a = make_full_tcp();
        let mut b = make_full_tcp();
        b.set_zone(99);
        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL | ComparisonFlags::REPLY));
        assert!(!compare(&a, &b, ComparisonFlags::ALL));
    }

    #[test]
    fn different_destination_address_fails_original() {
        let mut a = ConnectionRecord::new();
        set_tuple(&mut a, ORIG, TCP, "1.2.3.4", 80, "5.6.7.8", 443);
        let mut b = ConnectionRecord::new();
        set_tuple(&mut b, ORIG, TCP, "1.2.3.4", 80, "9.9.9.9", 443);
        assert!(!compare(&a, &b, ComparisonFlags::ORIGINAL));
    }

    // ── Layer 4 dispatch ───────────────────────────────────────────

    #[test]
    fn icmp_compares_icmp_fields() {
        let a = make_icmp(7, 8, 0);
        assert!(compare(&a, &make_icmp(7, 8, 0), ComparisonFlags::ORIGINAL));
        assert!(!compare(&a, &make_icmp(8, 8, 0), ComparisonFlags::ORIGINAL));
        assert!(!compare(&a, &make_icmp(7, 0, 0), ComparisonFlags::ORIGINAL));
        assert!(!compare(&a, &make_icmp(7, 8, 1), ComparisonFlags::ORIGINAL));
    }

    #[test]
    fn reply_icmp_fields_come_from_reply_tuple() {
        let set_reply_icmp = |r: &mut ConnectionRecord, id: u16| {
            r.set_l3protonum(REPLY, AF_INET).set_l4protonum(REPLY, ICMP);
            r.set_icmp_id(REPLY, id).unwrap();
            r.set_icmp_type(REPLY, 0).unwrap();
            r.set_icmp_code(REPLY, 0).unwrap();
        };
        let mut a = make_icmp(7, 8, 0);
        set_reply_icmp(&mut a, 7);
        let mut b = make_icmp(7, 8, 0);
        set_reply_icmp(&mut b, 99);

        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL));
        assert!(!compare(&a, &b, ComparisonFlags::REPLY));
        assert!(!compare(&a, &b, ComparisonFlags::ORIGINAL | ComparisonFlags::REPLY));
    }

    #[test]
    fn icmp_pattern_may_set_type_without_id() {
        let mut pattern = ConnectionRecord::new();
        pattern.set_l4protonum(ORIG, ICMP);
        pattern.set_icmp_type(ORIG, 8).unwrap();
        let flags = ComparisonFlags::ORIGINAL | ComparisonFlags::MASK;
        assert!(compare(&pattern, &make_icmp(1234, 8, 0), flags));
        assert!(!compare(&pattern, &make_icmp(1234, 0, 0), flags));
    }

    #[test]
    fn icmp_records_ignore_ports() {
        // Port fields cannot exist on an ICMP tuple; comparison of two ICMP
        // records never looks at them, even in strict mode.
        let a = make_icmp(1, 8, 0);
        let b = make_icmp(1, 8, 0);
        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL | ComparisonFlags::STRICT));
    }

    #[test]
    fn tcp_records_ignore_icmp_fields() {
        let a = make_full_tcp();
        let b = make_full_tcp();
        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL | ComparisonFlags::STRICT));
    }

    #[test]
    fn protocol_number_mismatch_fails_in_every_mode() {
        let mut a = ConnectionRecord::new();
        set_tuple(&mut a, ORIG, TCP, "1.2.3.4", 1, "5.6.7.8", 2);
        let mut b = ConnectionRecord::new();
        set_tuple(&mut b, ORIG, UDP, "1.2.3.4", 1, "5.6.7.8", 2);
        for mode in [CompareMode::Wildcard, CompareMode::Mask, CompareMode::Strict] {
            assert!(!compare(&a, &b, ComparisonFlags::ORIGINAL | mode.to_flags()));
        }
    }

    #[test]
    fn unknown_protocol_matches_on_number_alone() {
        let mut a = ConnectionRecord::new();
        a.set_l4protonum(ORIG, GRE);
        let b = a.clone();
        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL));
        let mut c = ConnectionRecord::new();
        c.set_l4protonum(ORIG, TCP);
        assert!(!compare(&a, &c, ComparisonFlags::ORIGINAL));
    }

    #[test]
    fn ports_gated_independently() {
        let mut a = ConnectionRecord::new();
        a.set_l4protonum(ORIG, UDP);
        a.set_port_dst(ORIG, 53).unwrap();
        let mut b = ConnectionRecord::new();
        b.set_l4protonum(ORIG, UDP);
        b.set_port_src(ORIG, 5353).unwrap();
        b.set_port_dst(ORIG, 53).unwrap();
        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL));
        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL | ComparisonFlags::MASK));
        assert!(!compare(&a, &b, ComparisonFlags::ORIGINAL | ComparisonFlags::STRICT));
    }

    // ── Addresses ──────────────────────────────────────────────────

    #[test]
    fn ipv6_full_width_compare() {
        let mut a = ConnectionRecord::new();
        set_tuple(&mut a, REPLY, TCP, "2001:db8::1", 1, "2001:db8::2", 2);
        let mut b = ConnectionRecord::new();
        set_tuple(&mut b, REPLY, TCP, "2001:db8::1", 1, "2001:db8::2:0:0:2", 2);
        assert!(compare(&a, &a.clone(), ComparisonFlags::REPLY));
        assert!(!compare(&a, &b, ComparisonFlags::REPLY));
    }

    #[test]
    fn different_families_are_absent_to_each_other() {
        let mut a = ConnectionRecord::new();
        a.set_src(ORIG, ip("10.0.0.1")).unwrap();
        let mut b = ConnectionRecord::new();
        b.set_src(ORIG, ip("2001:db8::1")).unwrap();
        assert!(compare(&a, &b, ComparisonFlags::ORIGINAL));
        assert!(!compare(&a, &b, ComparisonFlags::ORIGINAL | ComparisonFlags::MASK));
    }

    // ── Protocol state ─────────────────────────────────────────────

    #[test]
    fn protocol_state_equality() {
        let a = make_full_tcp();
        let mut b = make_full_tcp();
        b.set_proto_state(ProtoState::Tcp(TcpState::TimeWait));
        assert!(!compare(&a, &b, ComparisonFlags::ALL));
    }

    #[test]
    fn state_of_other_protocol_is_absent() {
        let mut a = meta_only();
        a.set_proto_state(ProtoState::Sctp(SctpState::Established));
        let mut b = meta_only();
        b.set_proto_state(ProtoState::Dccp(DccpState::Open));
        assert!(compare(&a, &b, ComparisonFlags::ALL));
        assert!(!compare(&a, &b, ComparisonFlags::ALL | ComparisonFlags::MASK));
        assert!(!compare(&a, &b, ComparisonFlags::ALL | ComparisonFlags::STRICT));
    }

    #[test]
    fn reply_tuple_protocol_makes_state_applicable() {
        let mut r = ConnectionRecord::new();
        r.set_l4protonum(REPLY, TCP);
        assert!(state_applies(&r));

        let mut udp = ConnectionRecord::new();
        udp.set_l4protonum(REPLY, UDP);
        assert!(!state_applies(&udp));

        // Without a state, strict mode fails the gate for the reply-only TCP record.
        assert!(!cmp_proto_state(&r, &r, CompareMode::Strict));
        assert!(cmp_proto_state(&udp, &udp, CompareMode::Strict));
    }

    #[test]
    fn candidate_state_without_pattern_state_under_mask() {
        let mut pattern = ConnectionRecord::new();
        pattern.set_l4protonum(ORIG, TCP);
        let full = make_full_tcp();
        assert!(compare(&pattern, &full, ComparisonFlags::ALL | ComparisonFlags::MASK));
        assert!(!compare(&full, &pattern, ComparisonFlags::ALL | ComparisonFlags::MASK));
    }

    #[test]
    fn matches_delegates_to_compare() {
        let a = make_full_tcp();
        assert!(a.matches(&a, ComparisonFlags::ALL));
    }
}
