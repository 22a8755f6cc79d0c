//! Lazy access to DNS queries carried in raw IPv4/UDP datagrams.
//!
//! Nothing here validates a message. Offsets are fixed (IPv4 header without
//! options) and every accessor degrades to a default instead of failing,
//! because the tunnel only needs enough structure to route, deduplicate and
//! log a query.

use std::net::Ipv4Addr;

pub const IPV4_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;
/// Offset of the DNS header inside a datagram.
pub const DNS_OFFSET: usize = IPV4_HEADER_LEN + UDP_HEADER_LEN;
pub const DNS_HEADER_LEN: usize = 12;
/// Offset of the first question label inside a datagram.
pub const QNAME_OFFSET: usize = DNS_OFFSET + DNS_HEADER_LEN;

pub const IPPROTO_UDP: u8 = 17;
/// Bit in the third DNS header byte telling the client to retry over TCP.
pub const TRUNCATION_FLAG: u8 = 0x02;

const PROTOCOL_OFFSET: usize = 9;
const SRC_ADDR: std::ops::Range<usize> = 12..16;
const DST_ADDR: std::ops::Range<usize> = 16..20;
const REPLY_TTL: u8 = 64;

/// Outcome of the dispatch loop's admission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketVerdict {
    Forward,
    /// 20 bytes or less: not even a full IPv4 header.
    TooShort,
    NotUdp,
    NotForResolver,
    /// Addressed to the resolver but cut off inside the UDP header, so there
    /// is no payload to forward.
    NoUdpPayload,
}

/// Decides whether a datagram read from the tunnel is a query for `resolver`.
pub fn classify(datagram: &[u8], resolver: Ipv4Addr) -> PacketVerdict {
    if datagram.len() <= IPV4_HEADER_LEN {
        return PacketVerdict::TooShort;
    }
    if datagram[PROTOCOL_OFFSET] != IPPROTO_UDP {
        return PacketVerdict::NotUdp;
    }
    if datagram[DST_ADDR] != resolver.octets() {
        return PacketVerdict::NotForResolver;
    }
    if datagram.len() < DNS_OFFSET {
        return PacketVerdict::NoUdpPayload;
    }
    PacketVerdict::Forward
}

/// Message ID of the embedded DNS header.
///
/// Returns 0 when the datagram is too short to hold it; 0 is also a valid ID,
/// so callers cannot use it as a "missing" marker.
pub fn query_id(datagram: &[u8]) -> u16 {
    match datagram.get(DNS_OFFSET..DNS_OFFSET + 2) {
        Some(id) => u16::from_be_bytes([id[0], id[1]]),
        None => 0,
    }
}

/// Best-effort dotted form of the first question name, for logs only.
///
/// Stops at the root label or at the first label running past the end of the
/// buffer, so a malformed query yields a partial name instead of an error.
pub fn query_name(datagram: &[u8]) -> String {
    let mut name = String::new();
    let mut pos = QNAME_OFFSET;
    while let Some(&len) = datagram.get(pos) {
        if len == 0 {
            break;
        }
        let end = pos + 1 + len as usize;
        if end > datagram.len() {
            break;
        }
        name.push_str(&String::from_utf8_lossy(&datagram[pos + 1..end]));
        name.push('.');
        pos = end;
    }
    name
}

/// Sets the TC bit of a DNS message in place.
pub fn mark_truncated(message: &mut [u8]) {
    if let Some(flags) = message.get_mut(2) {
        *flags |= TRUNCATION_FLAG;
    }
}

pub fn is_truncated(message: &[u8]) -> bool {
    message.get(2).is_some_and(|flags| flags & TRUNCATION_FLAG != 0)
}

/// Turns the query datagram in `buf` into the reply datagram, in place.
///
/// `buf[..DNS_OFFSET]` must still hold the original query headers and
/// `buf[DNS_OFFSET..DNS_OFFSET + dns_len]` the upstream answer. Addresses and
/// ports are swapped, lengths and the IPv4 checksum rewritten, and the UDP
/// checksum cleared (optional over IPv4). Returns the datagram length.
pub fn frame_reply(buf: &mut [u8], dns_len: usize) -> usize {
    let total = DNS_OFFSET + dns_len;
    debug_assert!(total <= buf.len());

    let (src, dst) = buf[SRC_ADDR.start..DST_ADDR.end].split_at_mut(4);
    src.swap_with_slice(dst);
    let (sport, dport) = buf[IPV4_HEADER_LEN..IPV4_HEADER_LEN + 4].split_at_mut(2);
    sport.swap_with_slice(dport);

    buf[0] = 0x45;
    buf[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    buf[6..8].copy_from_slice(&[0, 0]);
    buf[8] = REPLY_TTL;
    buf[PROTOCOL_OFFSET] = IPPROTO_UDP;
    buf[10..12].copy_from_slice(&[0, 0]);
    let checksum = ipv4_checksum(&buf[..IPV4_HEADER_LEN]);
    buf[10..12].copy_from_slice(&checksum.to_be_bytes());

    let udp_len = (UDP_HEADER_LEN + dns_len) as u16;
    buf[24..26].copy_from_slice(&udp_len.to_be_bytes());
    buf[26..28].copy_from_slice(&[0, 0]);

    total
}

/// RFC 791 header checksum. A header carrying a valid checksum sums to zero.
pub fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]) as u32)
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
