use std::net::Ipv4Addr;

pub const CLIENT: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 43);
pub const RESOLVER: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 42);

/// IPv4/UDP datagram carrying an A query for `example.com`, sent to the
/// tunnel resolver.
pub fn query_datagram(id: u16) -> Vec<u8> {
    query_datagram_to(id, RESOLVER)
}

pub fn query_datagram_to(id: u16, dst: Ipv4Addr) -> Vec<u8> {
    let mut dns = Vec::new();
    dns.extend_from_slice(&id.to_be_bytes());
    dns.extend_from_slice(&[0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]);
    for label in ["example", "com"] {
        dns.push(label.len() as u8);
        dns.extend_from_slice(label.as_bytes());
    }
    dns.extend_from_slice(&[0, 0, 1, 0, 1]);

    let total = 28 + dns.len();
    let mut pkt = vec![0u8; 28];
    pkt[0] = 0x45;
    pkt[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    pkt[8] = 64;
    pkt[9] = 17;
    pkt[12..16].copy_from_slice(&CLIENT.octets());
    pkt[16..20].copy_from_slice(&dst.octets());
    pkt[20..22].copy_from_slice(&53000u16.to_be_bytes());
    pkt[22..24].copy_from_slice(&53u16.to_be_bytes());
    pkt[24..26].copy_from_slice(&((8 + dns.len()) as u16).to_be_bytes());
    pkt.extend_from_slice(&dns);
    pkt
}

/// Minimal answer header echoing `id`, with QR and RA set.
pub fn dns_answer(id: u16) -> Vec<u8> {
    let mut answer = id.to_be_bytes().to_vec();
    answer.extend_from_slice(&[0x81, 0x80, 0, 1, 0, 1, 0, 0, 0, 0]);
    answer
}
