#![allow(dead_code)]
use std::net::Ipv4Addr;

/// Builds raw IPv4/UDP datagrams carrying a single-question DNS query.
pub struct DatagramBuilder {
    src: Ipv4Addr,
    dst: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    protocol: u8,
    id: u16,
    qname: String,
}

impl DatagramBuilder {
    pub fn new() -> Self {
        Self {
            src: Ipv4Addr::new(192, 0, 2, 43),
            dst: Ipv4Addr::new(192, 0, 2, 42),
            src_port: 53000,
            dst_port: 53,
            protocol: 17,
            id: 0x1234,
            qname: "example.com".to_string(),
        }
    }

    pub fn src(mut self, src: Ipv4Addr) -> Self {
        self.src = src;
        self
    }

    pub fn dst(mut self, dst: Ipv4Addr) -> Self {
        self.dst = dst;
        self
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    pub fn qname(mut self, qname: &str) -> Self {
        self.qname = qname.to_string();
        self
    }

    pub fn dns_message(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(64);
        msg.extend_from_slice(&self.id.to_be_bytes());
        msg.extend_from_slice(&[0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        for label in self.qname.split('.').filter(|l| !l.is_empty()) {
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        msg
    }

    pub fn build(&self) -> Vec<u8> {
        let dns = self.dns_message();
        let total = 28 + dns.len();
        let mut pkt = Vec::with_capacity(total);
        pkt.push(0x45);
        pkt.push(0x00);
        pkt.extend_from_slice(&(total as u16).to_be_bytes());
        pkt.extend_from_slice(&[0xab, 0xcd, 0x40, 0x00]);
        pkt.push(64);
        pkt.push(self.protocol);
        pkt.extend_from_slice(&[0x00, 0x00]);
        pkt.extend_from_slice(&self.src.octets());
        pkt.extend_from_slice(&self.dst.octets());
        pkt.extend_from_slice(&self.src_port.to_be_bytes());
        pkt.extend_from_slice(&self.dst_port.to_be_bytes());
        pkt.extend_from_slice(&((8 + dns.len()) as u16).to_be_bytes());
        pkt.extend_from_slice(&[0x00, 0x00]);
        pkt.extend_from_slice(&dns);
        pkt
    }
}
