//! Minimal DNS wire format codec (RFC 1035).
//!
//! Parses the 12-byte header plus a single question section, synthesizes
//! NXDOMAIN and local-answer responses, and supports the two in-place
//! rewrites the relay needs: the message identifier and the response flags.

use crate::dns::filter::FilterPolicy;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

// DNS wire format constants
const HEADER_SIZE: usize = 12;
const FLAG_QR: u16 = 0x8000; // Query/Response flag
const FLAG_AA: u16 = 0x0400; // Authoritative Answer
const FLAG_TC: u16 = 0x0200; // Truncation
const FLAG_RD: u16 = 0x0100; // Recursion Desired
const FLAG_RA: u16 = 0x0080; // Recursion Available
const FLAG_RCODE_MASK: u16 = 0x000F; // Response code mask
const POINTER_MASK: u8 = 0xC0; // Top two bits of a compressed-name byte

// RFC 1035: maximum name is 253 characters, maximum label is 63
const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

const TYPE_A: u16 = 1;
const TYPE_AAAA: u16 = 28;
const TYPE_ANY: u16 = 255;
const CLASS_IN: u16 = 1;

/// TTL stamped on locally synthesized answers
const ANSWER_TTL: u32 = 3600;

/// DNS record types the relay synthesizes answers for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    A,
    AAAA,
    ANY,
    Other(u16),
}

impl RecordType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            TYPE_A => RecordType::A,
            TYPE_AAAA => RecordType::AAAA,
            TYPE_ANY => RecordType::ANY,
            other => RecordType::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => TYPE_A,
            RecordType::AAAA => TYPE_AAAA,
            RecordType::ANY => TYPE_ANY,
            RecordType::Other(v) => v,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::ANY => write!(f, "ANY"),
            RecordType::Other(v) => write!(f, "TYPE{}", v),
        }
    }
}

/// DNS response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    NoError = 0,
    FormErr = 1,
    ServFail = 2,
    NxDomain = 3,
    NotImp = 4,
    Refused = 5,
}

impl ResponseCode {
    /// Extract from the low four bits of the header flags
    pub fn from_flags(flags: u16) -> Self {
        match flags & FLAG_RCODE_MASK {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormErr,
            2 => ResponseCode::ServFail,
            3 => ResponseCode::NxDomain,
            4 => ResponseCode::NotImp,
            5 => ResponseCode::Refused,
            _ => ResponseCode::ServFail, // Treat unknown as server failure
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::NoError => write!(f, "NOERROR"),
            ResponseCode::FormErr => write!(f, "FORMERR"),
            ResponseCode::ServFail => write!(f, "SERVFAIL"),
            ResponseCode::NxDomain => write!(f, "NXDOMAIN"),
            ResponseCode::NotImp => write!(f, "NOTIMP"),
            ResponseCode::Refused => write!(f, "REFUSED"),
        }
    }
}

/// The question carried by a message, when one is present
#[derive(Debug, Clone)]
pub struct Question {
    /// Dot-joined labels, case preserved, no trailing dot
    pub name: String,
    pub qtype: RecordType,
    pub qclass: u16,
}

/// A decoded DNS message, owning its raw bytes.
///
/// Immutable once parsed; identifier and flag rewrites happen on byte
/// buffers via [`set_message_id`] and the response builders.
#[derive(Debug, Clone)]
pub struct DnsMessage {
    raw: Vec<u8>,
    id: u16,
    qr: bool,
    opcode: u8,
    aa: bool,
    tc: bool,
    rd: bool,
    ra: bool,
    z: u8,
    rcode: ResponseCode,
    qdcount: u16,
    ancount: u16,
    nscount: u16,
    arcount: u16,
    question: Option<Question>,
}

impl DnsMessage {
    /// Parse a DNS message from raw bytes.
    ///
    /// Messages shorter than the 12-byte header are rejected. When a
    /// question section is declared and bytes remain, the first question
    /// is decoded; a compressed name in the question is rejected rather
    /// than misparsed (real queries never compress the question).
    pub fn parse(buf: &[u8]) -> Result<DnsMessage, &'static str> {
        if buf.len() < HEADER_SIZE {
            return Err("packet too short for DNS header");
        }

        let id = u16::from_be_bytes([buf[0], buf[1]]);
        let flags = u16::from_be_bytes([buf[2], buf[3]]);
        let qdcount = u16::from_be_bytes([buf[4], buf[5]]);
        let ancount = u16::from_be_bytes([buf[6], buf[7]]);
        let nscount = u16::from_be_bytes([buf[8], buf[9]]);
        let arcount = u16::from_be_bytes([buf[10], buf[11]]);

        let question = if qdcount > 0 && buf.len() > HEADER_SIZE {
            let (name, name_end) = parse_name(buf, HEADER_SIZE)?;
            if buf.len() < name_end + 4 {
                return Err("packet too short for question");
            }
            let qtype = RecordType::from_u16(u16::from_be_bytes([buf[name_end], buf[name_end + 1]]));
            let qclass = u16::from_be_bytes([buf[name_end + 2], buf[name_end + 3]]);
            Some(Question { name, qtype, qclass })
        } else {
            None
        };

        Ok(DnsMessage {
            raw: buf.to_vec(),
            id,
            qr: flags & FLAG_QR != 0,
            opcode: ((flags >> 11) & 0x0F) as u8,
            aa: flags & FLAG_AA != 0,
            tc: flags & FLAG_TC != 0,
            rd: flags & FLAG_RD != 0,
            ra: flags & FLAG_RA != 0,
            z: ((flags >> 4) & 0x07) as u8,
            rcode: ResponseCode::from_flags(flags),
            qdcount,
            ancount,
            nscount,
            arcount,
            question,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn is_response(&self) -> bool {
        self.qr
    }

    pub fn rcode(&self) -> ResponseCode {
        self.rcode
    }

    pub fn qdcount(&self) -> u16 {
        self.qdcount
    }

    pub fn ancount(&self) -> u16 {
        self.ancount
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// The original wire bytes this message was parsed from
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl fmt::Display for DnsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DNS[id={}, {}, opcode={}",
            self.id,
            if self.qr { "response" } else { "query" },
            self.opcode
        )?;
        if self.qr {
            write!(f, ", aa={}, ra={}, rcode={}", self.aa, self.ra, self.rcode)?;
        } else {
            write!(f, ", rd={}", self.rd)?;
        }
        if self.tc {
            write!(f, ", tc")?;
        }
        if self.z != 0 {
            write!(f, ", z={}", self.z)?;
        }
        write!(
            f,
            ", qd={}, an={}, ns={}, ar={}",
            self.qdcount, self.ancount, self.nscount, self.arcount
        )?;
        if let Some(q) = &self.question {
            write!(f, ", name={}, qtype={}", q.name, q.qtype)?;
        }
        write!(f, "]")
    }
}

/// Read the 16-bit identifier at the fixed header offset.
pub fn message_id(buf: &[u8]) -> u16 {
    if buf.len() < 2 {
        return 0;
    }
    u16::from_be_bytes([buf[0], buf[1]])
}

/// Write the 16-bit identifier at the fixed header offset.
pub fn set_message_id(buf: &mut [u8], id: u16) {
    if buf.len() >= 2 {
        buf[..2].copy_from_slice(&id.to_be_bytes());
    }
}

/// Build an NXDOMAIN echo of the original query: same length, response
/// flag set, response code name-not-found, AN/NS/AR counts zeroed.
pub fn build_intercepted(query: &[u8]) -> Option<Vec<u8>> {
    if query.len() < HEADER_SIZE {
        return None;
    }

    let mut response = query.to_vec();

    let mut flags = u16::from_be_bytes([response[2], response[3]]);
    flags |= FLAG_QR;
    flags = (flags & !FLAG_RCODE_MASK) | ResponseCode::NxDomain as u16;
    response[2..4].copy_from_slice(&flags.to_be_bytes());

    for byte in &mut response[6..12] {
        *byte = 0;
    }

    Some(response)
}

/// Build a response answering the query from a stored address literal.
///
/// The record type is inferred from the literal's binary length (4 bytes
/// is A, 16 is AAAA). If the filter policy disallows the inferred type, or
/// the query asked for a different type and not ANY, the intercepted form
/// is returned instead. Otherwise one answer record is appended using a
/// name pointer back to the question.
pub fn build_local_answer(
    query: &[u8],
    qtype: RecordType,
    literal: &str,
    policy: FilterPolicy,
) -> Option<Vec<u8>> {
    if query.len() < HEADER_SIZE {
        return None;
    }

    let addr: IpAddr = literal.parse().ok()?;
    let (rtype, octets) = match addr {
        IpAddr::V4(v4) => (RecordType::A, v4.octets().to_vec()),
        IpAddr::V6(v6) => (RecordType::AAAA, v6.octets().to_vec()),
    };

    if !policy.permits(rtype) {
        return build_intercepted(query);
    }
    if qtype != rtype && qtype != RecordType::ANY {
        return build_intercepted(query);
    }

    let mut out = Vec::with_capacity(query.len() + 12 + octets.len());
    out.extend_from_slice(query);

    let mut flags = u16::from_be_bytes([out[2], out[3]]);
    flags |= FLAG_QR | FLAG_RA;
    out[2..4].copy_from_slice(&flags.to_be_bytes());

    out.extend_from_slice(&[0xC0, 0x0C]); // NAME: pointer to the question
    out.extend_from_slice(&rtype.to_u16().to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    out.extend_from_slice(&ANSWER_TTL.to_be_bytes());
    out.extend_from_slice(&(octets.len() as u16).to_be_bytes());
    out.extend_from_slice(&octets);

    out[6..8].copy_from_slice(&1u16.to_be_bytes()); // ANCOUNT = 1

    Some(out)
}

/// Collect every A and AAAA address in the answer section.
///
/// Names in answers are skipped, not decoded, so compression pointers are
/// handled. Records of other types or with unexpected rdata lengths are
/// ignored. A truncated section yields whatever was collected so far.
pub fn extract_answer_addrs(buf: &[u8]) -> Vec<IpAddr> {
    let mut addrs = Vec::new();
    if buf.len() < HEADER_SIZE {
        return addrs;
    }

    let qdcount = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    let ancount = u16::from_be_bytes([buf[6], buf[7]]) as usize;

    let mut pos = HEADER_SIZE;
    for _ in 0..qdcount {
        if let Some(name_end) = skip_name(buf, pos) {
            pos = name_end + 4; // QTYPE + QCLASS
        } else {
            return addrs;
        }
    }

    for _ in 0..ancount {
        if let Some(name_end) = skip_name(buf, pos) {
            pos = name_end;
        } else {
            break;
        }

        // TYPE(2) + CLASS(2) + TTL(4) + RDLENGTH(2)
        if pos + 10 > buf.len() {
            break;
        }
        let rtype = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
        let rdlength = u16::from_be_bytes([buf[pos + 8], buf[pos + 9]]) as usize;
        pos += 10;
        if pos + rdlength > buf.len() {
            break;
        }

        match (RecordType::from_u16(rtype), rdlength) {
            (RecordType::A, 4) => {
                addrs.push(IpAddr::V4(Ipv4Addr::new(
                    buf[pos],
                    buf[pos + 1],
                    buf[pos + 2],
                    buf[pos + 3],
                )));
            }
            (RecordType::AAAA, 16) => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[pos..pos + 16]);
                addrs.push(IpAddr::V6(Ipv6Addr::from(octets)));
            }
            _ => {}
        }

        pos += rdlength;
    }

    addrs
}

/// Render a byte buffer as rows of 16 space-separated hex pairs.
///
/// Every row, including a partial final row, ends with a newline so log
/// lines after a dump never merge with the last row.
pub fn dump_hex(data: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(data.len() * 3 + data.len() / 16 + 2);
    for (i, byte) in data.iter().enumerate() {
        let _ = write!(out, "{:02x} ", byte);
        if i & 15 == 15 {
            out.push('\n');
        }
    }
    if data.len() & 15 != 0 {
        out.push('\n');
    }
    out
}

/// Decode a name as length-prefixed labels up to the zero terminator.
/// Returns the name and the position just past the terminator.
fn parse_name(buf: &[u8], start: usize) -> Result<(String, usize), &'static str> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut total_len = 0usize;

    loop {
        if pos >= buf.len() {
            return Err("name extends beyond packet");
        }

        let len = buf[pos] as usize;
        if len == 0 {
            pos += 1;
            break;
        }

        if buf[pos] & POINTER_MASK == POINTER_MASK {
            return Err("compressed name in question");
        }
        if len > MAX_LABEL_LEN {
            return Err("label exceeds maximum length (63)");
        }

        pos += 1;
        if pos + len > buf.len() {
            return Err("label extends beyond packet");
        }

        total_len += len + 1;
        if total_len > MAX_NAME_LEN {
            return Err("name exceeds maximum length (253)");
        }

        let label =
            std::str::from_utf8(&buf[pos..pos + len]).map_err(|_| "invalid UTF-8 in label")?;
        labels.push(label.to_string());
        pos += len;
    }

    Ok((labels.join("."), pos))
}

/// Skip over a name without decoding it (answer-section traversal).
/// A compression pointer ends the name after two bytes.
fn skip_name(buf: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;

    loop {
        if pos >= buf.len() {
            return None;
        }

        let len = buf[pos] as usize;
        if len == 0 {
            return Some(pos + 1);
        }
        if buf[pos] & POINTER_MASK == POINTER_MASK {
            return Some(pos + 2);
        }

        pos += 1 + len;
    }
}

// ==================== Helper for building DNS packets (tests) ====================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_query() {
        let query = builder::build_query("example.com", RecordType::A, 0x1234);
        let parsed = DnsMessage::parse(&query).unwrap();

        assert_eq!(parsed.id(), 0x1234);
        assert!(!parsed.is_response());
        assert_eq!(parsed.qdcount(), 1);
        let question = parsed.question().unwrap();
        assert_eq!(question.name, "example.com");
        assert_eq!(question.qtype, RecordType::A);
        assert_eq!(question.qclass, CLASS_IN);
    }

    #[test]
    fn test_parse_preserves_case() {
        let query = builder::build_query("Example.COM", RecordType::A, 1);
        let parsed = DnsMessage::parse(&query).unwrap();
        assert_eq!(parsed.question().unwrap().name, "Example.COM");
    }

    #[test]
    fn test_parse_too_short() {
        let short = vec![0u8; 11];
        assert!(DnsMessage::parse(&short).is_err());
    }

    #[test]
    fn test_parse_header_only() {
        // 12-byte header with no question is valid
        let mut buf = vec![0u8; 12];
        buf[0] = 0xAB;
        buf[1] = 0xCD;
        let parsed = DnsMessage::parse(&buf).unwrap();
        assert_eq!(parsed.id(), 0xABCD);
        assert!(parsed.question().is_none());
    }

    #[test]
    fn test_parse_rejects_compressed_question() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        buf.extend_from_slice(&[0xC0, 0x0C]); // pointer where a label belongs
        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let result = DnsMessage::parse(&buf);
        assert_eq!(result.unwrap_err(), "compressed name in question");
    }

    #[test]
    fn test_parse_label_too_long() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x12, 0x34, 0x00, 0x00, 0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        buf.push(64);
        buf.extend_from_slice(&[b'x'; 64]);
        buf.push(0);
        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let result = DnsMessage::parse(&buf);
        assert_eq!(result.unwrap_err(), "label exceeds maximum length (63)");
    }

    #[test]
    fn test_parse_name_too_long() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x12, 0x34, 0x00, 0x00, 0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        for _ in 0..5 {
            buf.push(63);
            buf.extend_from_slice(&[b'a'; 63]);
        }
        buf.push(0);
        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let result = DnsMessage::parse(&buf);
        assert_eq!(result.unwrap_err(), "name exceeds maximum length (253)");
    }

    #[test]
    fn test_parse_truncated_label_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x12, 0x34, 0x00, 0x00, 0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        buf.push(7);
        buf.extend_from_slice(b"exa"); // declared 7, only 3 present

        assert!(DnsMessage::parse(&buf).is_err());
    }

    #[test]
    fn test_parse_root_query() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x01]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        buf.push(0); // root: just the terminator
        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let parsed = DnsMessage::parse(&buf).unwrap();
        assert_eq!(parsed.question().unwrap().name, "");
    }

    #[test]
    fn test_message_id_roundtrip() {
        let mut query = builder::build_query("example.com", RecordType::A, 0xBEEF);
        let original = query.clone();
        let id = message_id(&query);
        set_message_id(&mut query, id);
        assert_eq!(query, original);
    }

    #[test]
    fn test_set_message_id_rewrites_header() {
        let mut query = builder::build_query("example.com", RecordType::A, 0x1111);
        set_message_id(&mut query, 0x2222);
        assert_eq!(message_id(&query), 0x2222);
    }

    #[test]
    fn test_message_id_short_buffer() {
        assert_eq!(message_id(&[0x42]), 0);
        let mut short = vec![0x42];
        set_message_id(&mut short, 0x1234); // must not panic
        assert_eq!(short, vec![0x42]);
    }

    #[test]
    fn test_build_intercepted_properties() {
        let query = builder::build_query("bad.example.org", RecordType::A, 0x7777);
        let response = build_intercepted(&query).unwrap();

        assert_eq!(response.len(), query.len());
        assert_eq!(message_id(&response), 0x7777);
        let parsed = DnsMessage::parse(&response).unwrap();
        assert!(parsed.is_response());
        assert_eq!(parsed.rcode(), ResponseCode::NxDomain);
        assert_eq!(parsed.ancount(), 0);
        assert_eq!(u16::from_be_bytes([response[8], response[9]]), 0);
        assert_eq!(u16::from_be_bytes([response[10], response[11]]), 0);
    }

    #[test]
    fn test_build_intercepted_too_short() {
        assert!(build_intercepted(&[0u8; 5]).is_none());
    }

    #[test]
    fn test_build_local_answer_v4() {
        let query = builder::build_query("host.example.org", RecordType::A, 0x4242);
        let response =
            build_local_answer(&query, RecordType::A, "203.0.113.5", FilterPolicy::Both).unwrap();

        let parsed = DnsMessage::parse(&response).unwrap();
        assert!(parsed.is_response());
        assert_eq!(parsed.id(), 0x4242);
        assert_eq!(parsed.ancount(), 1);
        assert_eq!(parsed.rcode(), ResponseCode::NoError);
        assert_eq!(&response[response.len() - 4..], &[203, 0, 113, 5]);
        assert_eq!(extract_answer_addrs(&response), vec!["203.0.113.5".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_build_local_answer_v6() {
        let query = builder::build_query("host.example.org", RecordType::AAAA, 0x4243);
        let response =
            build_local_answer(&query, RecordType::AAAA, "2001:db8::7", FilterPolicy::Both)
                .unwrap();

        let parsed = DnsMessage::parse(&response).unwrap();
        assert_eq!(parsed.ancount(), 1);
        assert_eq!(
            extract_answer_addrs(&response),
            vec!["2001:db8::7".parse::<IpAddr>().unwrap()]
        );
    }

    #[test]
    fn test_build_local_answer_any_query() {
        let query = builder::build_query("host.example.org", RecordType::ANY, 0x4244);
        let response =
            build_local_answer(&query, RecordType::ANY, "203.0.113.5", FilterPolicy::Both).unwrap();
        assert_eq!(DnsMessage::parse(&response).unwrap().ancount(), 1);
    }

    #[test]
    fn test_build_local_answer_type_mismatch() {
        // AAAA query answered from a v4 literal falls back to NXDOMAIN
        let query = builder::build_query("host.example.org", RecordType::AAAA, 0x4245);
        let response =
            build_local_answer(&query, RecordType::AAAA, "203.0.113.5", FilterPolicy::Both)
                .unwrap();

        let parsed = DnsMessage::parse(&response).unwrap();
        assert_eq!(parsed.rcode(), ResponseCode::NxDomain);
        assert_eq!(parsed.ancount(), 0);
        assert_eq!(response.len(), query.len());
    }

    #[test]
    fn test_build_local_answer_filtered() {
        // v4 literal under IPv6-only policy is intercepted
        let query = builder::build_query("host.example.org", RecordType::A, 0x4246);
        let response =
            build_local_answer(&query, RecordType::A, "203.0.113.5", FilterPolicy::Ipv6Only)
                .unwrap();

        let parsed = DnsMessage::parse(&response).unwrap();
        assert_eq!(parsed.rcode(), ResponseCode::NxDomain);
        assert_eq!(parsed.ancount(), 0);
    }

    #[test]
    fn test_build_local_answer_bad_literal() {
        let query = builder::build_query("host.example.org", RecordType::A, 0x4247);
        assert!(build_local_answer(&query, RecordType::A, "not-an-address", FilterPolicy::Both)
            .is_none());
    }

    #[test]
    fn test_extract_answer_addrs_pointer_names() {
        let query = builder::build_query("example.com", RecordType::A, 1);
        let response = builder::build_answer_response(&query, "93.184.216.34".parse().unwrap(), 300);

        let addrs = extract_answer_addrs(&response);
        assert_eq!(addrs, vec!["93.184.216.34".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_extract_answer_addrs_mixed_families() {
        let query = builder::build_query("example.com", RecordType::ANY, 1);
        let mut response = builder::build_answer_response(&query, "192.0.2.9".parse().unwrap(), 60);

        // Append a second answer, AAAA this time
        response[6..8].copy_from_slice(&2u16.to_be_bytes());
        response.extend_from_slice(&[0xC0, 0x0C]);
        response.extend_from_slice(&TYPE_AAAA.to_be_bytes());
        response.extend_from_slice(&CLASS_IN.to_be_bytes());
        response.extend_from_slice(&60u32.to_be_bytes());
        response.extend_from_slice(&16u16.to_be_bytes());
        let v6: Ipv6Addr = "2001:db8::42".parse().unwrap();
        response.extend_from_slice(&v6.octets());

        let addrs = extract_answer_addrs(&response);
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0], "192.0.2.9".parse::<IpAddr>().unwrap());
        assert_eq!(addrs[1], IpAddr::V6(v6));
    }

    #[test]
    fn test_extract_answer_addrs_skips_other_types() {
        let query = builder::build_query("example.com", RecordType::A, 1);
        let mut response = query.clone();
        response[2] |= 0x80;
        response[6..8].copy_from_slice(&1u16.to_be_bytes());
        // CNAME answer: type 5, some rdata
        response.extend_from_slice(&[0xC0, 0x0C]);
        response.extend_from_slice(&5u16.to_be_bytes());
        response.extend_from_slice(&CLASS_IN.to_be_bytes());
        response.extend_from_slice(&60u32.to_be_bytes());
        response.extend_from_slice(&2u16.to_be_bytes());
        response.extend_from_slice(&[0xC0, 0x0C]);

        assert!(extract_answer_addrs(&response).is_empty());
    }

    #[test]
    fn test_extract_answer_addrs_truncated() {
        let query = builder::build_query("example.com", RecordType::A, 1);
        let response = builder::build_answer_response(&query, "192.0.2.1".parse().unwrap(), 60);
        // Cut into the rdata of the only answer
        let truncated = &response[..response.len() - 2];
        assert!(extract_answer_addrs(truncated).is_empty());
    }

    #[test]
    fn test_dump_hex_full_row() {
        let dump = dump_hex(&[0u8; 16]);
        assert!(dump.ends_with('\n'));
        assert_eq!(dump.lines().count(), 1);
    }

    #[test]
    fn test_dump_hex_partial_row_terminated() {
        let dump = dump_hex(&[0xAB; 18]);
        assert!(dump.ends_with('\n'));
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.starts_with("ab ab "));
    }

    #[test]
    fn test_dump_hex_empty() {
        assert_eq!(dump_hex(&[]), "");
    }

    #[test]
    fn test_record_type_roundtrip() {
        for rtype in [
            RecordType::A,
            RecordType::AAAA,
            RecordType::ANY,
            RecordType::Other(15),
        ] {
            assert_eq!(RecordType::from_u16(rtype.to_u16()), rtype);
        }
    }

    #[test]
    fn test_record_type_display() {
        assert_eq!(format!("{}", RecordType::A), "A");
        assert_eq!(format!("{}", RecordType::AAAA), "AAAA");
        assert_eq!(format!("{}", RecordType::ANY), "ANY");
        assert_eq!(format!("{}", RecordType::Other(16)), "TYPE16");
    }

    #[test]
    fn test_response_code_from_flags() {
        assert_eq!(ResponseCode::from_flags(0x8183), ResponseCode::NxDomain);
        assert_eq!(ResponseCode::from_flags(0x8180), ResponseCode::NoError);
        assert_eq!(ResponseCode::from_flags(0x000F), ResponseCode::ServFail);
    }

    #[test]
    fn test_display_query_and_response() {
        let query = builder::build_query("example.com", RecordType::A, 7);
        let parsed = DnsMessage::parse(&query).unwrap();
        let rendered = format!("{}", parsed);
        assert!(rendered.contains("query"));
        assert!(rendered.contains("name=example.com"));

        let response = builder::build_answer_response(&query, "192.0.2.1".parse().unwrap(), 60);
        let parsed = DnsMessage::parse(&response).unwrap();
        let rendered = format!("{}", parsed);
        assert!(rendered.contains("response"));
        assert!(rendered.contains("rcode=NOERROR"));
    }
}
