//! Property-based codec laws.
//!
//! Round-trips hold for every structurally valid frame, option encoding is
//! compositional, and arbitrary byte soup must neither panic nor loop the
//! decoders.

use proptest::prelude::*;

use ppplink::protocol::cp::{decode_options, encode_options, CpBody, CpPacket};
use ppplink::protocol::ipcp::IpcpOpt;
use ppplink::protocol::lcp::{AuthProto, ChapDigest, LcpOpt};
use ppplink::protocol::ppp::PppFrame;

/// Option types the LCP codec gives a structured variant.
const KNOWN_LCP_TYPES: &[u8] = &[1, 2, 3, 4, 5, 7, 8, 13, 17, 18, 19, 23];

fn arb_chap_digest() -> impl Strategy<Value = ChapDigest> {
    prop_oneof![
        Just(ChapDigest::Md5),
        Just(ChapDigest::Sha1),
        Just(ChapDigest::MsChap),
        Just(ChapDigest::MsChapV2),
    ]
}

fn arb_auth() -> impl Strategy<Value = AuthProto> {
    prop_oneof![
        Just(AuthProto::Pap),
        Just(AuthProto::Eap),
        arb_chap_digest().prop_map(AuthProto::Chap),
    ]
}

/// Unknown option types round-trip as Raw; known types would re-decode into
/// their structured variant, so Raw generation avoids them.
fn arb_raw_lcp() -> impl Strategy<Value = LcpOpt> {
    (any::<u8>(), proptest::collection::vec(any::<u8>(), 0..40)).prop_filter_map(
        "type must be unknown to the codec",
        |(t, v)| {
            if KNOWN_LCP_TYPES.contains(&t) {
                None
            } else {
                Some(LcpOpt::Raw(t, v))
            }
        },
    )
}

fn arb_lcp_opt() -> impl Strategy<Value = LcpOpt> {
    prop_oneof![
        any::<u16>().prop_map(LcpOpt::Mru),
        any::<u32>().prop_map(LcpOpt::AsyncMap),
        arb_auth().prop_map(LcpOpt::Auth),
        (any::<u16>(), any::<u32>())
            .prop_map(|(protocol, period)| LcpOpt::Quality { protocol, period }),
        any::<u32>().prop_map(LcpOpt::Magic),
        Just(LcpOpt::Pfc),
        Just(LcpOpt::Acfc),
        (any::<u8>(), proptest::collection::vec(any::<u8>(), 0..32))
            .prop_map(|(operation, message)| LcpOpt::Callback { operation, message }),
        any::<u16>().prop_map(LcpOpt::Mrru),
        Just(LcpOpt::Ssnhf),
        (any::<u8>(), proptest::collection::vec(any::<u8>(), 0..20))
            .prop_map(|(class, address)| LcpOpt::EndpointDisc { class, address }),
        any::<u16>().prop_map(LcpOpt::LinkDisc),
        arb_raw_lcp(),
    ]
}

fn arb_ipv4() -> impl Strategy<Value = std::net::Ipv4Addr> {
    any::<u32>().prop_map(std::net::Ipv4Addr::from)
}

fn arb_ipcp_opt() -> impl Strategy<Value = IpcpOpt> {
    prop_oneof![
        (arb_ipv4(), arb_ipv4())
            .prop_map(|(local, remote)| IpcpOpt::IpAddresses { local, remote }),
        (any::<u16>(), proptest::collection::vec(any::<u8>(), 0..16))
            .prop_map(|(protocol, data)| IpcpOpt::IpCompression { protocol, data }),
        arb_ipv4().prop_map(IpcpOpt::IpAddress),
        arb_ipv4().prop_map(IpcpOpt::MobileIpv4),
        arb_ipv4().prop_map(IpcpOpt::PrimaryDns),
        arb_ipv4().prop_map(IpcpOpt::PrimaryNbns),
        arb_ipv4().prop_map(IpcpOpt::SecondaryDns),
        arb_ipv4().prop_map(IpcpOpt::SecondaryNbns),
    ]
}

fn arb_lcp_body() -> impl Strategy<Value = CpBody<LcpOpt>> {
    let opts = proptest::collection::vec(arb_lcp_opt(), 0..8).boxed();
    let bytes = proptest::collection::vec(any::<u8>(), 0..64);
    prop_oneof![
        opts.clone().prop_map(CpBody::ConfigureRequest),
        opts.clone().prop_map(CpBody::ConfigureAck),
        opts.clone().prop_map(CpBody::ConfigureNak),
        opts.prop_map(CpBody::ConfigureReject),
        bytes.clone().prop_map(CpBody::TerminateRequest),
        bytes.clone().prop_map(CpBody::TerminateAck),
        bytes.clone().prop_map(CpBody::CodeReject),
        (any::<u16>(), bytes.clone())
            .prop_map(|(protocol, data)| CpBody::ProtocolReject { protocol, data }),
        Just(CpBody::EchoRequest),
        Just(CpBody::EchoReply),
        Just(CpBody::DiscardRequest),
        (any::<u32>(), bytes.clone())
            .prop_map(|(magic, message)| CpBody::Identification { magic, message }),
        (any::<u32>(), any::<u32>(), bytes).prop_map(|(magic, seconds, message)| {
            CpBody::TimeRemaining {
                magic,
                seconds,
                message,
            }
        }),
    ]
}

proptest! {
    #[test]
    fn lcp_options_roundtrip(opts in proptest::collection::vec(arb_lcp_opt(), 0..12)) {
        let bytes = encode_options(&opts);
        let decoded: Vec<LcpOpt> = decode_options(&bytes);
        prop_assert_eq!(decoded, opts);
    }

    #[test]
    fn ipcp_options_roundtrip(opts in proptest::collection::vec(arb_ipcp_opt(), 0..12)) {
        let bytes = encode_options(&opts);
        let decoded: Vec<IpcpOpt> = decode_options(&bytes);
        prop_assert_eq!(decoded, opts);
    }

    #[test]
    fn option_encoding_is_compositional(
        a in proptest::collection::vec(arb_lcp_opt(), 0..6),
        b in proptest::collection::vec(arb_lcp_opt(), 0..6),
    ) {
        let mut joined = a.clone();
        joined.extend(b.clone());

        let mut bytes = encode_options(&a);
        bytes.extend(encode_options(&b));
        prop_assert_eq!(encode_options(&joined), bytes);
    }

    #[test]
    fn option_length_byte_is_value_plus_two(opt in arb_lcp_opt()) {
        let bytes = encode_options(std::slice::from_ref(&opt));
        prop_assert_eq!(bytes[1] as usize, bytes.len());
    }

    #[test]
    fn cp_packet_roundtrip(identifier in any::<u8>(), body in arb_lcp_body()) {
        let packet = CpPacket { identifier, body };
        let bytes = packet.encode();

        // Length field law: total length = data + 4-byte header.
        prop_assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]) as usize, bytes.len());

        let decoded: CpPacket<LcpOpt> = CpPacket::decode(&bytes).unwrap();
        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn ppp_frame_roundtrip(identifier in any::<u8>(), body in arb_lcp_body()) {
        let frame = PppFrame::Lcp(CpPacket { identifier, body });
        let decoded = PppFrame::decode(&frame.encode()).unwrap();
        prop_assert_eq!(decoded, frame);
    }

    /// Arbitrary bytes: decoding may fail but must not panic, and the option
    /// walker must terminate.
    #[test]
    fn decoders_survive_byte_soup(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = PppFrame::decode(&bytes);
        let _: Vec<LcpOpt> = decode_options(&bytes);
        let _: Vec<IpcpOpt> = decode_options(&bytes);
        let _: Result<CpPacket<LcpOpt>, _> = CpPacket::decode(&bytes);
    }

    /// A decoded option list re-encodes to the same bytes when every TLV was
    /// well-formed (length byte sane and in bounds).
    #[test]
    fn wellformed_tlv_stream_is_stable(opts in proptest::collection::vec(arb_lcp_opt(), 0..8)) {
        let bytes = encode_options(&opts);
        let decoded: Vec<LcpOpt> = decode_options(&bytes);
        prop_assert_eq!(encode_options(&decoded), bytes);
    }
}
