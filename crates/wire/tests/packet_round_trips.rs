//! Exercises the crate's public surface the way an external caller would,
//! rather than through `#[cfg(test)]` internals.

use meshwire_wire::{NodePacket, PacketType, Packet};

#[test]
fn packet_serialize_parse_is_a_total_round_trip() {
    let packet = Packet::new(5, vec![9, 9, 9]);
    let bytes = packet.serialize().expect("friend packets require a payload");
    let parsed = Packet::parse(&bytes).expect("well-formed packet parses");
    assert_eq!(parsed, packet);
    assert_eq!(parsed.kind(), PacketType::Friend(5));
}

#[test]
fn node_packet_rejects_short_input_before_touching_payload() {
    let err = NodePacket::parse(&[0u8; 10]);
    assert!(err.is_err());
}
