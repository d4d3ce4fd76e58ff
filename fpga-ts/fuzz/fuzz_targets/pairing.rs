#![no_main]

use libfuzzer_sys::fuzz_target;

use fpga_ts::{
    config::ResyncPolicy,
    fuzz::{pair, Pairing},
};

fuzz_target!(|input: (u16, Option<u16>, bool)| {
    let (record, packet, lagging) = input;
    let policy = if lagging {
        ResyncPolicy::DiscardLagging
    } else {
        ResyncPolicy::DiscardLeading
    };

    let pairing = pair(record, packet, policy);

    match packet {
        None => assert_eq!(pairing, Pairing::Malformed),
        Some(packet) if packet == record => assert_eq!(pairing, Pairing::Matched),
        Some(_) => assert!(matches!(
            pairing,
            Pairing::DiscardRecord | Pairing::ReleasePacket
        )),
    }
});
