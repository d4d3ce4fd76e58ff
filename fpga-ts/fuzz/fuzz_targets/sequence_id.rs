#![no_main]

use libfuzzer_sys::fuzz_target;

use fpga_ts::packet::ptp_sequence_id;

fuzz_target!(|data: &[u8]| {
    let _sequence_id = ptp_sequence_id(data);
});
