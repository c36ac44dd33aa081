#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use drone_modbus::codec::{decode_read_response, decode_write_ack};

#[derive(Debug, Arbitrary)]
struct Input {
    transaction_id: u16,
    count: u16,
    address: u16,
    value: u16,
    frame: Vec<u8>,
}

fuzz_target!(|input: Input| {
    if let Ok(values) = decode_read_response(&input.frame, input.transaction_id, input.count) {
        assert_eq!(values.len(), input.count as usize);
    }
    let _ = decode_write_ack(&input.frame, input.transaction_id, input.address, input.value);
});
