#![no_main]

use libfuzzer_sys::fuzz_target;
use lg_core::client_data::ClientData;
use lg_core::token;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        let _ = token::parse::<serde_json::Value>(raw);
        let _ = ClientData::decode(raw);
    }
});
