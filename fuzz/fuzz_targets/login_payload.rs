#![no_main]

use libfuzzer_sys::fuzz_target;
use lg_core::login::LoginRequest;

fuzz_target!(|data: &[u8]| {
    // Arbitrary login payloads must decode or fail, never panic.
    if let Ok(request) = LoginRequest::decode(data) {
        let _ = request.encode();
    }
});
