#![no_main]

use libfuzzer_sys::fuzz_target;
use session::{decode_properties, encode_properties};
use wire::Limits;

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();
    if let Ok(properties) = decode_properties(data, &limits) {
        let bytes = encode_properties(&properties, &limits).expect("decoded properties re-encode");
        let again = decode_properties(&bytes, &limits).expect("re-encoded properties decode");
        assert_eq!(again.len(), properties.len());
    }
});
