#![no_main]

use libfuzzer_sys::fuzz_target;
use wire::{
    decode_command, decode_despawn, decode_ownership, decode_rigidbody, decode_spawn,
    decode_transform, encode_command, encode_despawn, encode_ownership, encode_rigidbody,
    encode_spawn, encode_transform, Limits,
};

// The first byte picks a decoder; whatever decodes must re-encode to the
// same bytes.
fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let limits = Limits::for_testing();

    match selector % 6 {
        0 => {
            if let Ok(state) = decode_transform(payload) {
                assert_eq!(encode_transform(&state), payload);
            }
        }
        1 => {
            if let Ok(state) = decode_rigidbody(payload) {
                assert_eq!(encode_rigidbody(&state), payload);
            }
        }
        2 => {
            if let Ok(spawn) = decode_spawn(payload, &limits) {
                let bytes = encode_spawn(&spawn, &limits).expect("decoded spawn re-encodes");
                assert_eq!(bytes, payload);
            }
        }
        3 => {
            if let Ok(id) = decode_despawn(payload) {
                assert_eq!(encode_despawn(id), payload);
            }
        }
        4 => {
            if let Ok(change) = decode_ownership(payload, &limits) {
                let bytes = encode_ownership(&change, &limits).expect("decoded ownership re-encodes");
                assert_eq!(bytes, payload);
            }
        }
        _ => {
            if let Ok(frame) = decode_command(payload, &limits) {
                let bytes = encode_command(frame.command_id, frame.target, frame.payload, &limits)
                    .expect("decoded command re-encodes");
                assert_eq!(bytes, payload);
            }
        }
    }
});
