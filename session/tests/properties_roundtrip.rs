use proptest::prelude::*;
use session::{decode_properties, encode_properties, Properties, PropertyValue};
use wire::Limits;

fn value() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        any::<bool>().prop_map(PropertyValue::Bool),
        (-1.0e9f64..1.0e9).prop_map(PropertyValue::Number),
        "[a-z0-9 ]{0,24}".prop_map(PropertyValue::Text),
    ]
}

proptest! {
    #[test]
    fn prop_properties_roundtrip(entries in prop::collection::vec(("[a-z]{1,8}", value()), 0..12)) {
        let properties: Properties = entries.into_iter().collect();
        let limits = Limits::default();
        let bytes = encode_properties(&properties, &limits).unwrap();
        prop_assert_eq!(decode_properties(&bytes, &limits).unwrap(), properties);
    }

    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode_properties(&bytes, &Limits::for_testing());
    }
}
