#![no_main]

use libfuzzer_sys::fuzz_target;
use tracepack::codec::{decode, encode_to_vec};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail cleanly; whatever decodes must
    // survive another encode/decode cycle unchanged
    if let Ok((record, consumed)) = decode(data) {
        assert!(consumed <= data.len());
        let encoded = encode_to_vec(&record);
        let (again, _) = decode(&encoded).unwrap();
        assert_eq!(again, record);
    }
});
