#![no_main]

use libfuzzer_sys::fuzz_target;
use statementlog_core::{
    Error, PartitionKeyStrategy, RecordEncoder, Statement, MAX_PARTITION_KEY_BYTES,
};

fuzz_target!(|data: &[u8]| {
    // Fuzz record encoding with arbitrary JSON documents.
    // Tests handling of:
    // - Malformed JSON
    // - Missing or non-string key fields
    // - Very long key values (must be truncated on a char boundary)
    // - Records right at the size limit
    let _ = serde_json::from_slice::<Statement>(data);

    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    for strategy in [
        PartitionKeyStrategy::default(),
        PartitionKeyStrategy::fields(["subject_id", "predicate"]),
    ] {
        let encoder = RecordEncoder::new(strategy, 4096);
        match encoder.encode(&value) {
            Ok(record) => {
                assert!(record.size_bytes() <= 4096);
                assert!(record.partition_key.len() <= MAX_PARTITION_KEY_BYTES);
                let decoded: serde_json::Value = record.decode().unwrap();
                assert_eq!(decoded, value);
            }
            Err(Error::RecordTooLarge { size, limit, .. }) => assert!(size > limit),
            Err(Error::Serialization(_)) => {}
        }
    }
});
