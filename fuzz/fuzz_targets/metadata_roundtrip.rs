#![no_main]

use ark_types::RepoMetadata;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(metadata) = RepoMetadata::from_payload(data) {
        let payload = metadata.to_payload().expect("re-encoding a decoded record");
        let reparsed = RepoMetadata::from_payload(&payload).expect("re-decoding our own payload");
        assert_eq!(metadata, reparsed);
    }
});
