#![no_main]

use ark_core::RemoteUrl;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Must never panic on arbitrary input; a successful parse must recover
    // all three non-empty components.
    if let Ok(url) = RemoteUrl::parse(data) {
        assert!(!url.bucket.is_empty());
        assert!(!url.table.is_empty());
        assert!(!url.prefix.is_empty());
    }
});
