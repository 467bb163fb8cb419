#![no_main]

use ark_types::Manifest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(manifest) = Manifest::parse(data) {
        // Whatever parsed must re-parse identically from its own wire form.
        let wire = manifest.to_wire();
        let reparsed = Manifest::parse(&wire).expect("re-parsing a manifest's own wire form");
        assert_eq!(reparsed.to_wire(), wire);
    }
});
