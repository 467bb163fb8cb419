#![no_main]

use std::sync::OnceLock;

use ark_crypto::{Recipient, SecretKey};
use libfuzzer_sys::fuzz_target;

fn keypair() -> &'static (Recipient, SecretKey) {
    static KEYPAIR: OnceLock<(Recipient, SecretKey)> = OnceLock::new();
    KEYPAIR.get_or_init(ark_crypto::keygen)
}

fuzz_target!(|data: &[u8]| {
    let (recipient, secret) = keypair();

    let mut encrypted = Vec::new();
    if ark_crypto::encrypt_to_recipients(std::slice::from_ref(recipient), data, &mut encrypted).is_err() {
        return;
    }

    let mut decrypted = Vec::new();
    if ark_crypto::decrypt_with_secret(secret, encrypted.as_slice(), &mut decrypted).is_ok() {
        assert_eq!(decrypted, data);
    }
});
