//! The Crypto Envelope (spec.md §4.2): recipient-based authenticated
//! encryption applied to a bundle file just before it leaves the client,
//! and just after it arrives on fetch. Pure bytes-in/bytes-out — this crate
//! knows nothing about bundles, manifests, or the blob store.
//!
//! Built on the `age` crate (X25519 recipients + ChaCha20-Poly1305), the
//! closest idiomatic-Rust equivalent of the original tool's libsodium
//! sealed-box streaming primitive (`StreamEncryptRecipients` /
//! `StreamDecryptRecipients`).

use std::io::{Read, Write};
use std::iter;
use std::str::FromStr;

use ark_types::CryptoError;

/// A public key a bundle can be encrypted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient(age::x25519::Recipient);

impl Recipient {
    pub fn parse(s: &str) -> Result<Self, CryptoError> {
        age::x25519::Recipient::from_str(s.trim())
            .map(Self)
            .map_err(|e| CryptoError::MalformedKey(e.to_string()))
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A secret key capable of decrypting bundles encrypted to its matching
/// `Recipient`.
#[derive(Clone)]
pub struct SecretKey(age::x25519::Identity);

impl SecretKey {
    pub fn parse(s: &str) -> Result<Self, CryptoError> {
        age::x25519::Identity::from_str(s.trim())
            .map(Self)
            .map_err(|e| CryptoError::MalformedKey(e.to_string()))
    }

    pub fn to_public(&self) -> Recipient {
        Recipient(self.0.to_public())
    }
}

impl std::fmt::Display for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generate a fresh recipient/secret-key pair, for `--keygen`.
pub fn keygen() -> (Recipient, SecretKey) {
    let identity = age::x25519::Identity::generate();
    let recipient = identity.to_public();
    (Recipient(recipient), SecretKey(identity))
}

/// Encrypt `src` to every key in `recipients`, writing the ciphertext
/// stream to `dst`. Any holder of a matching secret key can decrypt.
///
/// Fails `CryptoError::NoRecipients` on an empty recipient set *before*
/// reading a single byte of `src` — the Design Notes call this out
/// explicitly: the original source's flow never rejects an empty
/// `.publickeys`, which would otherwise silently produce an unreadable
/// bundle.
pub fn encrypt_to_recipients(
    recipients: &[Recipient],
    mut src: impl Read,
    mut dst: impl Write,
) -> Result<(), CryptoError> {
    if recipients.is_empty() {
        return Err(CryptoError::NoRecipients);
    }

    let boxed: Vec<Box<dyn age::Recipient + Send>> = recipients
        .iter()
        .map(|r| Box::new(r.0.clone()) as Box<dyn age::Recipient + Send>)
        .collect();

    let encryptor =
        age::Encryptor::with_recipients(boxed).map_err(|e| CryptoError::MalformedKey(e.to_string()))?;

    let mut plaintext = Vec::new();
    src.read_to_end(&mut plaintext)
        .map_err(|_| CryptoError::Decrypt)?;

    let mut writer = encryptor
        .wrap_output(&mut dst)
        .map_err(|_| CryptoError::Decrypt)?;
    writer.write_all(&plaintext).map_err(|_| CryptoError::Decrypt)?;
    writer.finish().map_err(|_| CryptoError::Decrypt)?;
    Ok(())
}

/// Decrypt a stream produced by [`encrypt_to_recipients`]. Fails
/// `CryptoError::Decrypt` on authentication failure, truncation, or a
/// secret key that does not match any recipient the stream was encrypted
/// to.
pub fn decrypt_with_secret(
    secret: &SecretKey,
    mut src: impl Read,
    mut dst: impl Write,
) -> Result<(), CryptoError> {
    let mut ciphertext = Vec::new();
    src.read_to_end(&mut ciphertext).map_err(|_| CryptoError::Decrypt)?;

    let decryptor = age::Decryptor::new(&ciphertext[..]).map_err(|_| CryptoError::Decrypt)?;
    let age::Decryptor::Recipients(decryptor) = decryptor else {
        return Err(CryptoError::Decrypt);
    };

    let identity: &dyn age::Identity = &secret.0;
    let mut reader = decryptor
        .decrypt(iter::once(identity))
        .map_err(|_| CryptoError::Decrypt)?;
    let mut plaintext = Vec::new();
    reader
        .read_to_end(&mut plaintext)
        .map_err(|_| CryptoError::Decrypt)?;
    dst.write_all(&plaintext).map_err(|_| CryptoError::Decrypt)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let (recipient, secret) = keygen();
        let plaintext = b"a git bundle, pretend";

        let mut ciphertext = Vec::new();
        encrypt_to_recipients(&[recipient], &plaintext[..], &mut ciphertext).unwrap();
        assert_ne!(ciphertext, plaintext);

        let mut out = Vec::new();
        decrypt_with_secret(&secret, &ciphertext[..], &mut out).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn empty_recipients_rejected_before_reading_src() {
        let mut dst = Vec::new();
        let err = encrypt_to_recipients(&[], &b"hello"[..], &mut dst).unwrap_err();
        assert!(matches!(err, CryptoError::NoRecipients));
        assert!(dst.is_empty());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let (recipient, _) = keygen();
        let (_, other_secret) = keygen();

        let mut ciphertext = Vec::new();
        encrypt_to_recipients(&[recipient], &b"secret"[..], &mut ciphertext).unwrap();

        let mut out = Vec::new();
        let err = decrypt_with_secret(&other_secret, &ciphertext[..], &mut out).unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt));
    }

    #[test]
    fn recipient_string_roundtrips() {
        let (recipient, secret) = keygen();
        let parsed = Recipient::parse(&recipient.to_string()).unwrap();
        assert_eq!(parsed, recipient);
        assert!(SecretKey::parse(&secret.to_string()).is_ok());
    }

    #[test]
    fn multiple_recipients_each_can_decrypt() {
        let (r1, s1) = keygen();
        let (r2, s2) = keygen();

        let mut ciphertext = Vec::new();
        encrypt_to_recipients(&[r1, r2], &b"shared"[..], &mut ciphertext).unwrap();

        for secret in [&s1, &s2] {
            let mut out = Vec::new();
            decrypt_with_secret(secret, &ciphertext[..], &mut out).unwrap();
            assert_eq!(out, b"shared");
        }
    }
}
