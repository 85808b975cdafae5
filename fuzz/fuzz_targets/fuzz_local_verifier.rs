#![no_main]

use libfuzzer_sys::fuzz_target;
use pwalock_core::local::{derive_verifier, VERIFIER_BYTES};
use pwalock_core::{KeyMethod, LocalCredential};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (pin, salt) = text.split_once('\n').unwrap_or((text, "00112233445566778899aabbccddeeff"));

    // Single-round derivation over any salt string
    if let Ok(verifier) = derive_verifier(pin, salt, KeyMethod::Sha256) {
        assert_eq!(verifier.len(), VERIFIER_BYTES * 2);
        assert_eq!(
            derive_verifier(pin, salt, KeyMethod::Sha256).unwrap(),
            verifier
        );
    }

    // Stored parts that are not a valid credential are ignored
    if let Some(credential) = LocalCredential::from_parts(Some(salt.into()), Some(pin.into())) {
        let _ = credential.matches(pin, KeyMethod::Sha256);
    }
});
