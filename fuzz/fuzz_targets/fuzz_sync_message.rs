#![no_main]

use libfuzzer_sys::fuzz_target;
use pwalock_client::SyncMessage;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // Malformed messages are dropped, never a panic
    if let Some(message) = SyncMessage::decode(raw) {
        let decoded = SyncMessage::decode(&message.encode()).unwrap();
        assert_eq!(decoded.kind, message.kind);
    }
});
