#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pwalock_core::config::{
    clamp_idle_seconds, clamp_max_failures, parse_int, MAX_IDLE_SECONDS, MAX_MAX_FAILURES,
    MIN_IDLE_SECONDS, MIN_MAX_FAILURES,
};
use pwalock_core::{AdminSettings, AdminSettingsInput, EffectiveConfig};

#[derive(Debug, Arbitrary)]
struct Input {
    encryption_mode: Option<String>,
    key_method: Option<String>,
    ask_on_background: Option<String>,
    default_idle_seconds: Option<String>,
    max_failures: Option<String>,
    user_idle: String,
}

fuzz_target!(|input: Input| {
    let settings = AdminSettings::from_input(&AdminSettingsInput {
        encryption_mode: input.encryption_mode,
        key_method: input.key_method,
        ask_on_background: input.ask_on_background,
        default_idle_seconds: input.default_idle_seconds,
        max_failures: input.max_failures,
    });

    // Whatever was submitted, stored values are in bounds
    assert!((MIN_IDLE_SECONDS..=MAX_IDLE_SECONDS).contains(&settings.default_idle_seconds));
    assert!((MIN_MAX_FAILURES..=MAX_MAX_FAILURES).contains(&settings.max_failures));

    if let Some(n) = parse_int(&input.user_idle) {
        let idle = clamp_idle_seconds(n);
        assert!((MIN_IDLE_SECONDS..=MAX_IDLE_SECONDS).contains(&idle));
        let failures = clamp_max_failures(n);
        assert!((MIN_MAX_FAILURES..=MAX_MAX_FAILURES).contains(&failures));
    }

    // A server response with out-of-range numbers is pulled back in
    if let Ok(config) = serde_json::from_str::<EffectiveConfig>(&input.user_idle) {
        let config = config.clamped();
        assert!((MIN_IDLE_SECONDS..=MAX_IDLE_SECONDS).contains(&config.idle_seconds));
        assert!((MIN_MAX_FAILURES..=MAX_MAX_FAILURES).contains(&config.max_failures));
    }
});
