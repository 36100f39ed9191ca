#![no_main]

//! Fuzz target for webhook payload parsing.
//!
//! Arbitrary bytes must never panic the parser or the domain factory; every
//! input ends as an event or a classified error.

use libfuzzer_sys::fuzz_target;
use switchhook_core::{build_from_hub2_event, parse_envelope, SwitchBotWebhookEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = parse_envelope(data) else { return };

    if let Ok(SwitchBotWebhookEvent::Hub2(event)) = SwitchBotWebhookEvent::from_envelope(envelope) {
        if let Ok(entity) = build_from_hub2_event(&event) {
            assert!((0.0..=100.0).contains(&entity.brightness()));
            assert!((-50.0..=60.0).contains(&entity.temperature()));
        }
    }
});
