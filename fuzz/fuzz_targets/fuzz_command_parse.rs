//! Fuzz target: inbound command routing.
//!
//! The first byte picks the action suffix, the rest is the message body.
//! Parsing must never panic; an accepted write must round-trip through
//! its textual form.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use mbbridge::app::commands::{self, InboundCommand, UPGRADE, WRITE_REGISTER};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let suffix = match selector % 3 {
        0 => WRITE_REGISTER,
        1 => UPGRADE,
        _ => "unknown",
    };

    if let Ok(Some(InboundCommand::WriteRegister { name, value })) = commands::parse(suffix, body) {
        assert!(!name.is_empty());
        let again = format!("{name}={value}");
        assert_eq!(
            commands::parse(WRITE_REGISTER, again.as_bytes()),
            Ok(Some(InboundCommand::WriteRegister { name, value }))
        );
    }
});
