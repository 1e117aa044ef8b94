//! Fuzz target for the session state machine.
//!
//! Feeds arbitrary peer bytes through every setup phase. The machine must
//! either advance or close, never panic, and never report ready after
//! closing.

#![no_main]

use bytes::Bytes;
use elaphure_core::{SessionAction, SessionMachine, SessionState};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut machine = SessionMachine::new();
    if machine.begin().is_err() || machine.connected().is_err() {
        return;
    }

    let mut rest = data;
    while let Some((&len, tail)) = rest.split_first() {
        let take = usize::from(len).min(tail.len());
        let (chunk, next) = tail.split_at(take);
        rest = next;

        let actions = match machine.state() {
            SessionState::Relaying if machine.in_flight().is_none() => {
                machine.produce(1, Bytes::copy_from_slice(chunk))
            },
            _ => machine.receive(chunk),
        };

        let Ok(actions) = actions else {
            break;
        };
        if actions.iter().any(|action| matches!(action, SessionAction::Close { .. })) {
            assert_eq!(machine.state(), SessionState::Closed);
            assert!(!actions.iter().any(|action| matches!(action, SessionAction::MarkReady)));
            break;
        }
    }
});
