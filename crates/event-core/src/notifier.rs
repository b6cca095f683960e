//! Mapping parse transitions to moderator notifications.

use serde::{Deserialize, Serialize};

use crate::updater::Transition;

/// What the transport layer should do about validity notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    NoOp,
    /// The message became parseable; retract the earlier notice.
    ClearOldNotice,
    /// A new message without a usable date.
    RaiseNewInvalid,
    /// An edit broke a previously valid date.
    RaiseBecameInvalid,
    /// A new message dated in the past.
    RaiseInPast,
    /// An edit moved a past date into the future.
    ClearInPastNotice,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoOp => "no_op",
            Self::ClearOldNotice => "clear_old_notice",
            Self::RaiseNewInvalid => "raise_new_invalid",
            Self::RaiseBecameInvalid => "raise_became_invalid",
            Self::RaiseInPast => "raise_in_past",
            Self::ClearInPastNotice => "clear_in_past_notice",
        }
    }

    /// Whether a notice should be sent.
    pub fn is_raise(&self) -> bool {
        matches!(
            self,
            Self::RaiseNewInvalid | Self::RaiseBecameInvalid | Self::RaiseInPast
        )
    }

    /// Whether an existing notice should be removed.
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::ClearOldNotice | Self::ClearInPastNotice)
    }
}

/// Decide the notification intent for a transition. First matching rule wins.
///
/// Edits that stay invalid are not raised again: the earlier notice still
/// stands for the same problem.
pub fn decide(transition: &Transition, notifications_enabled: bool) -> Intent {
    let Transition {
        was_valid,
        is_valid,
        was_in_past,
        is_in_past,
        is_edit,
    } = *transition;

    if !notifications_enabled {
        Intent::NoOp
    } else if !was_valid && is_valid {
        Intent::ClearOldNotice
    } else if !is_valid && !is_edit {
        Intent::RaiseNewInvalid
    } else if was_valid && !is_valid {
        Intent::RaiseBecameInvalid
    } else if !is_edit && is_valid && is_in_past {
        Intent::RaiseInPast
    } else if is_edit && is_valid && was_in_past && !is_in_past {
        Intent::ClearInPastNotice
    } else {
        Intent::NoOp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(
        was_valid: bool,
        is_valid: bool,
        was_in_past: bool,
        is_in_past: bool,
        is_edit: bool,
    ) -> Transition {
        Transition {
            was_valid,
            is_valid,
            was_in_past,
            is_in_past,
            is_edit,
        }
    }

    #[test]
    fn test_minimal_transitions() {
        let cases = [
            (transition(false, true, false, false, true), Intent::ClearOldNotice),
            (transition(true, false, false, false, false), Intent::RaiseNewInvalid),
            (transition(true, false, false, false, true), Intent::RaiseBecameInvalid),
            (transition(true, true, false, true, false), Intent::RaiseInPast),
            (transition(true, true, true, false, true), Intent::ClearInPastNotice),
            (transition(true, true, false, false, false), Intent::NoOp),
        ];
        for (input, expected) in cases {
            assert_eq!(decide(&input, true), expected, "{:?}", input);
        }
    }

    #[test]
    fn test_disabled_notifications() {
        let input = transition(true, false, false, false, false);
        assert_eq!(decide(&input, false), Intent::NoOp);
    }

    #[test]
    fn test_edit_staying_invalid_is_not_raised() {
        let input = transition(false, false, false, false, true);
        assert_eq!(decide(&input, true), Intent::NoOp);
    }

    #[test]
    fn test_edit_into_past_is_not_raised() {
        let input = transition(true, true, false, true, true);
        assert_eq!(decide(&input, true), Intent::NoOp);
    }

    #[test]
    fn test_every_combination_yields_one_consistent_intent() {
        for bits in 0u8..32 {
            let input = transition(
                bits & 1 != 0,
                bits & 2 != 0,
                bits & 4 != 0,
                bits & 8 != 0,
                bits & 16 != 0,
            );
            let intent = decide(&input, true);
            assert!(!(intent.is_raise() && intent.is_clear()));

            match intent {
                Intent::ClearOldNotice => assert!(!input.was_valid && input.is_valid),
                Intent::RaiseNewInvalid => assert!(!input.is_valid && !input.is_edit),
                Intent::RaiseBecameInvalid => {
                    assert!(input.was_valid && !input.is_valid && input.is_edit)
                }
                Intent::RaiseInPast => assert!(input.is_valid && input.is_in_past && !input.is_edit),
                Intent::ClearInPastNotice => {
                    assert!(input.is_edit && input.was_in_past && !input.is_in_past)
                }
                Intent::NoOp => {}
            }
            assert_eq!(decide(&input, false), Intent::NoOp);
        }
    }
}
