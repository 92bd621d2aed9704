use tracing::warn;

use crate::{
    chat::{ChatResponse, FinishReason},
    error::ValidationError,
};

/// Checks that a completion stopped for a reason the caller can work with.
///
/// `length` and `content_filter` map to dedicated errors even when a caller forgets to list
/// them; anything else outside `allowed` is reported together with the expected set.
pub fn validate(response: &ChatResponse, allowed: &[FinishReason]) -> Result<(), ValidationError> {
    let Some(reason) = response.finish_reason() else {
        warn!("Chat completion contained no choices");
        return Err(ValidationError::UnexpectedFinishReason {
            actual: "<missing>".to_string(),
            expected: allowed.to_vec(),
        });
    };

    if allowed.contains(reason) {
        return Ok(());
    }

    warn!(finish_reason = %reason, "Chat completion finished for a disallowed reason");
    match reason {
        FinishReason::Length => Err(ValidationError::ContextOverflow),
        FinishReason::ContentFilter => Err(ValidationError::PolicyViolation),
        other => Err(ValidationError::UnexpectedFinishReason {
            actual: other.to_string(),
            expected: allowed.to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Choice, ResponseMessage};

    fn response(reason: &str) -> ChatResponse {
        ChatResponse {
            id: None,
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: Some("assistant".into()),
                    content: Some("...".into()),
                    tool_calls: None,
                },
                finish_reason: FinishReason::from(reason),
            }],
        }
    }

    const TURN: [FinishReason; 2] = [FinishReason::ToolCalls, FinishReason::Stop];

    #[test]
    fn allowed_reasons_pass() {
        assert_eq!(validate(&response("tool_calls"), &TURN), Ok(()));
        assert_eq!(validate(&response("stop"), &TURN), Ok(()));
    }

    #[test]
    fn length_is_context_overflow() {
        assert_eq!(validate(&response("length"), &TURN), Err(ValidationError::ContextOverflow));
    }

    #[test]
    fn content_filter_is_policy_violation() {
        assert_eq!(
            validate(&response("content_filter"), &TURN),
            Err(ValidationError::PolicyViolation)
        );
    }

    #[test]
    fn allowed_set_wins_over_classification() {
        assert_eq!(validate(&response("length"), &[FinishReason::Length]), Ok(()));
    }

    #[test]
    fn disallowed_known_reason_is_unexpected() {
        let err = validate(&response("tool_calls"), &[FinishReason::Stop]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnexpectedFinishReason {
                actual: "tool_calls".into(),
                expected: vec![FinishReason::Stop],
            }
        );
    }

    #[test]
    fn unknown_reason_carries_actual_and_expected() {
        let err = validate(&response("function_call"), &TURN).unwrap_err();
        let ValidationError::UnexpectedFinishReason { actual, expected } = err else {
            panic!("wrong variant");
        };
        assert_eq!(actual, "function_call");
        assert_eq!(expected, TURN.to_vec());
    }

    #[test]
    fn empty_choices_are_unexpected() {
        let empty = ChatResponse { id: None, choices: vec![] };
        assert!(matches!(
            validate(&empty, &TURN),
            Err(ValidationError::UnexpectedFinishReason { ref actual, .. }) if actual == "<missing>"
        ));
    }
}
