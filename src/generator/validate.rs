//! Structural validation of generated instructions.
//!
//! The word-count thresholds are a fixed contract with the generation
//! backend's prompt; they are deliberately literal constants.

use serde_json::Value;

use super::{Choice, Instruction};

const MAX_QUESTION_WORDS: usize = 25;
const MAX_OPTION_WORDS: usize = 15;
const MAX_NEXT_ACTION_WORDS: usize = 30;

/// Check a candidate JSON document against the instruction shape and
/// convert it into a typed [`Instruction`].
///
/// Presence and type violations (missing or mistyped `question`, `choices`,
/// `option`, `next_action`) are validation failures, the same class as the
/// length rules: the backend answered, but with a malformed instruction.
///
/// # Errors
///
/// Returns a human-readable reason string on the first failed rule.
pub fn validate_candidate(value: &Value) -> Result<Instruction, String> {
    let question = value
        .get("question")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing or invalid question".to_string())?;

    let raw_choices = value
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| "choices must be an array of options".to_string())?;

    if raw_choices.len() < 2 {
        return Err(format!(
            "choices must contain at least 2 options, got {}",
            raw_choices.len()
        ));
    }

    let mut choices = Vec::with_capacity(raw_choices.len());
    for (idx, raw) in raw_choices.iter().enumerate() {
        let option = raw
            .get("option")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("choice {idx} has a missing or invalid option"))?;
        let next_action = raw
            .get("next_action")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("choice {idx} has a missing or invalid next_action"))?;
        choices.push(Choice {
            option: option.to_string(),
            next_action: next_action.to_string(),
        });
    }

    let instruction = Instruction {
        question: question.to_string(),
        choices,
    };
    validate_instruction(&instruction)?;
    Ok(instruction)
}

/// Check a candidate instruction against the structural and length rules.
///
/// Checks run in a fixed order and the first violation wins; the returned
/// reason names the rule that failed. No side effects.
///
/// # Errors
///
/// Returns a human-readable reason string on the first failed rule.
pub fn validate_instruction(instruction: &Instruction) -> Result<(), String> {
    if instruction.question.is_empty() {
        return Err("missing or empty question".to_string());
    }

    if instruction.choices.len() < 2 {
        return Err(format!(
            "choices must contain at least 2 options, got {}",
            instruction.choices.len()
        ));
    }

    for (idx, choice) in instruction.choices.iter().enumerate() {
        if choice.option.is_empty() {
            return Err(format!("choice {idx} has an empty option"));
        }
        if choice.next_action.is_empty() {
            return Err(format!("choice {idx} has an empty next_action"));
        }
    }

    if word_count(&instruction.question) > MAX_QUESTION_WORDS {
        return Err(format!("question exceeds {MAX_QUESTION_WORDS} words"));
    }

    for (idx, choice) in instruction.choices.iter().enumerate() {
        if word_count(&choice.option) > MAX_OPTION_WORDS {
            return Err(format!("choice {idx} option exceeds {MAX_OPTION_WORDS} words"));
        }
        if word_count(&choice.next_action) > MAX_NEXT_ACTION_WORDS {
            return Err(format!(
                "choice {idx} next_action exceeds {MAX_NEXT_ACTION_WORDS} words"
            ));
        }
    }

    Ok(())
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}
