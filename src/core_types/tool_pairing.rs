//! Structural repair of tool-call / tool-response pairing
//!
//! Providers reject conversations where an assistant tool call has no
//! matching tool response (or a response answers a call that was never
//! made). Conversations arrive in that state after truncation, cancellation
//! or a crash mid-turn, so every translator runs this repair first.
//!
//! The repair works on whole assistant messages: a message keeps its calls
//! only when every call is answered later in the conversation, before the
//! same id is called again. It never keeps a subset of one message's calls,
//! and responses belonging to dropped calls go with them. Running it twice
//! changes nothing.

use super::messages::{ContentPart, MessageRole, UnifiedMessage};
use crate::logging::log_debug;
use std::collections::{HashMap, HashSet};

/// What the repair changed, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Assistant messages kept with their function calls removed
    pub stripped_messages: usize,
    /// Messages removed entirely
    pub removed_messages: usize,
    /// Orphaned or duplicate function responses removed
    pub removed_responses: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Repair a conversation and return the cleaned copy.
pub fn repair_tool_call_pairs(messages: &[UnifiedMessage]) -> Vec<UnifiedMessage> {
    let (repaired, report) = repair_tool_call_pairs_with_report(messages);
    if !report.is_clean() {
        log_debug!(
            stripped_messages = report.stripped_messages,
            removed_messages = report.removed_messages,
            removed_responses = report.removed_responses,
            "Repaired unmatched tool calls in conversation"
        );
    }
    repaired
}

pub fn repair_tool_call_pairs_with_report(
    messages: &[UnifiedMessage],
) -> (Vec<UnifiedMessage>, RepairReport) {
    let pairing = Pairing::scan(messages);
    let complete: HashSet<usize> = messages
        .iter()
        .enumerate()
        .filter(|(index, message)| {
            message.role == MessageRole::Assistant
                && message.has_function_calls()
                && pairing.all_calls_answered(*index, message)
        })
        .map(|(index, _)| index)
        .collect();

    let mut report = RepairReport::default();
    let mut repaired = Vec::with_capacity(messages.len());

    for (index, message) in messages.iter().enumerate() {
        let strips_calls = message.role == MessageRole::Assistant
            && message.has_function_calls()
            && !complete.contains(&index);

        let mut removed_responses = 0;
        let content: Vec<ContentPart> = message
            .content
            .iter()
            .enumerate()
            .filter(|(part_index, part)| match part {
                ContentPart::FunctionCall { .. } if strips_calls => false,
                ContentPart::FunctionResponse { .. } => {
                    let keep = pairing
                        .owner_of((index, *part_index))
                        .is_some_and(|owner| complete.contains(&owner));
                    if !keep {
                        removed_responses += 1;
                    }
                    keep
                }
                _ => true,
            })
            .map(|(_, part)| part.clone())
            .collect();
        report.removed_responses += removed_responses;

        if content.is_empty() && !message.content.is_empty() {
            report.removed_messages += 1;
            continue;
        }
        if strips_calls {
            report.stripped_messages += 1;
        }
        repaired.push(UnifiedMessage::new(message.role, content));
    }

    (repaired, report)
}

/// (message index, part index)
type PartRef = (usize, usize);

/// Which response answers which call.
///
/// A call is answered by the first later response carrying its id, unless
/// another assistant call reuses the id first. Each response answers at most
/// one call.
#[derive(Debug, Default)]
struct Pairing {
    answered_calls: HashSet<PartRef>,
    /// Response position to the message index of the call it answers
    response_owner: HashMap<PartRef, usize>,
}

impl Pairing {
    fn scan(messages: &[UnifiedMessage]) -> Self {
        let mut pairing = Self::default();
        let mut open: HashMap<&str, PartRef> = HashMap::new();

        for (index, message) in messages.iter().enumerate() {
            for (part_index, part) in message.content.iter().enumerate() {
                if let ContentPart::FunctionResponse { id: Some(id), .. } = part {
                    if let Some(call) = open.remove(id.as_str()) {
                        pairing.answered_calls.insert(call);
                        pairing.response_owner.insert((index, part_index), call.0);
                    }
                }
            }

            if message.role != MessageRole::Assistant {
                continue;
            }
            for (part_index, part) in message.content.iter().enumerate() {
                if let ContentPart::FunctionCall { id: Some(id), .. } = part {
                    // A reused id leaves the earlier call unanswered
                    open.insert(id.as_str(), (index, part_index));
                }
            }
        }
        pairing
    }

    fn all_calls_answered(&self, index: usize, message: &UnifiedMessage) -> bool {
        message
            .content
            .iter()
            .enumerate()
            .filter(|(_, part)| part.is_function_call())
            .all(|(part_index, part)| {
                matches!(part, ContentPart::FunctionCall { id: Some(_), .. })
                    && self.answered_calls.contains(&(index, part_index))
            })
    }

    fn owner_of(&self, response: PartRef) -> Option<usize> {
        self.response_owner.get(&response).copied()
    }
}
