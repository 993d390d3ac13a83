//! Deterministic, bounded-token context composition.
//!
//! The teacher's `neuron-context` crate composes context through a
//! pluggable `ContextStrategy` chain (sliding window, tool-result
//! clearing, summarization) the caller assembles per-session. This
//! component instead implements one fixed, auditable budget-split
//! algorithm: system prompt first, a capped slice for memories, the
//! remainder for history — no pluggable strategies, because the spec
//! pins the split ratios and ordering exactly rather than leaving them to
//! configuration.

use tiny_agent_tokens::TokenCounter;
use tiny_agent_types::{ContextStats, Memory, MemoryCategory, Message, Role};

/// Tokens held back for the model's own response, subtracted from
/// `max_context_tokens` before any budget split happens.
pub const DEFAULT_RESERVE_FOR_RESPONSE: usize = 1000;

/// The fraction of the post-reserve budget memories may claim before the
/// remainder goes to conversation history.
const MEMORY_BUDGET_FRACTION: f64 = 0.20;

/// Assembles a bounded-token message list from a system prompt, a list of
/// memories already ordered by relevance (most relevant first — see the
/// Memory Store's `find_relevant`), and conversation history.
///
/// Returns the composed messages, token accounting for observability, and
/// whether anything had to be dropped to fit the budget.
#[must_use]
pub fn compose(
    system_prompt: &str,
    memories: &[Memory],
    history: &[Message],
    max_context_tokens: usize,
    max_memory_tokens: Option<usize>,
) -> (Vec<Message>, ContextStats, bool) {
    let counter = TokenCounter::new();
    let system_message = Message::system(system_prompt);
    let system_prompt_tokens = counter.estimate_message(&system_message);

    let available =
        max_context_tokens as i64 - system_prompt_tokens as i64 - DEFAULT_RESERVE_FOR_RESPONSE as i64;
    if available <= 0 {
        let truncation_applied = !memories.is_empty() || !history.is_empty();
        let stats = ContextStats {
            system_prompt_tokens,
            memory_tokens: 0,
            conversation_tokens: 0,
            total_tokens: system_prompt_tokens,
            max_context_tokens,
        };
        return (vec![system_message], stats, truncation_applied);
    }
    let available = available as usize;

    let memory_budget = max_memory_tokens
        .unwrap_or(usize::MAX)
        .min(((available as f64) * MEMORY_BUDGET_FRACTION).floor() as usize);
    let conversation_budget = available - memory_budget;

    let (selected_memories, memories_dropped) = select_memories(&counter, memories, memory_budget);

    let mut messages = vec![system_message];
    let memory_tokens = if selected_memories.is_empty() {
        0
    } else {
        let memory_message = render_memory_message(&selected_memories);
        let tokens = counter.estimate_message(&memory_message);
        messages.push(memory_message);
        tokens
    };

    let (conversation_messages, conversation_tokens, conversation_dropped) =
        select_conversation(&counter, history, conversation_budget);
    messages.extend(conversation_messages);

    let total_tokens = system_prompt_tokens + memory_tokens + conversation_tokens;
    let stats = ContextStats {
        system_prompt_tokens,
        memory_tokens,
        conversation_tokens,
        total_tokens,
        max_context_tokens,
    };
    (messages, stats, memories_dropped || conversation_dropped)
}

/// Appends memories one at a time, in the order given, while the running
/// total stays within `budget`. Stops at the first one that would overflow
/// it — the caller is expected to have already ordered `memories` by
/// relevance, so later entries are progressively less worth keeping.
fn select_memories<'a>(
    counter: &TokenCounter,
    memories: &'a [Memory],
    budget: usize,
) -> (Vec<&'a Memory>, bool) {
    let mut selected = Vec::new();
    let mut running = 0usize;
    for memory in memories {
        let tokens = counter.estimate_str(&memory_line(memory));
        if running + tokens > budget {
            return (selected, true);
        }
        running += tokens;
        selected.push(memory);
    }
    (selected, false)
}

fn memory_line(memory: &Memory) -> String {
    format!("- [{}] {}\n", category_label(memory.category), memory.content)
}

fn render_memory_message(memories: &[&Memory]) -> Message {
    let mut block = String::from("## Relevant Memories\n");
    for memory in memories {
        block.push_str(&memory_line(memory));
    }
    Message::system(block)
}

fn category_label(category: MemoryCategory) -> &'static str {
    match category {
        MemoryCategory::User => "user",
        MemoryCategory::Project => "project",
        MemoryCategory::Codebase => "codebase",
    }
}

/// Walks history newest-to-oldest, accumulating whole tool-call groups
/// (an assistant message with `tool_calls` plus its following `tool`
/// messages, which the data model's ordering invariant keeps contiguous)
/// until `budget` is exhausted, then returns them in chronological order.
fn select_conversation(
    counter: &TokenCounter,
    history: &[Message],
    budget: usize,
) -> (Vec<Message>, usize, bool) {
    let groups = group_history(history);
    let mut selected: Vec<Vec<Message>> = Vec::new();
    let mut running = 0usize;
    let mut dropped = false;

    for group in groups.into_iter().rev() {
        let group_tokens: usize = group.iter().map(|m| counter.estimate_message(m)).sum();
        if running + group_tokens > budget {
            dropped = true;
            break;
        }
        running += group_tokens;
        selected.push(group);
    }
    selected.reverse();

    let messages = selected.into_iter().flatten().collect();
    (messages, running, dropped)
}

/// Splits history into atomic groups: a standalone message, or an
/// assistant message carrying `tool_calls` together with the `tool`
/// messages that answer it.
fn group_history(history: &[Message]) -> Vec<Vec<Message>> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < history.len() {
        let message = &history[i];
        let tool_call_count = match (message.role, &message.tool_calls) {
            (Role::Assistant, Some(calls)) if !calls.is_empty() => calls.len(),
            _ => 0,
        };
        if tool_call_count > 0 {
            let mut group = vec![message.clone()];
            let mut j = i + 1;
            while j < history.len() && group.len() - 1 < tool_call_count && history[j].role == Role::Tool
            {
                group.push(history[j].clone());
                j += 1;
            }
            groups.push(group);
            i = j;
        } else {
            groups.push(vec![message.clone()]);
            i += 1;
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_agent_types::ToolCall;

    fn memory(content: &str, category: MemoryCategory) -> Memory {
        use chrono::Utc;
        Memory {
            id: "m1".into(),
            content: content.into(),
            category,
            created_at: Utc::now(),
            last_accessed_at: Utc::now(),
            access_count: 0,
        }
    }

    #[test]
    fn system_message_always_first() {
        let (messages, _, _) = compose("you are helpful", &[], &[], 10_000, None);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "you are helpful");
    }

    #[test]
    fn non_positive_available_returns_only_system_message() {
        let history = vec![Message::user("hello")];
        let (messages, stats, truncated) = compose("prompt", &[], &history, 10, None);
        assert_eq!(messages.len(), 1);
        assert_eq!(stats.memory_tokens, 0);
        assert_eq!(stats.conversation_tokens, 0);
        assert!(truncated);
    }

    #[test]
    fn memories_attach_as_single_synthetic_system_message() {
        let memories = vec![
            memory("likes rust", MemoryCategory::User),
            memory("uses tokio", MemoryCategory::Codebase),
        ];
        let (messages, stats, _) = compose("prompt", &memories, &[], 10_000, None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::System);
        assert!(messages[1].content.starts_with("## Relevant Memories"));
        assert!(stats.memory_tokens > 0);
    }

    #[test]
    fn no_memories_means_no_synthetic_message() {
        let (messages, stats, _) = compose("prompt", &[], &[], 10_000, None);
        assert_eq!(messages.len(), 1);
        assert_eq!(stats.memory_tokens, 0);
    }

    #[test]
    fn memory_budget_is_capped_at_twenty_percent_of_available() {
        let memories: Vec<Memory> = (0..50)
            .map(|i| memory(&"x".repeat(200), MemoryCategory::User).tap(|m| m.id = i.to_string()))
            .collect();
        let (_, stats, truncated) = compose("p", &memories, &[], 2_000, None);
        let available = 2_000 - stats.system_prompt_tokens - DEFAULT_RESERVE_FOR_RESPONSE;
        let cap = ((available as f64) * MEMORY_BUDGET_FRACTION).floor() as usize;
        assert!(stats.memory_tokens <= cap);
        assert!(truncated);
    }

    #[test]
    fn max_memory_tokens_overrides_percentage_when_tighter() {
        let memories = vec![memory(&"x".repeat(200), MemoryCategory::User)];
        let (_, stats, _) = compose("p", &memories, &[], 10_000, Some(5));
        assert!(stats.memory_tokens <= 5 || stats.memory_tokens == 0);
    }

    #[test]
    fn history_walks_newest_to_oldest_then_reverses() {
        let history = vec![
            Message::user("first"),
            Message::assistant("second", vec![]),
            Message::user("third"),
        ];
        let (messages, _, truncated) = compose("p", &[], &history, 10_000, None);
        assert!(!truncated);
        let contents: Vec<&str> = messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn tool_call_result_pair_not_split_across_budget_boundary() {
        let call = ToolCall {
            id: "tu_1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"path": "a.rs"}),
        };
        let history = vec![
            Message::user(&"padding ".repeat(50)),
            Message::assistant("", vec![call.clone()]),
            Message::tool_result("tu_1", "file contents"),
        ];
        // A conversation budget wide enough for the tool-call/tool-result
        // pair but not for the padding message ahead of it; the pair must
        // survive atomically even though it's squeezed against the edge.
        let (messages, _, truncated) = compose("p", &[], &history, 1_100, None);
        assert!(truncated);
        let has_assistant_tool_call = messages
            .iter()
            .any(|m| m.role == Role::Assistant && m.tool_calls.is_some());
        let has_tool_result = messages.iter().any(|m| m.role == Role::Tool);
        assert_eq!(has_assistant_tool_call, has_tool_result);
    }

    #[test]
    fn full_history_fits_when_budget_is_generous() {
        let call = ToolCall {
            id: "tu_1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"path": "a.rs"}),
        };
        let history = vec![
            Message::user("hi"),
            Message::assistant("", vec![call]),
            Message::tool_result("tu_1", "contents"),
            Message::assistant("done", vec![]),
        ];
        let (messages, _, truncated) = compose("p", &[], &history, 50_000, None);
        assert!(!truncated);
        assert_eq!(messages.len(), 1 + history.len());
    }

    trait Tap: Sized {
        fn tap(mut self, f: impl FnOnce(&mut Self)) -> Self {
            f(&mut self);
            self
        }
    }
    impl<T> Tap for T {}

    proptest::proptest! {
        #[test]
        fn composed_total_never_exceeds_max_context_tokens(
            max_context_tokens in 1500usize..20_000,
            history_len in 0usize..30,
        ) {
            let history: Vec<Message> = (0..history_len)
                .map(|i| Message::user(format!("message number {i} with some body text")))
                .collect();
            let (_, stats, _) = compose("you are a helpful assistant", &[], &history, max_context_tokens, None);
            prop_assert!(stats.total_tokens <= max_context_tokens);
        }
    }
}
