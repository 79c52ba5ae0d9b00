use std::collections::HashSet;

use codexgate_protocol::responses::{InputItem, MessageItem};

/// Prepended in codex mode so the model maps its built-in habits onto the caller's tools.
pub const BRIDGE_MESSAGE: &str = "\
The tools listed in this request are provided by the client application that is relaying \
this conversation, not by the Codex CLI harness. Use only the tools exactly as they are \
declared here, with their declared names and argument schemas. Commands such as \
`apply_patch`, `update_plan` or `shell` exist only when they appear in the tool list; if \
they do not, reach for the closest declared tool instead. Everything else in the base \
instructions still applies.";

/// Prepended outside codex mode, where no harness prompt explains the tool set.
pub const TOOL_REMAP_MESSAGE: &str = "\
Tool usage for this session: call only the functions declared in this request. Do not \
assume a `shell`, `apply_patch` or `update_plan` tool is available unless one is declared. \
To edit files, read them first with the declared read tool and then use the declared edit \
or write tool. To run commands, use the declared command tool. Keep tool arguments valid \
against the declared JSON schemas.";

/// Drops `item_reference` entries and removes every identifier.
///
/// The backend runs with `store=false`, so ids referring to server-side items
/// would be rejected.
pub fn filter_input(items: Vec<InputItem>) -> Vec<InputItem> {
    items
        .into_iter()
        .filter_map(|item| match item {
            InputItem::ItemReference(_) => None,
            InputItem::Message(mut message) => {
                message.id = None;
                Some(InputItem::Message(message))
            }
            InputItem::FunctionCall(mut call) => {
                call.id = None;
                Some(InputItem::FunctionCall(call))
            }
            InputItem::FunctionCallOutput(mut output) => {
                output.id = None;
                Some(InputItem::FunctionCallOutput(output))
            }
            InputItem::Reasoning(mut reasoning) => {
                reasoning.id = None;
                Some(InputItem::Reasoning(reasoning))
            }
            InputItem::Other(mut object) => {
                object.remove("id");
                Some(InputItem::Other(object))
            }
        })
        .collect()
}

/// Removes developer/system messages whose text equals the caller's cached system prompt.
pub fn filter_system_prompts(items: Vec<InputItem>, cached_prompt: Option<&str>) -> Vec<InputItem> {
    let Some(prompt) = cached_prompt.filter(|prompt| !prompt.is_empty()) else {
        return items;
    };
    items
        .into_iter()
        .filter(|item| match item {
            InputItem::Message(message) => {
                !(message.is_instruction_role() && message.content.text() == prompt)
            }
            InputItem::ItemReference(_)
            | InputItem::FunctionCall(_)
            | InputItem::FunctionCallOutput(_)
            | InputItem::Reasoning(_)
            | InputItem::Other(_) => true,
        })
        .collect()
}

pub fn add_bridge_message(items: Vec<InputItem>, has_tools: bool) -> Vec<InputItem> {
    prepend_developer_message(items, has_tools, BRIDGE_MESSAGE)
}

pub fn add_tool_remap_message(items: Vec<InputItem>, has_tools: bool) -> Vec<InputItem> {
    prepend_developer_message(items, has_tools, TOOL_REMAP_MESSAGE)
}

fn prepend_developer_message(items: Vec<InputItem>, has_tools: bool, text: &str) -> Vec<InputItem> {
    if !has_tools {
        return items;
    }
    let already_present = items
        .first()
        .and_then(InputItem::message_text)
        .is_some_and(|head| head == text);
    if already_present {
        return items;
    }
    let mut out = Vec::with_capacity(items.len() + 1);
    out.push(InputItem::Message(MessageItem::text("developer", text)));
    out.extend(items);
    out
}

/// Rewrites tool outputs whose call is missing from the history into assistant
/// messages carrying the same text, so truncated histories stay acceptable.
pub fn normalize_orphaned_tool_outputs(items: Vec<InputItem>) -> Vec<InputItem> {
    let call_ids: HashSet<String> = items
        .iter()
        .filter_map(|item| match item {
            InputItem::FunctionCall(call) => Some(call.call_id.clone()),
            InputItem::Other(object) => {
                let is_call = object
                    .get("type")
                    .and_then(|value| value.as_str())
                    .is_some_and(|kind| kind.ends_with("_call"));
                if is_call {
                    object
                        .get("call_id")
                        .and_then(|value| value.as_str())
                        .map(str::to_string)
                } else {
                    None
                }
            }
            InputItem::Message(_)
            | InputItem::ItemReference(_)
            | InputItem::FunctionCallOutput(_)
            | InputItem::Reasoning(_) => None,
        })
        .collect();

    items
        .into_iter()
        .map(|item| match item {
            InputItem::FunctionCallOutput(output) if !call_ids.contains(&output.call_id) => {
                let text = format!(
                    "[Previous tool result; call_id={}]: {}",
                    output.call_id,
                    output.output.text()
                );
                InputItem::Message(MessageItem::text("assistant", text))
            }
            other => other,
        })
        .collect()
}
