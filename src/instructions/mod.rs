use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use crate::error::{EditError, ExternalService};
use crate::matcher::ReplacementPair;
use crate::providers::{Provider, ProviderReply, ToolSpec};

pub const TOOL_NAME: &str = "deliver_replacements";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.tera");

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    let parameters = json!({
        "type": "object",
        "properties": {
            "replacements": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "from": {"type": "string"},
                        "to": {"type": "string"}
                    },
                    "required": ["from", "to"]
                }
            }
        },
        "required": ["replacements"]
    });

    ToolSpec {
        name: tool_name.to_string(),
        description: "Return the replacement pairs extracted from the instruction.".to_string(),
        parameters,
    }
}

pub fn render_system_prompt(tool_name: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("tool_name", tool_name);
    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render system prompt")
}

/// Turns a free-form instruction into ordered replacement pairs.
///
/// Any provider or parsing failure is an `ExternalService` error for the
/// instruction parser.
pub async fn parse_instruction<P: Provider>(
    provider: P,
    instruction: &str,
) -> Result<Vec<ReplacementPair>> {
    request_pairs(provider, instruction)
        .await
        .map_err(|err| EditError::service(ExternalService::InstructionParser, err).into())
}

async fn request_pairs<P: Provider>(
    provider: P,
    instruction: &str,
) -> Result<Vec<ReplacementPair>> {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        return Err(anyhow!("instruction is empty"));
    }
    let system_prompt = render_system_prompt(TOOL_NAME)?;
    let response = provider
        .register_tool(tool_spec(TOOL_NAME))
        .append_system_input(system_prompt)
        .append_user_input(instruction.to_string())
        .call_tool(TOOL_NAME)
        .await?;

    if let Some(usage) = &response.usage {
        debug!(
            "instruction parser used {} tokens ({})",
            usage.total_tokens.unwrap_or_default(),
            response.model.as_deref().unwrap_or("unknown model")
        );
    }
    let value = match response.reply {
        ProviderReply::ToolArgs(value) => value,
        ProviderReply::Text(text) => extract_json(&text)?,
    };
    parse_tool_args(value)
}

/// Accepts `{"replacements": [...]}` or a bare list of pairs.
pub fn parse_tool_args(value: Value) -> Result<Vec<ReplacementPair>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ToolArgs {
        Wrapped { replacements: Vec<ReplacementPair> },
        Bare(Vec<ReplacementPair>),
    }

    let args: ToolArgs =
        serde_json::from_value(value).with_context(|| "tool arguments are not replacement pairs")?;
    let pairs = match args {
        ToolArgs::Wrapped { replacements } => replacements,
        ToolArgs::Bare(pairs) => pairs,
    };
    Ok(pairs)
}

/// Pulls JSON out of a prose answer.
///
/// Tries a fenced block first, then the span from the first `{`/`[` to the
/// last matching closer, then the whole text.
pub fn extract_json(text: &str) -> Result<Value> {
    if let Some(fenced) = fenced_block(text)
        && let Ok(value) = serde_json::from_str(fenced)
    {
        return Ok(value);
    }
    if let Some(span) = bracketed_span(text)
        && let Ok(value) = serde_json::from_str(span)
    {
        return Ok(value);
    }
    serde_json::from_str(text.trim()).with_context(|| "model answer contains no JSON")
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let end = rest.find("```")?;
    let body = rest[..end].trim_start();
    let body = body.strip_prefix("json").unwrap_or(body).trim();
    if body.starts_with('{') || body.starts_with('[') {
        Some(body)
    } else {
        None
    }
}

fn bracketed_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FakeProvider;

    #[test]
    fn wrapped_and_bare_lists_are_accepted() {
        let wrapped = json!({"replacements": [{"from": "オレ", "to": "私"}]});
        let bare = json!([{"from": "オレ", "to": "私"}]);
        let expected = vec![ReplacementPair::new("オレ", "私")];
        assert_eq!(parse_tool_args(wrapped).unwrap(), expected);
        assert_eq!(parse_tool_args(bare).unwrap(), expected);
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(parse_tool_args(json!({"replacements": [{"from": "a"}]})).is_err());
        assert!(parse_tool_args(json!("オレ→私")).is_err());
    }

    #[test]
    fn fenced_json_wins_over_surrounding_prose() {
        let text = "Here you go:\n```json\n[{\"from\": \"勝利\", \"to\": \"敗北\"}]\n```\nDone [1].";
        let value = extract_json(text).unwrap();
        assert_eq!(value, json!([{"from": "勝利", "to": "敗北"}]));
    }

    #[test]
    fn first_bracketed_span_is_used_without_fence() {
        let text = "Pairs: {\"replacements\": []} as requested";
        assert_eq!(extract_json(text).unwrap(), json!({"replacements": []}));
        assert_eq!(extract_json("  []  ").unwrap(), json!([]));
        assert!(extract_json("no pairs here").is_err());
    }

    #[tokio::test]
    async fn instruction_goes_through_the_tool_call() {
        let provider = FakeProvider::with_reply(ProviderReply::ToolArgs(json!({
            "replacements": [
                {"from": "オレ", "to": "私"},
                {"from": "勝利", "to": "敗北"}
            ]
        })));
        let pairs = parse_instruction(provider.clone(), "オレを私に、勝利を敗北に")
            .await
            .unwrap();
        assert_eq!(
            pairs,
            vec![
                ReplacementPair::new("オレ", "私"),
                ReplacementPair::new("勝利", "敗北"),
            ]
        );
        let seen = provider.seen();
        assert_eq!(seen.tool.as_deref(), Some(TOOL_NAME));
        assert_eq!(seen.user_inputs, vec!["オレを私に、勝利を敗北に".to_string()]);
        assert!(seen.system_inputs[0].contains(TOOL_NAME));
    }

    #[tokio::test]
    async fn prose_answer_falls_back_to_json_extraction() {
        let provider = FakeProvider::with_reply(ProviderReply::Text(
            "```json\n[{\"from\": \"犬\", \"to\": \"猫\"}]\n```".to_string(),
        ));
        let pairs = parse_instruction(provider, "犬を猫に").await.unwrap();
        assert_eq!(pairs, vec![ReplacementPair::new("犬", "猫")]);
    }

    #[tokio::test]
    async fn unusable_answer_is_an_instruction_parser_failure() {
        let provider = FakeProvider::with_reply(ProviderReply::Text("sorry".to_string()));
        let err = parse_instruction(provider, "犬を猫に").await.unwrap_err();
        let edit = err.downcast_ref::<EditError>().expect("edit error");
        assert!(matches!(
            edit,
            EditError::ExternalService {
                service: ExternalService::InstructionParser,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn blank_instruction_is_rejected() {
        let provider = FakeProvider::with_reply(ProviderReply::ToolArgs(json!([])));
        assert!(parse_instruction(provider, "  ").await.is_err());
    }
}
