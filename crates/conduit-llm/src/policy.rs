//! Image handling for tool results
//!
//! MCP tools return screenshots as `{"type":"image","data":..,"mimeType":..}`
//! blocks, which no upstream accepts verbatim. Models with vision support
//! get them as `image_url` data URIs; everything else gets a text
//! placeholder.

use conduit_config::ContentPolicyConfig;
use regex::{Regex, RegexBuilder};

use crate::protocol::openai::{OpenAiContent, OpenAiContentPart, OpenAiImageUrl, OpenAiMessage};

/// Text substituted for an image over the size limit
pub const IMAGE_TOO_LARGE_PLACEHOLDER: &str = "[Image omitted due to size]";

const DEFAULT_MIME_TYPE: &str = "image/png";

/// Model capability and size rules for inline images
#[derive(Debug, Clone)]
pub struct ContentPolicy {
    vision_models: Vec<Regex>,
    max_image_bytes: usize,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        let config = ContentPolicyConfig::default();
        Self {
            vision_models: config
                .vision_model_patterns()
                .iter()
                .filter_map(|pattern| compile(pattern).ok())
                .collect(),
            max_image_bytes: config.max_image_bytes,
        }
    }
}

/// What applying the policy to a message list did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImagePolicyOutcome {
    /// Tool messages whose images were converted to `image_url` blocks
    pub converted: usize,
    /// Tool messages whose images were replaced by a placeholder
    pub stripped: usize,
}

impl ContentPolicy {
    pub fn from_config(config: &ContentPolicyConfig) -> Result<Self, regex::Error> {
        let vision_models = config
            .vision_model_patterns()
            .iter()
            .map(|pattern| compile(pattern))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            vision_models,
            max_image_bytes: config.max_image_bytes,
        })
    }

    /// Whether `model` accepts image input
    pub fn supports_images(&self, model: &str) -> bool {
        self.vision_models.iter().any(|pattern| pattern.is_match(model))
    }

    /// Whether base64 `data` decodes to more than the configured limit
    pub fn is_image_too_large(&self, data: &str) -> bool {
        decoded_len(data) > self.max_image_bytes
    }

    /// Rewrite MCP image blocks in every tool message for `model`
    pub fn apply(&self, model: &str, messages: &mut [OpenAiMessage]) -> ImagePolicyOutcome {
        let supports_images = self.supports_images(model);
        let mut outcome = ImagePolicyOutcome::default();

        for message in messages.iter_mut().filter(|m| m.is_tool()) {
            let Some(OpenAiContent::Parts(parts)) = &message.content else {
                continue;
            };
            if !has_image_content(parts) {
                continue;
            }

            if supports_images {
                if let Some(converted) = self.convert_mcp_image_blocks(parts) {
                    message.content = Some(OpenAiContent::Parts(converted));
                    outcome.converted += 1;
                }
            } else {
                message.content = Some(OpenAiContent::Text(strip_image_blocks(parts)));
                outcome.stripped += 1;
            }
        }

        if outcome != ImagePolicyOutcome::default() {
            tracing::debug!(
                model,
                supports_images,
                converted = outcome.converted,
                stripped = outcome.stripped,
                "processed tool results with image content"
            );
        }

        outcome
    }

    /// Convert MCP image blocks to `image_url` data URIs
    ///
    /// Oversized images become a text placeholder. Returns `None` when
    /// nothing would remain.
    pub fn convert_mcp_image_blocks(&self, parts: &[OpenAiContentPart]) -> Option<Vec<OpenAiContentPart>> {
        let converted: Vec<_> = parts
            .iter()
            .map(|part| match part {
                OpenAiContentPart::Image { data, .. } if self.is_image_too_large(data) => {
                    tracing::debug!(decoded_bytes = decoded_len(data), "omitting oversized image");
                    OpenAiContentPart::Text {
                        text: IMAGE_TOO_LARGE_PLACEHOLDER.to_owned(),
                    }
                }
                OpenAiContentPart::Image { data, mime_type } => OpenAiContentPart::ImageUrl {
                    image_url: OpenAiImageUrl {
                        url: crate::convert::data_uri(mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE), data),
                        detail: None,
                    },
                },
                other => other.clone(),
            })
            .collect();

        (!converted.is_empty()).then_some(converted)
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Decoded size of base64 text, ignoring padding
fn decoded_len(data: &str) -> usize {
    let significant = data
        .trim_end_matches('=')
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .count();
    significant * 3 / 4
}

pub const fn is_mcp_image_block(part: &OpenAiContentPart) -> bool {
    matches!(part, OpenAiContentPart::Image { .. })
}

pub fn has_image_content(parts: &[OpenAiContentPart]) -> bool {
    parts.iter().any(is_mcp_image_block)
}

/// Replace image blocks with a count placeholder followed by the text blocks
pub fn strip_image_blocks(parts: &[OpenAiContentPart]) -> String {
    let image_count = parts.iter().filter(|part| is_mcp_image_block(part)).count();

    let mut lines = Vec::with_capacity(parts.len() + 1);
    if image_count > 0 {
        lines.push(format!(
            "[{image_count} image(s) removed - model does not support image inputs]"
        ));
    }
    lines.extend(parts.iter().filter_map(|part| match part {
        OpenAiContentPart::Text { text } => Some(text.clone()),
        _ => None,
    }));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(data: &str) -> OpenAiContentPart {
        OpenAiContentPart::Image {
            data: data.to_owned(),
            mime_type: None,
        }
    }

    fn text(text: &str) -> OpenAiContentPart {
        OpenAiContentPart::Text { text: text.to_owned() }
    }

    fn tool_message(parts: Vec<OpenAiContentPart>) -> OpenAiMessage {
        OpenAiMessage {
            role: "tool".to_owned(),
            content: Some(OpenAiContent::Parts(parts)),
            name: None,
            tool_calls: None,
            tool_call_id: Some("call_1".to_owned()),
        }
    }

    #[test]
    fn vision_support_is_case_insensitive() {
        let policy = ContentPolicy::default();

        assert!(policy.supports_images("GPT-4o-mini"));
        assert!(policy.supports_images("claude-sonnet-4-5"));
        assert!(policy.supports_images("o3"));
        assert!(!policy.supports_images("deepseek-chat"));
        assert!(!policy.supports_images("o3x"));
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let config = ContentPolicyConfig {
            max_image_bytes: 10,
            vision_models: Some(vec!["^deepseek-vl".to_owned()]),
        };
        let policy = ContentPolicy::from_config(&config).unwrap();

        assert!(policy.supports_images("deepseek-vl2"));
        assert!(!policy.supports_images("gpt-4o"));
        assert!(policy.is_image_too_large(&"A".repeat(16)));
        assert!(!policy.is_image_too_large("AAAAAAAAAAA="));
    }

    #[test]
    fn single_stripped_image_yields_placeholder_first() {
        let stripped = strip_image_blocks(&[text("page loaded"), image("aGk=")]);
        assert_eq!(
            stripped,
            "[1 image(s) removed - model does not support image inputs]\npage loaded"
        );
    }

    #[test]
    fn converts_images_for_vision_models() {
        let mut messages = vec![tool_message(vec![
            text("before"),
            OpenAiContentPart::Image {
                data: "aGk=".to_owned(),
                mime_type: Some("image/jpeg".to_owned()),
            },
            image("aGk="),
        ])];

        let outcome = ContentPolicy::default().apply("gpt-4o", &mut messages);

        assert_eq!(outcome.converted, 1);
        let Some(OpenAiContent::Parts(parts)) = &messages[0].content else {
            panic!("expected parts");
        };
        assert_eq!(parts[0], text("before"));
        let urls: Vec<_> = parts[1..]
            .iter()
            .map(|part| match part {
                OpenAiContentPart::ImageUrl { image_url } => image_url.url.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(urls, ["data:image/jpeg;base64,aGk=", "data:image/png;base64,aGk="]);
    }

    #[test]
    fn unknown_parts_pass_through_conversion() {
        let resource = OpenAiContentPart::Other(serde_json::json!({
            "type": "resource",
            "resource": {"uri": "file:///a.txt", "text": "a"}
        }));
        let mut messages = vec![tool_message(vec![text("ok"), resource.clone(), image("aGk=")])];

        let outcome = ContentPolicy::default().apply("gpt-4o", &mut messages);

        assert_eq!(outcome.converted, 1);
        let Some(OpenAiContent::Parts(parts)) = &messages[0].content else {
            panic!("expected parts");
        };
        assert_eq!(parts[1], resource);
        assert_eq!(strip_image_blocks(&[text("ok"), resource]), "ok");
    }

    #[test]
    fn oversized_images_become_placeholders() {
        let policy = ContentPolicy::from_config(&ContentPolicyConfig {
            max_image_bytes: 3,
            vision_models: None,
        })
        .unwrap();

        let converted = policy
            .convert_mcp_image_blocks(&[image("AAAAAAAA"), image("AAAA")])
            .unwrap();

        assert_eq!(converted[0], text(IMAGE_TOO_LARGE_PLACEHOLDER));
        assert!(matches!(converted[1], OpenAiContentPart::ImageUrl { .. }));
    }

    #[test]
    fn strips_for_text_only_models() {
        let mut messages = vec![
            tool_message(vec![image("aGk="), image("aGk="), text("two shots")]),
            tool_message(vec![text("no images here")]),
        ];

        let outcome = ContentPolicy::default().apply("deepseek-chat", &mut messages);

        assert_eq!(outcome, ImagePolicyOutcome { converted: 0, stripped: 1 });
        assert_eq!(
            messages[0].content,
            Some(OpenAiContent::Text(
                "[2 image(s) removed - model does not support image inputs]\ntwo shots".to_owned()
            ))
        );
        assert_eq!(messages[1].content, Some(OpenAiContent::Parts(vec![text("no images here")])));
    }
}
