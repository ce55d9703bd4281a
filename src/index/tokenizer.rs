//! 分词与 token 预算截断

use std::path::Path;

use crate::config::config::TokenizerConfig;
use crate::error::{AppError, Result};

/// 分词器：返回每个 token 在原文中的起始字节偏移
pub trait Tokenizer: Send + Sync {
    fn token_offsets(&self, text: &str) -> Result<Vec<usize>>;

    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.token_offsets(text)?.len())
    }
}

/// 保留文本末尾不超过 `budget` 个 token 的部分
///
/// 返回值总是原文的一个后缀。
pub fn truncate_to_token_budget<'a>(
    tokenizer: &dyn Tokenizer,
    text: &'a str,
    budget: usize,
) -> Result<&'a str> {
    let offsets = tokenizer.token_offsets(text)?;
    if offsets.len() <= budget {
        return Ok(text);
    }
    if budget == 0 {
        return Ok("");
    }

    let start = offsets[offsets.len() - budget];
    text.get(start..).ok_or_else(|| {
        AppError::Internal(format!("Token offset {} is not a char boundary", start))
    })
}

/// 按空白切分的分词器
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn token_offsets(&self, text: &str) -> Result<Vec<usize>> {
        let mut offsets = Vec::new();
        let mut in_token = false;

        for (i, c) in text.char_indices() {
            if c.is_whitespace() {
                in_token = false;
            } else if !in_token {
                offsets.push(i);
                in_token = true;
            }
        }

        Ok(offsets)
    }
}

/// HuggingFace `tokenizers` 分词器
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn token_offsets(&self, text: &str) -> Result<Vec<usize>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| AppError::Internal(format!("Tokenization failed: {}", e)))?;

        Ok(encoding
            .get_offsets()
            .iter()
            .map(|(start, _)| *start)
            .filter(|start| text.is_char_boundary(*start))
            .collect())
    }
}

pub fn create_tokenizer(config: &TokenizerConfig) -> Result<Box<dyn Tokenizer>> {
    match config.backend.as_str() {
        "huggingface" => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Config("Missing required setting: tokenizer.path".into())
            })?;
            Ok(Box::new(HfTokenizer::from_file(path)?))
        }
        "whitespace" | "" => Ok(Box::new(WhitespaceTokenizer)),
        other => Err(AppError::Config(format!(
            "Unknown tokenizer backend: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_whitespace_offsets() {
        let offsets = WhitespaceTokenizer.token_offsets("  Human: hi\nAI: hello ").unwrap();
        assert_eq!(offsets, vec![2, 9, 12, 16]);
    }

    #[rstest]
    #[case("a b c d e", 10, "a b c d e")]
    #[case("a b c d e", 5, "a b c d e")]
    #[case("a b c d e", 2, "d e")]
    #[case("a b c d e", 0, "")]
    #[case("", 3, "")]
    fn test_truncate_keeps_suffix(#[case] text: &str, #[case] budget: usize, #[case] expected: &str) {
        assert_eq!(
            truncate_to_token_budget(&WhitespaceTokenizer, text, budget).unwrap(),
            expected
        );
    }

    #[test]
    fn test_truncate_multibyte_text() {
        let text = "记忆 很 重要 ünïcode";
        let truncated = truncate_to_token_budget(&WhitespaceTokenizer, text, 2).unwrap();
        assert_eq!(truncated, "重要 ünïcode");
    }

    #[test]
    fn test_huggingface_requires_path() {
        let config = TokenizerConfig {
            backend: "huggingface".into(),
            path: None,
        };
        assert!(matches!(create_tokenizer(&config), Err(AppError::Config(_))));
    }
}
