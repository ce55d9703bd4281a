//! 每轮运行配置
//!
//! 模型、温度、用户 ID 和线程 ID 在每轮开始时解析一次，
//! 之后作为显式参数向下传递，不读取任何全局状态。

use serde::{Deserialize, Serialize};

use crate::config::config::AppConfig;
use crate::error::{AppError, Result};

/// 模型服务商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Mistral,
    Fireworks,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::Mistral => write!(f, "mistral"),
            Provider::Fireworks => write!(f, "fireworks"),
        }
    }
}

/// 已解析的模型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// 短别名，例如 "oai-gpt4m"
    pub alias: String,
    /// 服务商
    pub provider: Provider,
    /// 服务商侧的模型 ID
    pub model_id: String,
}

/// 模型目录
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    entries: Vec<ModelSpec>,
}

impl ModelCatalog {
    /// 内置模型目录
    pub fn builtin() -> Self {
        let entries = [
            ("oai-gpt4", Provider::OpenAi, "gpt-4o-2024-08-06"),
            ("oai-gpt4m", Provider::OpenAi, "gpt-4o-mini"),
            ("an-35-s", Provider::Anthropic, "claude-3-5-sonnet-20240620"),
            ("mis-nemo", Provider::Mistral, "open-mistral-nemo"),
            ("mis-lg", Provider::Mistral, "mistral-large-latest"),
            (
                "fw-lm31-405b",
                Provider::Fireworks,
                "accounts/fireworks/models/llama-v3p1-405b-instruct",
            ),
            (
                "fw-lm31-150b",
                Provider::Fireworks,
                "accounts/fireworks/models/llama-v3p1-150b-instruct",
            ),
            (
                "fw-lm31-8b",
                Provider::Fireworks,
                "accounts/fireworks/models/llama-v3p1-8b-instruct",
            ),
        ]
        .into_iter()
        .map(|(alias, provider, model_id)| ModelSpec {
            alias: alias.to_string(),
            provider,
            model_id: model_id.to_string(),
        })
        .collect();

        Self { entries }
    }

    /// 按别名或模型 ID 查找
    pub fn resolve(&self, name: &str) -> Option<&ModelSpec> {
        self.entries
            .iter()
            .find(|m| m.alias == name)
            .or_else(|| self.entries.iter().find(|m| m.model_id == name))
    }
}

/// 调用方提供的覆盖项，未设置的字段使用默认值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub user_id: Option<String>,
    pub thread_id: Option<String>,
}

impl TurnOverrides {
    /// 解析交互输入的温度，空输入表示使用默认值
    pub fn parse_temperature(input: &str) -> Result<Option<f32>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let value: f32 = input
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid temperature: {}", input)))?;
        if !(0.0..=2.0).contains(&value) {
            return Err(AppError::Validation(format!(
                "Temperature out of range [0, 2]: {}",
                value
            )));
        }
        Ok(Some(value))
    }
}

/// 单轮对话的运行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnConfig {
    pub model: ModelSpec,
    pub temperature: f32,
    pub user_id: String,
    pub thread_id: String,
}

impl TurnConfig {
    /// 合并默认配置与覆盖项
    ///
    /// 任意一项无效都会整体失败，不会产生部分生效的配置。
    pub fn resolve(
        defaults: &AppConfig,
        catalog: &ModelCatalog,
        overrides: TurnOverrides,
    ) -> Result<Self> {
        let model_name = overrides
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| defaults.llm.default_model.clone());
        let model = catalog
            .resolve(&model_name)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("Unknown model identifier: {}", model_name)))?;

        let temperature = overrides.temperature.unwrap_or(defaults.llm.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(AppError::Config(format!(
                "Temperature out of range [0, 2]: {}",
                temperature
            )));
        }

        let user_id = overrides
            .user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| defaults.agent.user_id.clone());
        if user_id.trim().is_empty() {
            return Err(AppError::Config("Missing required setting: user_id".into()));
        }

        let thread_id = overrides
            .thread_id
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "default".to_string());

        Ok(Self {
            model,
            temperature,
            user_id,
            thread_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn defaults() -> AppConfig {
        let mut config = AppConfig::development();
        config.agent.user_id = "user-1".into();
        config
    }

    #[rstest]
    #[case("oai-gpt4", Provider::OpenAi, "gpt-4o-2024-08-06")]
    #[case("gpt-4o-mini", Provider::OpenAi, "gpt-4o-mini")]
    #[case("an-35-s", Provider::Anthropic, "claude-3-5-sonnet-20240620")]
    #[case("mis-lg", Provider::Mistral, "mistral-large-latest")]
    #[case(
        "fw-lm31-8b",
        Provider::Fireworks,
        "accounts/fireworks/models/llama-v3p1-8b-instruct"
    )]
    fn test_catalog_resolves_alias_and_id(
        #[case] name: &str,
        #[case] provider: Provider,
        #[case] model_id: &str,
    ) {
        let spec = ModelCatalog::builtin().resolve(name).cloned().unwrap();
        assert_eq!(spec.provider, provider);
        assert_eq!(spec.model_id, model_id);
    }

    #[rstest]
    #[case("", None)]
    #[case("  ", None)]
    #[case("0.7", Some(0.7))]
    #[case(" 1 ", Some(1.0))]
    fn test_parse_temperature(#[case] input: &str, #[case] expected: Option<f32>) {
        assert_eq!(TurnOverrides::parse_temperature(input).unwrap(), expected);
    }

    #[rstest]
    #[case("warm")]
    #[case("2.5")]
    #[case("-0.1")]
    #[case("NaN")]
    fn test_parse_temperature_rejects(#[case] input: &str) {
        assert!(matches!(
            TurnOverrides::parse_temperature(input),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_uses_defaults() {
        let config =
            TurnConfig::resolve(&defaults(), &ModelCatalog::builtin(), TurnOverrides::default())
                .unwrap();
        assert_eq!(config.model.model_id, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.user_id, "user-1");
        assert_eq!(config.thread_id, "default");
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let overrides = TurnOverrides {
            model: Some("mis-nemo".into()),
            temperature: Some(0.7),
            user_id: Some("bob".into()),
            thread_id: Some("t-9".into()),
        };
        let config = TurnConfig::resolve(&defaults(), &ModelCatalog::builtin(), overrides).unwrap();
        assert_eq!(config.model.provider, Provider::Mistral);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.user_id, "bob");
        assert_eq!(config.thread_id, "t-9");
    }

    #[test]
    fn test_unknown_model_is_configuration_error() {
        let overrides = TurnOverrides {
            model: Some("gpt-5-ultra".into()),
            ..Default::default()
        };
        let err = TurnConfig::resolve(&defaults(), &ModelCatalog::builtin(), overrides).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_user_id_is_configuration_error() {
        let err = TurnConfig::resolve(
            &AppConfig::development(),
            &ModelCatalog::builtin(),
            TurnOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_out_of_range_temperature_rejected() {
        let overrides = TurnOverrides {
            temperature: Some(3.5),
            ..Default::default()
        };
        assert!(TurnConfig::resolve(&defaults(), &ModelCatalog::builtin(), overrides).is_err());
    }
}
