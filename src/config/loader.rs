use crate::config::config::AppConfig;
use crate::config::turn::ModelCatalog;
use crate::error::AppError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序：
    /// 1. 内置开发配置
    /// 2. ./memagent.toml（或 MEMAGENT_CONFIG 指定的路径）
    /// 3. MEMAGENT_ 前缀的环境变量（`__` 分隔层级）
    /// 4. 常见的服务商环境变量（仅填充空字段）
    pub fn load() -> Result<AppConfig, AppError> {
        let path = std::env::var("MEMAGENT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path());
        Self::load_from(&path)
    }

    /// 从指定路径加载配置
    pub fn load_from(path: &Path) -> Result<AppConfig, AppError> {
        let mut config: AppConfig = Self::figment(path).extract()?;
        apply_env_fallbacks(&mut config, |key| std::env::var(key).ok());
        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::development()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("MEMAGENT_").split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.store.dimension == 0 {
            return Err(ConfigValidationError::InvalidDimension);
        }

        if config.store.backend == "pinecone" && config.store.index_host.is_empty() {
            return Err(ConfigValidationError::MissingSetting("store.index_host"));
        }

        if config.agent.history_token_budget == 0 {
            return Err(ConfigValidationError::InvalidTokenBudget);
        }

        if config.agent.max_tool_cycles == 0 {
            return Err(ConfigValidationError::InvalidCycleBound);
        }

        if ModelCatalog::builtin()
            .resolve(&config.llm.default_model)
            .is_none()
        {
            return Err(ConfigValidationError::UnknownModel(
                config.llm.default_model.clone(),
            ));
        }

        Ok(())
    }
}

/// 用常见的服务商环境变量填充尚未配置的字段
pub fn apply_env_fallbacks<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let fill = |field: &mut String, key: &str| {
        if field.is_empty() {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }
    };

    fill(&mut config.llm.openai_api_key, "OPENAI_API_KEY");
    fill(&mut config.llm.anthropic_api_key, "ANTHROPIC_API_KEY");
    fill(&mut config.llm.mistral_api_key, "MISTRAL_API_KEY");
    fill(&mut config.llm.fireworks_api_key, "FIREWORKS_API_KEY");
    fill(&mut config.embedding.api_key, "FIREWORKS_API_KEY");
    fill(&mut config.store.api_key, "PINECONE_API_KEY");
    fill(&mut config.store.index_host, "PINECONE_INDEX_HOST");
    fill(&mut config.search.api_key, "TAVILY_API_KEY");
    fill(&mut config.agent.user_id, "JG_USER_ID");

    if let Some(namespace) = lookup("PINECONE_NAMESPACE") {
        config.store.namespace = namespace;
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("向量维度无效，必须大于 0")]
    InvalidDimension,

    #[error("历史 token 预算无效，必须大于 0")]
    InvalidTokenBudget,

    #[error("工具循环上限无效，必须大于 0")]
    InvalidCycleBound,

    #[error("未知的模型标识: {0}")]
    UnknownModel(String),

    #[error("缺少必需配置项: {0}")]
    MissingSetting(&'static str),
}

impl From<ConfigValidationError> for AppError {
    fn from(e: ConfigValidationError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("memagent.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_development_config_is_valid() {
        assert!(ConfigLoader::validate(&AppConfig::development()).is_ok());
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[agent]\nuser_id = \"alice\"\nmax_tool_cycles = 3\n\n[llm]\ndefault_model = \"an-35-s\""
        )
        .unwrap();

        let config = ConfigLoader::load_from(file.path()).unwrap();
        assert_eq!(config.agent.user_id, "alice");
        assert_eq!(config.agent.max_tool_cycles, 3);
        assert_eq!(config.llm.default_model, "an-35-s");
        // 未覆盖的字段保留默认值
        assert_eq!(config.agent.history_token_budget, 2048);
        assert_eq!(config.store.dimension, 768);
    }

    #[test]
    fn test_unknown_default_model_rejected() {
        let mut config = AppConfig::development();
        config.llm.default_model = "gpt-unknown".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_pinecone_requires_host() {
        let mut config = AppConfig::development();
        config.store.backend = "pinecone".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::MissingSetting("store.index_host"))
        ));
    }

    #[test]
    fn test_env_fallbacks_fill_only_empty_fields() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-env"),
            ("JG_USER_ID", "jg"),
            ("TAVILY_API_KEY", "tv-env"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::development();
        config.search.api_key = "tv-file".into();
        apply_env_fallbacks(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.openai_api_key, "sk-env");
        assert_eq!(config.agent.user_id, "jg");
        assert_eq!(config.search.api_key, "tv-file");
    }
}
