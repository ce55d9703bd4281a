use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 向量存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// 存储后端: "memory" 或 "pinecone"
    pub backend: String,
    /// Pinecone 索引地址（data plane host）
    pub index_host: String,
    /// Pinecone API 密钥
    pub api_key: String,
    /// 命名空间
    pub namespace: String,
    /// 向量维度
    pub dimension: usize,
    /// 请求超时（秒）
    pub timeout: u64,
}

/// 嵌入模型配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding 后端类型: "hashing"、"fireworks" 或 "ollama"
    pub backend: String,
    /// 模型名称
    pub model_name: String,
    /// Fireworks 兼容接口地址
    pub base_url: String,
    /// API 密钥
    pub api_key: String,
    /// Ollama 服务器地址
    pub ollama_url: String,
    /// 请求超时（秒）
    pub timeout: u64,
}

/// 分词器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TokenizerConfig {
    /// 分词器后端: "whitespace" 或 "huggingface"
    pub backend: String,
    /// tokenizer.json 路径
    pub path: Option<PathBuf>,
}

/// 语言模型配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    /// 默认模型（别名或模型 ID）
    pub default_model: String,
    /// 默认温度
    pub temperature: f32,
    /// 请求超时（秒）
    pub timeout: u64,
    /// OpenAI
    pub openai_api_key: String,
    pub openai_base_url: String,
    /// Anthropic（OpenAI 兼容接口）
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    /// Mistral
    pub mistral_api_key: String,
    pub mistral_base_url: String,
    /// Fireworks
    pub fireworks_api_key: String,
    pub fireworks_base_url: String,
}

/// 网络搜索配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// Tavily API 密钥
    pub api_key: String,
    /// Tavily 接口地址
    pub base_url: String,
    /// 返回结果数上限
    pub max_results: usize,
    /// 请求超时（秒）
    pub timeout: u64,
}

/// 智能体行为配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// 默认用户 ID
    pub user_id: String,
    /// 记忆检索时对话历史的 token 预算
    pub history_token_budget: usize,
    /// 对话记忆检索条数
    pub search_top_k: usize,
    /// 单轮最多的工具调用循环次数
    pub max_tool_cycles: usize,
    /// 单轮超时（秒）
    pub turn_timeout_secs: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件目录
    pub log_dir: Option<PathBuf>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 向量存储配置
    pub store: StoreConfig,
    /// 嵌入模型配置
    pub embedding: EmbeddingConfig,
    /// 分词器配置
    pub tokenizer: TokenizerConfig,
    /// 语言模型配置
    pub llm: LlmConfig,
    /// 网络搜索配置
    pub search: SearchConfig,
    /// 智能体配置
    pub agent: AgentConfig,
    /// 服务器配置
    pub server: ServerConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            store: StoreConfig {
                backend: "memory".into(),
                index_host: String::new(),
                api_key: String::new(),
                namespace: "memagent".into(),
                dimension: 768,
                timeout: 30,
            },
            embedding: EmbeddingConfig {
                backend: "hashing".into(),
                model_name: "nomic-ai/nomic-embed-text-v1.5".into(),
                base_url: "https://api.fireworks.ai/inference/v1".into(),
                api_key: String::new(),
                ollama_url: "http://localhost:11434".into(),
                timeout: 60,
            },
            tokenizer: TokenizerConfig {
                backend: "whitespace".into(),
                path: None,
            },
            llm: LlmConfig {
                default_model: "gpt-4o-mini".into(),
                temperature: 0.2,
                timeout: 120,
                openai_api_key: String::new(),
                openai_base_url: "https://api.openai.com/v1".into(),
                anthropic_api_key: String::new(),
                anthropic_base_url: "https://api.anthropic.com/v1".into(),
                mistral_api_key: String::new(),
                mistral_base_url: "https://api.mistral.ai/v1".into(),
                fireworks_api_key: String::new(),
                fireworks_base_url: "https://api.fireworks.ai/inference/v1".into(),
            },
            search: SearchConfig {
                api_key: String::new(),
                base_url: "https://api.tavily.com".into(),
                max_results: 3,
                timeout: 30,
            },
            agent: AgentConfig {
                user_id: String::new(),
                history_token_budget: 2048,
                search_top_k: 5,
                max_tool_cycles: 8,
                turn_timeout_secs: 120,
            },
            server: ServerConfig {
                host: "localhost".into(),
                port: 8000,
            },
            logging: LoggingConfig {
                level: "info".into(),
                structured: false,
                log_dir: None,
            },
        }
    }
}
