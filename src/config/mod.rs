//! 配置管理模块
//!
//! 提供应用程序配置加载和管理功能，支持 TOML 配置文件和环境变量覆盖，
//! 以及每轮对话的运行配置解析。

pub mod config;
pub mod loader;
pub mod turn;

pub use config::AppConfig;
pub use loader::ConfigLoader;
pub use turn::{ModelCatalog, ModelSpec, Provider, TurnConfig, TurnOverrides};
