//! memagent - 带记忆的对话智能体
//!
//! 为语言模型提供两层持久记忆：每个用户一份可修改的核心记忆列表，
//! 以及可按语义检索的对话记忆库。每轮对话先加载相关记忆，再由模型
//! 决定是否调用工具读写记忆或搜索网页，直到给出最终回答。

pub mod api;
pub mod config;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
pub mod tools;
