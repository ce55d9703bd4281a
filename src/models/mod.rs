//! 核心数据模型模块
//!
//! 对话消息、两类记忆的记录格式、单轮对话状态，以及两个记忆仓储。

pub mod conversational_memory_repository;
pub mod core_memory_repository;
pub mod memory;
pub mod message;
pub mod state;

pub use conversational_memory_repository::{
    ConversationalMemoryRepository, ConversationalMemoryRepositoryImpl,
};
pub use core_memory_repository::{CoreMemoryRepository, CoreMemoryRepositoryImpl};
pub use memory::{CoreMemoryRecord, ConversationalMemoryEntry, MemoryType};
pub use message::{Message, Role, ToolCallRequest, ToolResult, buffer_string};
pub use state::ConversationState;
