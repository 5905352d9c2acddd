//! 外部系统客户端
//!
//! - `lms_client`: 在浏览器页面内调用平台 REST 接口（沿用登录态）
//! - `llm_client`: OpenAI 兼容的大模型接口

pub mod llm_client;
pub mod lms_client;

pub use llm_client::LlmClient;
pub use lms_client::PageLmsClient;
