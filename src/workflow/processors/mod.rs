//! 内置处理器
//!
//! - `read`: 视频、资料、链接，只需上报学习进度
//! - `forum`: 论坛，让 AI 写一段回帖
//! - `exam`: 测验和课堂练习，交给 [`ExamEngine`](crate::workflow::ExamEngine)

pub mod exam;
pub mod forum;
pub mod read;

pub use exam::ExamProcessor;
pub use forum::ForumProcessor;
pub use read::ReadProcessor;
