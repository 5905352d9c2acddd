//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 选择课程、把条目分配到并发通道、驱动处理器、汇总结果。
//! 不做具体业务判断，只做调度和统计。
//!
//! ## 层次关系
//!
//! ```text
//! course_runner (处理 Vec<CourseGroup>，每门课多条通道)
//!     ↓
//! workflow::ProcessorRegistry → Processor (处理单个 CourseActivity)
//!     ↓
//! workflow::ExamEngine (测验重试循环)
//!     ↓
//! services (能力层：resolver / ai_dispatcher / event_bus)
//!     ↓
//! clients → infrastructure (JsExecutor)
//! ```

pub mod course_runner;
pub mod group_select;

pub use course_runner::{CourseRunner, GroupReport, LaneFactory, RunReport};
pub use group_select::{select_groups, GroupPolicy};
