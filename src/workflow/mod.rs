//! 流程层
//!
//! 单个条目的处理：处理器注册表、各类型处理器和测验作答状态机。

pub mod exam_engine;
pub mod lane_ctx;
pub mod processor;
pub mod processors;

pub use exam_engine::{ExamEngine, ExamOutcome};
pub use lane_ctx::LaneContext;
pub use processor::{
    Gate, ProcessResult, Processor, ProcessorCtor, ProcessorDeps, ProcessorRegistry,
};
