//! # Course Runner
//!
//! 在用户已登录的浏览器里自动完成课程：视频、资料、论坛、测验。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构，上层只依赖下层：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 每条通道一个 page owner，提供 eval() / fetch_json() 能力
//! - `browser/` - 连接浏览器、为通道开页面
//! - `clients/` - 平台 REST 接口和大模型接口的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单道题或单个请求
//! - `Resolver` - 单道题的答案推断与排除学习
//! - `AiDispatcher` - 全局限速的 AI 批量请求队列
//! - `EventBus` - 进度事件广播
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个条目"的完整处理流程
//! - `ProcessorRegistry` - 活动类型 → 处理器的静态表
//! - `ExamEngine` - 测验的重试状态机
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 选择课程，把条目分配到并发通道，汇总结果
//!
//! `api/` 定义各层之间的 trait，测试中用 mock 替换真实实现。

pub mod api;
pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{CourseRunner, GroupPolicy, RunReport};
pub use services::{AiDispatcher, EventBus, ProgressEvent};
pub use workflow::{ProcessorDeps, ProcessorRegistry};
