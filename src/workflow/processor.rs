//! 处理器注册表 - 流程层
//!
//! 活动类型 → 处理器构造函数的静态表，启动时构建一次。
//! 每个条目都要新建一个处理器实例：测验处理器持有逐题的学习状态，
//! 不能跨条目或跨通道复用。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use phf::phf_map;

use crate::config::ExamSettings;
use crate::error::AppResult;
use crate::models::{ActivityType, CourseActivity};
use crate::services::AiDispatcher;
use crate::workflow::lane_ctx::LaneContext;
use crate::workflow::processors;

/// 预检结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Skip(String),
}

/// 条目处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// 处理成功
    Success(String),
    /// 跳过（未及格、已完成等）
    Skipped(String),
}

/// 一种活动类型的处理能力
#[async_trait]
pub trait Processor: Send {
    /// 预检，默认总是继续
    async fn condition(
        &mut self,
        _lane: &LaneContext,
        _activity: &CourseActivity,
    ) -> AppResult<Gate> {
        Ok(Gate::Proceed)
    }

    async fn exec(
        &mut self,
        lane: &LaneContext,
        activity: &CourseActivity,
    ) -> AppResult<ProcessResult>;
}

/// 构造处理器所需的共享依赖，由组合根创建
#[derive(Clone)]
pub struct ProcessorDeps {
    pub ai: Arc<AiDispatcher>,
    pub exam: ExamSettings,
}

pub type ProcessorCtor = fn(&ProcessorDeps) -> Box<dyn Processor>;

type Factory = Arc<dyn Fn(&ProcessorDeps) -> Box<dyn Processor> + Send + Sync>;

static STANDARD_PROCESSORS: phf::Map<&'static str, ProcessorCtor> = phf_map! {
    "online_video" => processors::read::video as ProcessorCtor,
    "material" => processors::read::material as ProcessorCtor,
    "web_link" => processors::read::web_link as ProcessorCtor,
    "forum" => processors::forum::build as ProcessorCtor,
    "exam" => processors::exam::exam as ProcessorCtor,
    "classroom" => processors::exam::classroom as ProcessorCtor,
};

/// 处理器注册表
#[derive(Clone)]
pub struct ProcessorRegistry {
    table: HashMap<ActivityType, Factory>,
    deps: ProcessorDeps,
}

impl ProcessorRegistry {
    /// 标准注册表：包含所有内置处理器
    pub fn standard(deps: ProcessorDeps) -> Self {
        let mut registry = Self::empty(deps);
        for ty in ActivityType::KNOWN {
            if let Some(ctor) = STANDARD_PROCESSORS.get(ty.tag()) {
                registry.table.insert(ty, Arc::new(*ctor));
            }
        }
        registry
    }

    /// 空注册表
    pub fn empty(deps: ProcessorDeps) -> Self {
        Self {
            table: HashMap::new(),
            deps,
        }
    }

    /// 注册（或替换）某个类型的处理器
    pub fn register(
        mut self,
        ty: ActivityType,
        factory: impl Fn(&ProcessorDeps) -> Box<dyn Processor> + Send + Sync + 'static,
    ) -> Self {
        self.table.insert(ty, Arc::new(factory));
        self
    }

    pub fn supports(&self, ty: ActivityType) -> bool {
        self.table.contains_key(&ty)
    }

    /// 为一个条目新建处理器
    pub fn create(&self, ty: ActivityType) -> Option<Box<dyn Processor>> {
        self.table.get(&ty).map(|factory| factory(&self.deps))
    }
}
