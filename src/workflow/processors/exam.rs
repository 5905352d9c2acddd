use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{CourseActivity, ExamKind};
use crate::workflow::exam_engine::{ExamEngine, ExamOutcome};
use crate::workflow::lane_ctx::LaneContext;
use crate::workflow::processor::{Gate, ProcessResult, Processor, ProcessorDeps};

pub fn exam(deps: &ProcessorDeps) -> Box<dyn Processor> {
    Box::new(ExamProcessor::new(ExamKind::Exam, deps.clone()))
}

pub fn classroom(deps: &ProcessorDeps) -> Box<dyn Processor> {
    Box::new(ExamProcessor::new(ExamKind::Classroom, deps.clone()))
}

/// 测验 / 课堂练习处理器
///
/// 引擎在预检时创建，`exec` 沿用同一个引擎，预检拉到的试卷不会重复请求。
pub struct ExamProcessor {
    kind: ExamKind,
    deps: ProcessorDeps,
    engine: Option<ExamEngine>,
}

impl ExamProcessor {
    pub fn new(kind: ExamKind, deps: ProcessorDeps) -> Self {
        Self {
            kind,
            deps,
            engine: None,
        }
    }

    fn engine(&mut self, lane: &LaneContext, activity: &CourseActivity) -> &mut ExamEngine {
        let kind = self.kind;
        let deps = &self.deps;
        self.engine.get_or_insert_with(|| {
            ExamEngine::new(
                kind,
                activity.activity_id,
                format!("{}[{}]", lane, activity.activity_name),
                deps.exam.clone(),
                deps.ai.clone(),
            )
        })
    }
}

#[async_trait]
impl Processor for ExamProcessor {
    async fn condition(
        &mut self,
        lane: &LaneContext,
        activity: &CourseActivity,
    ) -> AppResult<Gate> {
        let engine = self.engine(lane, activity);
        Ok(match engine.preflight(lane.api.as_ref()).await? {
            Some(reason) => Gate::Skip(reason),
            None => Gate::Proceed,
        })
    }

    async fn exec(
        &mut self,
        lane: &LaneContext,
        activity: &CourseActivity,
    ) -> AppResult<ProcessResult> {
        let engine = self.engine(lane, activity);
        Ok(match engine.run(lane.api.as_ref()).await? {
            ExamOutcome::Passed {
                best_score,
                threshold,
                attempts,
            } => ProcessResult::Success(format!(
                "最高分 {:.1}（及格线 {:.1}），本次提交 {} 次",
                best_score, threshold, attempts
            )),
            ExamOutcome::Exhausted {
                best_score,
                threshold,
                attempts,
            } => ProcessResult::Skipped(format!(
                "提交 {} 次仍未及格，最高分 {:.1}（及格线 {:.1}）",
                attempts, best_score, threshold
            )),
        })
    }
}
