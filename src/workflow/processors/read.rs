use async_trait::async_trait;
use tracing::debug;

use crate::api::ReadProgress;
use crate::error::AppResult;
use crate::models::{ActivityType, CourseActivity, Progress};
use crate::workflow::lane_ctx::LaneContext;
use crate::workflow::processor::{Gate, ProcessResult, Processor, ProcessorDeps};

pub fn video(_deps: &ProcessorDeps) -> Box<dyn Processor> {
    Box::new(ReadProcessor::new(ActivityType::OnlineVideo))
}

pub fn material(_deps: &ProcessorDeps) -> Box<dyn Processor> {
    Box::new(ReadProcessor::new(ActivityType::Material))
}

pub fn web_link(_deps: &ProcessorDeps) -> Box<dyn Processor> {
    Box::new(ReadProcessor::new(ActivityType::WebLink))
}

/// 只需要上报学习进度的活动
pub struct ReadProcessor {
    activity_type: ActivityType,
}

impl ReadProcessor {
    pub fn new(activity_type: ActivityType) -> Self {
        Self { activity_type }
    }

    fn progress_for(&self, activity: &CourseActivity) -> ReadProgress {
        match self.activity_type {
            ActivityType::OnlineVideo => ReadProgress::Video {
                start: 0,
                end: activity.duration.unwrap_or(0),
            },
            _ => ReadProgress::Plain {},
        }
    }
}

#[async_trait]
impl Processor for ReadProcessor {
    async fn condition(
        &mut self,
        _lane: &LaneContext,
        activity: &CourseActivity,
    ) -> AppResult<Gate> {
        if activity.progress == Progress::Full {
            return Ok(Gate::Skip("已完成".to_string()));
        }
        Ok(Gate::Proceed)
    }

    async fn exec(
        &mut self,
        lane: &LaneContext,
        activity: &CourseActivity,
    ) -> AppResult<ProcessResult> {
        let progress = self.progress_for(activity);
        debug!(
            "{} 上报{}进度: {} {:?}",
            lane,
            self.activity_type.name(),
            activity.activity_name,
            progress
        );
        lane.api.mark_read(activity.activity_id, progress).await?;
        Ok(ProcessResult::Success(format!(
            "{}已标记完成",
            self.activity_type.name()
        )))
    }
}
