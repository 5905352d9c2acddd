use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::AppResult;
use crate::models::CourseActivity;
use crate::services::{AiDispatcher, AnswerFormat, BatchRequestItem};
use crate::utils::truncate_text;
use crate::workflow::lane_ctx::LaneContext;
use crate::workflow::processor::{ProcessResult, Processor, ProcessorDeps};

pub fn build(deps: &ProcessorDeps) -> Box<dyn Processor> {
    Box::new(ForumProcessor::new(deps.ai.clone()))
}

/// 论坛：让 AI 针对主题写一段简短回帖后发布
pub struct ForumProcessor {
    ai: Arc<AiDispatcher>,
}

impl ForumProcessor {
    pub fn new(ai: Arc<AiDispatcher>) -> Self {
        Self { ai }
    }

    fn request_for(activity: &CourseActivity) -> BatchRequestItem {
        BatchRequestItem {
            id: activity.activity_id,
            format: AnswerFormat::FreeText,
            prompt: format!(
                "【论坛发帖】请围绕以下主题写一段 100 字左右的学习心得：\n{}",
                activity.activity_name
            ),
            option_count: 0,
        }
    }
}

#[async_trait]
impl Processor for ForumProcessor {
    async fn exec(
        &mut self,
        lane: &LaneContext,
        activity: &CourseActivity,
    ) -> AppResult<ProcessResult> {
        let content = self.ai.request(&Self::request_for(activity)).await;
        info!("{} 💬 回帖: {}", lane, truncate_text(&content, 40));

        lane.api
            .post_forum_reply(activity.activity_id, &activity.activity_name, &content)
            .await?;
        Ok(ProcessResult::Success("已回帖".to_string()))
    }
}
