//! API 模块
//!
//! 与外部系统交互的接口定义。编排层和流程层只依赖这里的 trait，
//! 具体实现位于 `clients/`（浏览器页面内发请求、OpenAI 兼容接口），
//! 测试中使用手写的 mock。

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppResult;
use crate::models::{
    AnsweredSubject, CourseActivity, CourseGroup, Distribution, ExamKind, SubmissionDetail,
    SubmissionList,
};

/// 课程目录：列出课程和未完成的活动
#[async_trait]
pub trait CourseDirectory: Send + Sync {
    async fn list_courses(&self) -> AppResult<Vec<CourseGroup>>;

    /// 未完成的活动，已按单元和活动顺序排好
    async fn unfinished_activities(&self, course_id: u64) -> AppResult<Vec<CourseActivity>>;
}

/// 测验相关接口
#[async_trait]
pub trait ExamApi: Send + Sync {
    async fn get_submissions(&self, kind: ExamKind, exam_id: u64) -> AppResult<SubmissionList>;

    async fn get_distribute(&self, kind: ExamKind, exam_id: u64) -> AppResult<Distribution>;

    /// 申请一次新的作答，返回 submission id
    async fn open_attempt(
        &self,
        kind: ExamKind,
        exam_id: u64,
        paper_instance_id: u64,
        subject_ids: &[u64],
    ) -> AppResult<Option<u64>>;

    /// 提交答案；429 返回 `ApiError::RateLimited`，400 返回 `ApiError::BadRequest`
    async fn post_submission(
        &self,
        kind: ExamKind,
        exam_id: u64,
        paper_instance_id: u64,
        submission_id: u64,
        answers: &[AnsweredSubject],
    ) -> AppResult<()>;

    async fn get_submission_detail(
        &self,
        kind: ExamKind,
        exam_id: u64,
        submission_id: u64,
    ) -> AppResult<SubmissionDetail>;
}

/// 上报学习进度
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadProgress {
    Video { start: u64, end: u64 },
    Plain {},
}

/// 非测验类活动的接口
#[async_trait]
pub trait ActivityApi: Send + Sync {
    async fn mark_read(&self, activity_id: u64, progress: ReadProgress) -> AppResult<()>;

    async fn post_forum_reply(&self, activity_id: u64, title: &str, content: &str)
        -> AppResult<()>;
}

/// 通道持有的全部平台能力
#[async_trait]
pub trait LmsApi: ExamApi + ActivityApi {
    /// 重新加载通道上下文（页面刷新、重新导航等）
    async fn reload(&self) -> AppResult<()>;

    /// 释放通道占用的资源，默认什么都不做
    async fn close(&self) -> AppResult<()> {
        Ok(())
    }
}

/// AI 推理接口
#[async_trait]
pub trait AiClient: Send + Sync {
    /// # 参数
    /// - `system`: 系统指令
    /// - `prompt`: 题目和选项
    /// - `format`: 对输出格式的要求
    async fn complete(&self, system: &str, prompt: &str, format: &str) -> AppResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_progress_body() {
        let video = serde_json::to_string(&ReadProgress::Video { start: 0, end: 300 }).unwrap();
        assert_eq!(video, r#"{"start":0,"end":300}"#);
        let plain = serde_json::to_string(&ReadProgress::Plain {}).unwrap();
        assert_eq!(plain, "{}");
    }
}
