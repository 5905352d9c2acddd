//! 学习平台客户端
//!
//! 所有请求都在浏览器页面里用 `fetch` 发出（`credentials: "include"`），
//! 直接复用用户已登录的会话。每条通道一个实例，各自持有一个页面。

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::api::{ActivityApi, CourseDirectory, ExamApi, LmsApi, ReadProgress};
use crate::error::{ApiError, AppError, AppResult, BrowserError};
use crate::infrastructure::{FetchResponse, JsExecutor};
use crate::models::{
    AnsweredSubject, CourseActivity, CourseGroup, Distribution, ExamKind, SubmissionDetail,
    SubmissionList,
};

/// 页面跳转后等待脚本环境就绪的时间
const SETTLE_DELAY: Duration = Duration::from_millis(800);

#[derive(Deserialize)]
struct CoursesPage {
    #[serde(default)]
    courses: Vec<CourseGroup>,
}

#[derive(Deserialize)]
struct ActivitiesPage {
    #[serde(default)]
    activities: Vec<CourseActivity>,
}

#[derive(Deserialize)]
struct StorageResponse {
    #[serde(default)]
    id: Option<u64>,
}

pub struct PageLmsClient {
    executor: JsExecutor,
    home_url: String,
}

impl PageLmsClient {
    /// # 参数
    /// - `executor`: 该客户端独占的页面
    /// - `home_url`: 重载时导航到的地址
    pub fn new(executor: JsExecutor, home_url: impl Into<String>) -> Self {
        Self {
            executor,
            home_url: home_url.into(),
        }
    }

    async fn request(&self, method: &str, endpoint: &str, body: Option<Value>) -> AppResult<Value> {
        debug!("{} {}", method, endpoint);
        let response = self
            .executor
            .fetch_json(method, endpoint, body.as_ref())
            .await?;
        check_status(endpoint, response)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> AppResult<T> {
        let body = self.request("GET", endpoint, None).await?;
        parse(endpoint, body)
    }

    fn exam_path(kind: ExamKind, exam_id: u64) -> String {
        format!("/api/{}/{}", kind.path_segment(), exam_id)
    }
}

/// 按状态码分类：429 限流、400 校验失败、0 网络错误
fn check_status(endpoint: &str, response: FetchResponse) -> AppResult<Value> {
    if response.is_success() {
        return Ok(response.body);
    }
    let endpoint = endpoint.to_string();
    let err = match response.status {
        0 => ApiError::RequestFailed {
            endpoint,
            message: body_text(&response.body),
        },
        400 => ApiError::BadRequest {
            endpoint,
            message: body_text(&response.body),
        },
        429 => ApiError::RateLimited { endpoint },
        status => ApiError::BadStatus { endpoint, status },
    };
    Err(err.into())
}

fn body_text(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse<T: DeserializeOwned>(endpoint: &str, body: Value) -> AppResult<T> {
    serde_json::from_value(body).map_err(|e| AppError::malformed(endpoint, e))
}

#[async_trait]
impl CourseDirectory for PageLmsClient {
    async fn list_courses(&self) -> AppResult<Vec<CourseGroup>> {
        let page: CoursesPage = self.get("/api/my-courses?page=1&page_size=100").await?;
        Ok(page.courses)
    }

    async fn unfinished_activities(&self, course_id: u64) -> AppResult<Vec<CourseActivity>> {
        let endpoint = format!("/api/courses/{}/unfinished-activities", course_id);
        let page: ActivitiesPage = self.get(&endpoint).await?;
        let mut activities = page.activities;
        activities.sort_by_key(|a| (a.module_id, a.sort));
        Ok(activities)
    }
}

#[async_trait]
impl ExamApi for PageLmsClient {
    async fn get_submissions(&self, kind: ExamKind, exam_id: u64) -> AppResult<SubmissionList> {
        self.get(&format!("{}/submissions", Self::exam_path(kind, exam_id)))
            .await
    }

    async fn get_distribute(&self, kind: ExamKind, exam_id: u64) -> AppResult<Distribution> {
        self.get(&format!("{}/distribute", Self::exam_path(kind, exam_id)))
            .await
    }

    async fn open_attempt(
        &self,
        kind: ExamKind,
        exam_id: u64,
        paper_instance_id: u64,
        subject_ids: &[u64],
    ) -> AppResult<Option<u64>> {
        let endpoint = format!("{}/submissions/storage", Self::exam_path(kind, exam_id));
        let subjects: Vec<Value> = subject_ids
            .iter()
            .map(|id| json!({ "subject_id": id }))
            .collect();
        let body = json!({
            "exam_paper_instance_id": paper_instance_id,
            "subjects": subjects,
        });
        let response: StorageResponse =
            parse(&endpoint, self.request("POST", &endpoint, Some(body)).await?)?;
        Ok(response.id)
    }

    async fn post_submission(
        &self,
        kind: ExamKind,
        exam_id: u64,
        paper_instance_id: u64,
        submission_id: u64,
        answers: &[AnsweredSubject],
    ) -> AppResult<()> {
        let endpoint = format!("{}/submissions", Self::exam_path(kind, exam_id));
        let body = json!({
            "exam_paper_instance_id": paper_instance_id,
            "exam_submission_id": submission_id,
            "subjects": answers,
            "progress": {
                "answered_num": answers.len(),
                "total_subjects": answers.len(),
            },
        });
        self.request("POST", &endpoint, Some(body)).await?;
        Ok(())
    }

    async fn get_submission_detail(
        &self,
        kind: ExamKind,
        exam_id: u64,
        submission_id: u64,
    ) -> AppResult<SubmissionDetail> {
        self.get(&format!(
            "{}/submissions/{}",
            Self::exam_path(kind, exam_id),
            submission_id
        ))
        .await
    }
}

#[async_trait]
impl ActivityApi for PageLmsClient {
    async fn mark_read(&self, activity_id: u64, progress: ReadProgress) -> AppResult<()> {
        let endpoint = format!("/api/course/activities-read/{}", activity_id);
        self.request("POST", &endpoint, Some(serde_json::to_value(progress)?))
            .await?;
        Ok(())
    }

    async fn post_forum_reply(
        &self,
        activity_id: u64,
        title: &str,
        content: &str,
    ) -> AppResult<()> {
        let body = json!({
            "activity_id": activity_id,
            "title": title,
            "content": content,
            "uploads": [],
        });
        self.request("POST", "/api/topics", Some(body)).await?;
        Ok(())
    }
}

#[async_trait]
impl LmsApi for PageLmsClient {
    async fn reload(&self) -> AppResult<()> {
        info!("🔄 重新加载页面: {}", self.home_url);
        self.executor
            .page()
            .goto(self.home_url.as_str())
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: self.home_url.clone(),
                source: Box::new(e),
            })?;
        sleep(SETTLE_DELAY).await;
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        self.executor.page().clone().close().await?;
        Ok(())
    }
}
