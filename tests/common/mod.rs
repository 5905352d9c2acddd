//! 集成测试共用的 mock
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use course_runner::api::{ActivityApi, AiClient, CourseDirectory, ExamApi, LmsApi, ReadProgress};
use course_runner::error::{ApiError, AppError, AppResult};
use course_runner::models::{
    ActivityType, AnsweredSubject, CourseActivity, CourseGroup, Distribution, ExamKind, Progress,
    Subject, SubjectOption, SubjectType, SubmissionDetail, SubmissionList, SubmissionSummary,
    SubmittedAnswer,
};
use course_runner::orchestrator::LaneFactory;
use course_runner::services::{AiDispatcher, ProgressEvent};

// ========== AI ==========

/// 根据题目内容作答的 AI mock
pub struct FnAi {
    respond: Box<dyn Fn(&str) -> String + Send + Sync>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FnAi {
    pub fn new(respond: impl Fn(&str) -> String + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// 总是回答同一个字符串
    pub fn constant(reply: &str) -> Arc<Self> {
        let reply = reply.to_string();
        Self::new(move |_| reply.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiClient for FnAi {
    async fn complete(&self, _system: &str, prompt: &str, _format: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok((self.respond)(prompt))
    }
}

pub fn dispatcher(ai: Arc<FnAi>) -> Arc<AiDispatcher> {
    Arc::new(AiDispatcher::new(ai, 5))
}

// ========== 题目 ==========

/// 四个选项的选择题，选项 id 为 `id * 10 + 1 ..= id * 10 + 4`
pub fn choice_subject(id: u64, subject_type: SubjectType, point: f64) -> Subject {
    Subject {
        id,
        subject_type,
        description: format!("第{}题", id),
        options: (1..=4)
            .map(|i| SubjectOption {
                id: id * 10 + i,
                content: format!("选项{}", i),
            })
            .collect(),
        point,
        last_updated_at: "2024-03-01T00:00:00Z".to_string(),
    }
}

pub fn text_subject(id: u64, point: f64) -> Subject {
    Subject {
        id,
        subject_type: SubjectType::ShortAnswer,
        description: format!("第{}题", id),
        options: Vec::new(),
        point,
        last_updated_at: "2024-03-01T00:00:00Z".to_string(),
    }
}

// ========== 测验接口 ==========

#[derive(Default)]
struct ExamState {
    submissions: Vec<SubmissionSummary>,
    details: HashMap<u64, SubmissionDetail>,
    /// 下一次 get_submissions 还要报告"阅卷中"的次数
    pending_polls: u32,
    post_errors: VecDeque<AppError>,
    posted: Vec<Vec<AnsweredSubject>>,
    next_submission_id: u64,
}

/// 按标准答案自动评分的测验接口
pub struct MockExamApi {
    distribution: Distribution,
    correct: HashMap<u64, Vec<u64>>,
    pub storage_returns_token: bool,
    state: Mutex<ExamState>,
    pub post_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl MockExamApi {
    /// `correct`: 题目 id → 正确选项 id
    pub fn new(subjects: Vec<Subject>, correct: &[(u64, &[u64])]) -> Self {
        Self {
            distribution: Distribution {
                paper_instance_id: 77,
                subjects,
            },
            correct: correct
                .iter()
                .map(|(id, options)| (*id, options.to_vec()))
                .collect(),
            storage_returns_token: true,
            state: Mutex::new(ExamState {
                next_submission_id: 1000,
                ..Default::default()
            }),
            post_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_token(mut self) -> Self {
        self.storage_returns_token = false;
        self
    }

    /// 预置一条已出分的历史提交（没有逐题明细）
    pub fn with_history_score(self, score: f64) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_submission_id;
            state.next_submission_id += 1;
            state.submissions.push(SubmissionSummary {
                id,
                score: Some(score),
            });
            state.details.insert(
                id,
                SubmissionDetail {
                    subjects: self.distribution.subjects.clone(),
                    answers: Vec::new(),
                    subject_scores: HashMap::new(),
                },
            );
        }
        self
    }

    /// 前几次提交依次返回这些错误
    pub fn with_post_errors(self, errors: Vec<AppError>) -> Self {
        self.state.lock().unwrap().post_errors = errors.into();
        self
    }

    /// 有提交记录后，接下来 `polls` 次查询都把最新一条报告为"阅卷中"
    pub fn with_grading_delay(self, polls: u32) -> Self {
        self.state.lock().unwrap().pending_polls = polls;
        self
    }

    pub fn posts(&self) -> usize {
        self.post_calls.load(Ordering::SeqCst)
    }

    pub fn accepted_submissions(&self) -> usize {
        self.state.lock().unwrap().posted.len()
    }

    /// 每次被接受的提交里各题的答案
    pub fn posted_answers(&self) -> Vec<Vec<AnsweredSubject>> {
        self.state.lock().unwrap().posted.clone()
    }

    fn grade(&self, answers: &[AnsweredSubject]) -> (f64, HashMap<u64, f64>) {
        let mut scores = HashMap::new();
        for answer in answers {
            let Some(subject) = self
                .distribution
                .subjects
                .iter()
                .find(|s| s.id == answer.subject_id)
            else {
                continue;
            };
            let score = match self.correct.get(&answer.subject_id) {
                Some(expected) => {
                    let mut chosen = answer.answer_option_ids.clone();
                    chosen.sort_unstable();
                    if &chosen == expected {
                        subject.point
                    } else {
                        0.0
                    }
                }
                // 文本题只要有内容就给分
                None => match answer.answer.as_deref() {
                    Some(text) if !text.is_empty() && text != "略" => subject.point,
                    _ => 0.0,
                },
            };
            scores.insert(answer.subject_id, score);
        }
        (scores.values().sum(), scores)
    }
}

pub fn rate_limited() -> AppError {
    AppError::Api(ApiError::RateLimited {
        endpoint: "/api/exams/1/submissions".into(),
    })
}

pub fn bad_request() -> AppError {
    AppError::Api(ApiError::BadRequest {
        endpoint: "/api/exams/1/submissions".into(),
        message: "answers invalid".into(),
    })
}

#[async_trait]
impl ExamApi for MockExamApi {
    async fn get_submissions(&self, _kind: ExamKind, _exam_id: u64) -> AppResult<SubmissionList> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let mut submissions = state.submissions.clone();
        if state.pending_polls > 0 && !submissions.is_empty() {
            state.pending_polls -= 1;
            if let Some(last) = submissions.last_mut() {
                last.score = None;
            }
        }
        Ok(SubmissionList {
            best_score: None,
            submissions,
        })
    }

    async fn get_distribute(&self, _kind: ExamKind, _exam_id: u64) -> AppResult<Distribution> {
        Ok(self.distribution.clone())
    }

    async fn open_attempt(
        &self,
        _kind: ExamKind,
        _exam_id: u64,
        paper_instance_id: u64,
        subject_ids: &[u64],
    ) -> AppResult<Option<u64>> {
        assert_eq!(paper_instance_id, self.distribution.paper_instance_id);
        assert_eq!(subject_ids.len(), self.distribution.subjects.len());
        if !self.storage_returns_token {
            return Ok(None);
        }
        let mut state = self.state.lock().unwrap();
        let id = state.next_submission_id;
        state.next_submission_id += 1;
        Ok(Some(id))
    }

    async fn post_submission(
        &self,
        _kind: ExamKind,
        _exam_id: u64,
        _paper_instance_id: u64,
        submission_id: u64,
        answers: &[AnsweredSubject],
    ) -> AppResult<()> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        let (total, subject_scores) = self.grade(answers);
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.post_errors.pop_front() {
            return Err(err);
        }
        state.posted.push(answers.to_vec());
        state.submissions.push(SubmissionSummary {
            id: submission_id,
            score: Some(total),
        });
        state.details.insert(
            submission_id,
            SubmissionDetail {
                subjects: self.distribution.subjects.clone(),
                answers: answers
                    .iter()
                    .map(|a| SubmittedAnswer {
                        subject_id: a.subject_id,
                        answer_option_ids: a.answer_option_ids.clone(),
                        content: a.answer.clone(),
                    })
                    .collect(),
                subject_scores,
            },
        );
        Ok(())
    }

    async fn get_submission_detail(
        &self,
        _kind: ExamKind,
        _exam_id: u64,
        submission_id: u64,
    ) -> AppResult<SubmissionDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .details
            .get(&submission_id)
            .cloned()
            .ok_or_else(|| AppError::Other(format!("submission {} not found", submission_id)))
    }
}

// ========== 编排 ==========

pub fn group(id: u64, name: &str, completeness: f64) -> CourseGroup {
    CourseGroup {
        id,
        name: name.to_string(),
        completeness,
    }
}

pub fn activity(course_id: u64, activity_id: u64, activity_type: ActivityType) -> CourseActivity {
    CourseActivity {
        course_id,
        module_id: 1,
        module_name: "第一单元".to_string(),
        syllabus_id: None,
        syllabus_name: None,
        activity_type,
        activity_id,
        activity_name: format!("活动{}", activity_id),
        progress: Progress::None,
        sort: activity_id as i64,
        duration: Some(300),
    }
}

/// 课程目录 mock，可以让指定课程的查询失败
#[derive(Default)]
pub struct MockDirectory {
    pub courses: Vec<CourseGroup>,
    pub activities: HashMap<u64, Vec<CourseActivity>>,
    pub failing_courses: Vec<u64>,
}

#[async_trait]
impl CourseDirectory for MockDirectory {
    async fn list_courses(&self) -> AppResult<Vec<CourseGroup>> {
        Ok(self.courses.clone())
    }

    async fn unfinished_activities(&self, course_id: u64) -> AppResult<Vec<CourseActivity>> {
        if self.failing_courses.contains(&course_id) {
            return Err(AppError::api_request_failed(
                format!("/api/courses/{}/unfinished-activities", course_id),
                "connection reset",
            ));
        }
        Ok(self.activities.get(&course_id).cloned().unwrap_or_default())
    }
}

/// 通道 mock：记录上报的进度和重载次数，测验接口转给 `exam`
pub struct MockLane {
    pub lane_id: usize,
    pub exam: Option<Arc<MockExamApi>>,
    pub reads: Mutex<Vec<(u64, ReadProgress)>>,
    pub replies: Mutex<Vec<(u64, String)>>,
    pub reloads: AtomicUsize,
    pub closed: AtomicUsize,
}

impl MockLane {
    fn new(lane_id: usize, exam: Option<Arc<MockExamApi>>) -> Self {
        Self {
            lane_id,
            exam,
            reads: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
            reloads: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    fn exam(&self) -> AppResult<&MockExamApi> {
        self.exam
            .as_deref()
            .ok_or_else(|| AppError::Other("exam api not scripted for this lane".into()))
    }
}

#[async_trait]
impl ExamApi for MockLane {
    async fn get_submissions(&self, kind: ExamKind, exam_id: u64) -> AppResult<SubmissionList> {
        self.exam()?.get_submissions(kind, exam_id).await
    }

    async fn get_distribute(&self, kind: ExamKind, exam_id: u64) -> AppResult<Distribution> {
        self.exam()?.get_distribute(kind, exam_id).await
    }

    async fn open_attempt(
        &self,
        kind: ExamKind,
        exam_id: u64,
        paper_instance_id: u64,
        subject_ids: &[u64],
    ) -> AppResult<Option<u64>> {
        self.exam()?
            .open_attempt(kind, exam_id, paper_instance_id, subject_ids)
            .await
    }

    async fn post_submission(
        &self,
        kind: ExamKind,
        exam_id: u64,
        paper_instance_id: u64,
        submission_id: u64,
        answers: &[AnsweredSubject],
    ) -> AppResult<()> {
        self.exam()?
            .post_submission(kind, exam_id, paper_instance_id, submission_id, answers)
            .await
    }

    async fn get_submission_detail(
        &self,
        kind: ExamKind,
        exam_id: u64,
        submission_id: u64,
    ) -> AppResult<SubmissionDetail> {
        self.exam()?
            .get_submission_detail(kind, exam_id, submission_id)
            .await
    }
}

#[async_trait]
impl ActivityApi for MockLane {
    async fn mark_read(&self, activity_id: u64, progress: ReadProgress) -> AppResult<()> {
        self.reads.lock().unwrap().push((activity_id, progress));
        Ok(())
    }

    async fn post_forum_reply(
        &self,
        activity_id: u64,
        _title: &str,
        content: &str,
    ) -> AppResult<()> {
        self.replies
            .lock()
            .unwrap()
            .push((activity_id, content.to_string()));
        Ok(())
    }
}

#[async_trait]
impl LmsApi for MockLane {
    async fn reload(&self) -> AppResult<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 记录创建过的所有通道；所有通道共用同一个测验接口
#[derive(Default)]
pub struct MockLaneFactory {
    pub lanes: Mutex<Vec<Arc<MockLane>>>,
    pub exam: Option<Arc<MockExamApi>>,
}

impl MockLaneFactory {
    pub fn with_exam(exam: Arc<MockExamApi>) -> Self {
        Self {
            lanes: Mutex::new(Vec::new()),
            exam: Some(exam),
        }
    }

    pub fn created(&self) -> usize {
        self.lanes.lock().unwrap().len()
    }

    pub fn total_reloads(&self) -> usize {
        self.lanes
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.reloads.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl LaneFactory for MockLaneFactory {
    async fn create_lane(&self, lane_id: usize) -> AppResult<Arc<dyn LmsApi>> {
        let lane = Arc::new(MockLane::new(lane_id, self.exam.clone()));
        self.lanes.lock().unwrap().push(lane.clone());
        Ok(lane)
    }
}

/// 取出总线上已经投递的所有事件
pub fn drain_events(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>,
) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
