//! 测验作答引擎 - 流程层
//!
//! 一次测验的完整重试循环，用显式状态机表达：
//!
//! ```text
//! FetchHistory ──达到及格线──▶ Pass
//!      │  └────达到提交上限──▶ Exhausted
//!      ▼
//! OpenAttempt ──▶ ResolveAnswers ──▶ Submit ──▶ FetchHistory
//! ```
//!
//! 解题器按题目 id 保存在引擎里，在同一次调用的多轮之间复用；
//! 引擎本身只属于一个通道上的一个条目。

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::ExamApi;
use crate::config::ExamSettings;
use crate::error::{AppResult, ExamError};
use crate::models::{
    AnsweredSubject, Distribution, ExamKind, ExamSession, SubjectType, SubmissionDetail,
    SubmissionList,
};
use crate::services::{AiDispatcher, Resolver, SubjectFeedback};

/// 状态机的状态，携带进入该状态所需的数据
#[derive(Debug)]
enum ExamState {
    FetchHistory,
    OpenAttempt { history: SubmissionList },
    ResolveAnswers { history: SubmissionList },
    Submit { answers: Vec<AnsweredSubject> },
    Pass,
    Exhausted,
}

/// 循环结束时的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ExamOutcome {
    /// 历史最高分达到及格线
    Passed {
        best_score: f64,
        threshold: f64,
        attempts: u32,
    },
    /// 提交次数用尽仍未及格
    Exhausted {
        best_score: f64,
        threshold: f64,
        attempts: u32,
    },
}

pub struct ExamEngine {
    kind: ExamKind,
    exam_id: u64,
    label: String,
    settings: ExamSettings,
    ai: Arc<AiDispatcher>,
    resolvers: HashMap<u64, Resolver>,
    details: HashMap<u64, SubmissionDetail>,
    /// 预检时拉取的试卷，第一轮直接复用
    fresh_distribution: Option<Distribution>,
}

impl ExamEngine {
    pub fn new(
        kind: ExamKind,
        exam_id: u64,
        label: impl Into<String>,
        settings: ExamSettings,
        ai: Arc<AiDispatcher>,
    ) -> Self {
        Self {
            kind,
            exam_id,
            label: label.into(),
            settings,
            ai,
            resolvers: HashMap::new(),
            details: HashMap::new(),
            fresh_distribution: None,
        }
    }

    /// 预检：拉取试卷，判断是否都是能作答的题型
    ///
    /// 返回 `Some(原因)` 表示应跳过该条目。
    pub async fn preflight<A: ExamApi + ?Sized>(
        &mut self,
        api: &A,
    ) -> AppResult<Option<String>> {
        let distribution = api.get_distribute(self.kind, self.exam_id).await?;

        let unsupported: Vec<u64> = distribution
            .subjects
            .iter()
            .filter(|s| s.subject_type == SubjectType::Unsupported)
            .map(|s| s.id)
            .collect();
        if !unsupported.is_empty() {
            return Ok(Some(format!("包含不支持的题型 (题目 {:?})", unsupported)));
        }
        if !distribution.subjects.iter().any(|s| s.needs_answer()) {
            return Ok(Some("试卷没有需要作答的题目".to_string()));
        }

        self.fresh_distribution = Some(distribution);
        Ok(None)
    }

    /// 运行重试循环直到及格或用尽提交次数
    pub async fn run<A: ExamApi + ?Sized>(&mut self, api: &A) -> AppResult<ExamOutcome> {
        let distribution = match self.fresh_distribution.take() {
            Some(distribution) => distribution,
            None => api.get_distribute(self.kind, self.exam_id).await?,
        };
        if distribution.subjects.is_empty() {
            return Err(ExamError::NoSubjects {
                exam_id: self.exam_id,
            }
            .into());
        }

        let total_points = distribution.total_points();
        let mut session = ExamSession::new(
            self.exam_id,
            total_points,
            self.settings.pass_threshold_percent,
        );
        self.fresh_distribution = Some(distribution);

        info!(
            "{} 📝 开始作答，总分 {:.1}，及格线 {:.1}，最多提交 {} 次",
            self.label,
            total_points,
            session.total_points_threshold,
            self.settings.max_retries + 1
        );

        let mut state = ExamState::FetchHistory;
        loop {
            state = match state {
                ExamState::Pass => {
                    info!(
                        "{} ✅ 已达到及格线: {:.1}/{:.1}",
                        self.label, session.best_historical_score, session.total_points_threshold
                    );
                    return Ok(ExamOutcome::Passed {
                        best_score: session.best_historical_score,
                        threshold: session.total_points_threshold,
                        attempts: session.attempt_count,
                    });
                }
                ExamState::Exhausted => {
                    warn!(
                        "{} ⚠️ 已提交 {} 次仍未及格，最高分 {:.1}",
                        self.label, session.attempt_count, session.best_historical_score
                    );
                    return Ok(ExamOutcome::Exhausted {
                        best_score: session.best_historical_score,
                        threshold: session.total_points_threshold,
                        attempts: session.attempt_count,
                    });
                }
                other => self.step(api, &mut session, other).await?,
            };
        }
    }

    /// 状态转移函数
    async fn step<A: ExamApi + ?Sized>(
        &mut self,
        api: &A,
        session: &mut ExamSession,
        state: ExamState,
    ) -> AppResult<ExamState> {
        match state {
            ExamState::FetchHistory => self.fetch_history(api, session).await,
            ExamState::OpenAttempt { history } => self.open_attempt(api, session, history).await,
            ExamState::ResolveAnswers { history } => {
                let answers = self.resolve_answers(api, session, &history).await?;
                Ok(ExamState::Submit { answers })
            }
            ExamState::Submit { answers } => self.submit(api, session, &answers).await,
            terminal => Ok(terminal),
        }
    }

    async fn fetch_history<A: ExamApi + ?Sized>(
        &mut self,
        api: &A,
        session: &mut ExamSession,
    ) -> AppResult<ExamState> {
        let mut history = api.get_submissions(self.kind, self.exam_id).await?;

        let mut polls = 0;
        while history.has_pending() && polls < self.settings.grading_poll_limit {
            polls += 1;
            debug!(
                "{} 有提交正在阅卷，第 {}/{} 次等待",
                self.label, polls, self.settings.grading_poll_limit
            );
            sleep(self.settings.grading_poll_interval).await;
            history = api.get_submissions(self.kind, self.exam_id).await?;
        }
        if history.has_pending() {
            warn!("{} 仍有提交未出分，按已出分的记录计算", self.label);
        }

        session.best_historical_score = history.best();
        debug!(
            "{} 历史提交 {} 次，最高分 {:.1}",
            self.label,
            history.submissions.len(),
            session.best_historical_score
        );

        if !history.submissions.is_empty() && session.is_passed() {
            return Ok(ExamState::Pass);
        }
        if session.attempt_count > self.settings.max_retries {
            return Ok(ExamState::Exhausted);
        }
        Ok(ExamState::OpenAttempt { history })
    }

    async fn open_attempt<A: ExamApi + ?Sized>(
        &mut self,
        api: &A,
        session: &mut ExamSession,
        history: SubmissionList,
    ) -> AppResult<ExamState> {
        let distribution = match self.fresh_distribution.take() {
            Some(distribution) => distribution,
            None => api.get_distribute(self.kind, self.exam_id).await?,
        };

        let subject_ids: Vec<u64> = distribution.subjects.iter().map(|s| s.id).collect();
        let submission_id = api
            .open_attempt(
                self.kind,
                self.exam_id,
                distribution.paper_instance_id,
                &subject_ids,
            )
            .await?
            .ok_or(ExamError::MissingAttemptToken {
                exam_id: self.exam_id,
            })?;

        session.paper_instance_id = Some(distribution.paper_instance_id);
        session.submission_id = Some(submission_id);
        session.subjects = distribution.subjects;

        info!(
            "{} 第 {} 次作答，共 {} 道题",
            self.label,
            session.attempt_count + 1,
            session.subjects.len()
        );
        Ok(ExamState::ResolveAnswers { history })
    }

    async fn resolve_answers<A: ExamApi + ?Sized>(
        &mut self,
        api: &A,
        session: &ExamSession,
        history: &SubmissionList,
    ) -> AppResult<Vec<AnsweredSubject>> {
        let mut order = Vec::new();
        for subject in session.subjects.iter().filter(|s| s.needs_answer()) {
            match self.resolvers.entry(subject.id) {
                Entry::Occupied(mut entry) => entry.get_mut().refresh(subject.clone()),
                Entry::Vacant(entry) => match Resolver::for_subject(subject.clone()) {
                    Some(resolver) => {
                        entry.insert(resolver);
                    }
                    None => continue,
                },
            }
            order.push(subject.id);
        }

        self.replay_feedback(api, history).await?;

        let requests: Vec<_> = order
            .iter()
            .filter_map(|id| self.resolvers.get(id))
            .filter_map(Resolver::batch_request)
            .collect();
        let decided = order.len() - requests.len();
        info!(
            "{} 已确定 {} 题，需要 AI 作答 {} 题",
            self.label,
            decided,
            requests.len()
        );

        for (id, raw) in self.ai.batch_request(&requests).await {
            if let Some(resolver) = self.resolvers.get_mut(&id) {
                resolver.set_batch_result(raw);
            }
        }

        let mut answers = Vec::with_capacity(order.len());
        for id in &order {
            if let Some(resolver) = self.resolvers.get_mut(id) {
                answers.push(resolver.answer(&self.ai).await);
            }
        }
        Ok(answers)
    }

    /// 把每次已出分提交的逐题得分交给对应解题器
    async fn replay_feedback<A: ExamApi + ?Sized>(
        &mut self,
        api: &A,
        history: &SubmissionList,
    ) -> AppResult<()> {
        for summary in history.submissions.iter().filter(|s| !s.is_pending()) {
            if !self.details.contains_key(&summary.id) {
                let detail = api
                    .get_submission_detail(self.kind, self.exam_id, summary.id)
                    .await?;
                self.details.insert(summary.id, detail);
            }
            let Some(detail) = self.details.get(&summary.id) else {
                continue;
            };

            let versions: HashMap<u64, &str> = detail
                .subjects
                .iter()
                .map(|s| (s.id, s.last_updated_at.as_str()))
                .collect();

            for answer in &detail.answers {
                let Some(resolver) = self.resolvers.get_mut(&answer.subject_id) else {
                    continue;
                };
                // 题目更新过的旧提交不再作为证据
                if let Some(version) = versions.get(&answer.subject_id) {
                    if *version != resolver.subject().last_updated_at {
                        continue;
                    }
                }
                let score = detail
                    .subject_scores
                    .get(&answer.subject_id)
                    .copied()
                    .unwrap_or(0.0);
                resolver.learn(SubjectFeedback {
                    score,
                    chosen_option_ids: &answer.answer_option_ids,
                    content: answer.content.as_deref(),
                });
            }
        }
        Ok(())
    }

    async fn submit<A: ExamApi + ?Sized>(
        &mut self,
        api: &A,
        session: &mut ExamSession,
        answers: &[AnsweredSubject],
    ) -> AppResult<ExamState> {
        let (Some(paper_instance_id), Some(submission_id)) =
            (session.paper_instance_id, session.submission_id)
        else {
            return Err(ExamError::MissingAttemptToken {
                exam_id: self.exam_id,
            }
            .into());
        };

        let max_jitter = self.settings.submit_jitter.as_millis() as u64;
        if max_jitter > 0 {
            let jitter = rand::rng().random_range(0..=max_jitter);
            sleep(Duration::from_millis(jitter)).await;
        }

        let mut rate_limited = 0;
        loop {
            match api
                .post_submission(
                    self.kind,
                    self.exam_id,
                    paper_instance_id,
                    submission_id,
                    answers,
                )
                .await
            {
                Ok(()) => break,
                Err(e) if e.is_rate_limited() => {
                    if rate_limited >= self.settings.rate_limit_retries {
                        return Err(ExamError::SubmitRateLimited {
                            exam_id: self.exam_id,
                            attempts: rate_limited,
                        }
                        .into());
                    }
                    rate_limited += 1;
                    warn!(
                        "{} 提交被限流，{} 秒后第 {}/{} 次重试",
                        self.label,
                        self.settings.rate_limit_backoff.as_secs(),
                        rate_limited,
                        self.settings.rate_limit_retries
                    );
                    sleep(self.settings.rate_limit_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }

        session.attempt_count += 1;
        info!("{} 📤 第 {} 次提交完成", self.label, session.attempt_count);
        Ok(ExamState::FetchHistory)
    }
}
