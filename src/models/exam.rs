use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::subject::Subject;

/// 测验的种类：两者共用同一套作答策略，只是接口路径不同
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamKind {
    Exam,
    Classroom,
}

impl ExamKind {
    /// 接口路径前缀
    pub fn path_segment(self) -> &'static str {
        match self {
            ExamKind::Exam => "exams",
            ExamKind::Classroom => "classroom-exams",
        }
    }
}

/// 一次提交记录的摘要；`score` 为空表示仍在阅卷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub id: u64,
    #[serde(default)]
    pub score: Option<f64>,
}

impl SubmissionSummary {
    pub fn is_pending(&self) -> bool {
        self.score.is_none()
    }
}

/// 历史提交列表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionList {
    #[serde(default)]
    pub best_score: Option<f64>,
    #[serde(default)]
    pub submissions: Vec<SubmissionSummary>,
}

impl SubmissionList {
    pub fn has_pending(&self) -> bool {
        self.submissions.iter().any(SubmissionSummary::is_pending)
    }

    /// 历史最高分：平台给出的最高分与每条记录分数取最大值
    pub fn best(&self) -> f64 {
        self.submissions
            .iter()
            .filter_map(|s| s.score)
            .chain(self.best_score)
            .fold(0.0, f64::max)
    }
}

/// 试卷分发结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub paper_instance_id: u64,
    pub subjects: Vec<Subject>,
}

impl Distribution {
    pub fn total_points(&self) -> f64 {
        self.subjects.iter().map(|s| s.point).sum()
    }
}

/// 某次提交中对一道题的作答
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub subject_id: u64,
    #[serde(default)]
    pub answer_option_ids: Vec<u64>,
    #[serde(default)]
    pub content: Option<String>,
}

/// 已批改提交的详情
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionDetail {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
    /// 题目 id → 得分
    #[serde(default)]
    pub subject_scores: HashMap<u64, f64>,
}

/// 准备提交的一道题的答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredSubject {
    pub subject_id: u64,
    pub subject_updated_at: String,
    pub answer_option_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// 单次考试循环的会话状态，循环结束即丢弃
#[derive(Debug, Clone, Default)]
pub struct ExamSession {
    pub exam_id: u64,
    pub paper_instance_id: Option<u64>,
    pub submission_id: Option<u64>,
    pub subjects: Vec<Subject>,
    pub total_points_threshold: f64,
    pub best_historical_score: f64,
    pub attempt_count: u32,
}

impl ExamSession {
    pub fn new(exam_id: u64, total_points: f64, pass_threshold_percent: f64) -> Self {
        Self {
            exam_id,
            total_points_threshold: total_points * pass_threshold_percent / 100.0,
            ..Default::default()
        }
    }

    pub fn is_passed(&self) -> bool {
        self.best_historical_score >= self.total_points_threshold
    }
}
