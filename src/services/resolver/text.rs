//! 自由文本题（简答、填空、完形、材料分析、匹配）的解题器
//!
//! 各题型只在提示词里的题型名上不同，共用同一套策略。

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::Subject;
use crate::services::ai_dispatcher::{
    AiDispatcher, AnswerFormat, BatchRequestItem, FALLBACK_TEXT,
};
use crate::utils::{html_to_text, index_to_label, normalize_answer};

/// 推理失败或答案重复时的最大尝试次数
const MAX_INFERENCE_TRIES: usize = 3;

#[derive(Debug, Clone)]
pub struct TextResolver {
    subject: Subject,
    /// 得过零分的答案（归一化后）
    tried: HashSet<String>,
    passed: bool,
    cached: Option<String>,
    prefetched: Option<String>,
}

impl TextResolver {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            tried: HashSet::new(),
            passed: false,
            cached: None,
            prefetched: None,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// 合并一次历史作答的得分
    ///
    /// 非零得分：记住该答案，之后直接复用；零分：记入已尝试集合。
    pub fn add_text_feedback(&mut self, score: f64, answer: &str) {
        let answer = answer.trim();
        if answer.is_empty() {
            return;
        }
        if score > 0.0 {
            self.passed = true;
            self.cached = Some(answer.to_string());
        } else {
            self.tried.insert(normalize_answer(answer));
        }
    }

    pub fn is_pass(&self) -> bool {
        self.passed
    }

    pub fn batch_request(&self) -> Option<BatchRequestItem> {
        if self.is_pass() {
            return None;
        }
        Some(self.render())
    }

    pub fn set_batch_result(&mut self, raw: String) {
        self.prefetched = Some(raw);
    }

    pub async fn answer(&mut self, ai: &AiDispatcher) -> String {
        if let (true, Some(cached)) = (self.passed, self.cached.as_ref()) {
            self.prefetched = None;
            return cached.clone();
        }

        for attempt in 0..MAX_INFERENCE_TRIES {
            let raw = match self.prefetched.take() {
                Some(raw) => raw,
                None => ai.request(&self.render()).await,
            };
            let candidate = raw.trim();

            if candidate.is_empty() || candidate == FALLBACK_TEXT {
                debug!(
                    "题目 {} 第 {} 次推理没有得到有效答案",
                    self.subject.id,
                    attempt + 1
                );
                continue;
            }
            if !self.tried.insert(normalize_answer(candidate)) {
                debug!(
                    "题目 {} 第 {} 次推理得到重复答案",
                    self.subject.id,
                    attempt + 1
                );
                continue;
            }
            return candidate.to_string();
        }

        warn!(
            "题目 {} 连续 {} 次未得到可用答案，使用占位答案",
            self.subject.id, MAX_INFERENCE_TRIES
        );
        FALLBACK_TEXT.to_string()
    }

    pub fn reset(&mut self) {
        self.tried.clear();
        self.passed = false;
        self.cached = None;
        self.prefetched = None;
    }

    pub fn refresh(&mut self, subject: Subject) {
        if self.subject.revision_differs(&subject) {
            debug!("题目 {} 已更新，重置解题状态", subject.id);
            self.reset();
        }
        self.subject = subject;
    }

    fn render(&self) -> BatchRequestItem {
        let mut prompt = format!(
            "【{}】{}\n",
            self.subject.subject_type.name(),
            html_to_text(&self.subject.description)
        );
        for (i, option) in self.subject.options.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {}\n",
                index_to_label(i),
                html_to_text(&option.content)
            ));
        }

        BatchRequestItem {
            id: self.subject.id,
            format: AnswerFormat::FreeText,
            prompt,
            option_count: 0,
        }
    }
}
