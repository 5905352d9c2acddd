//! 解题器 - 业务能力层
//!
//! 每道题一个解题器，在同一次考试调用的多轮重试之间复用，
//! 通过历史得分逐步排除错误答案。选择类和文本类各一种策略，
//! 由 [`Resolver`] 按题型组合。

pub mod choice;
pub mod text;

pub use choice::{ChoiceMode, ChoiceResolver};
pub use text::TextResolver;

use crate::models::{AnswerShape, AnsweredSubject, Subject};
use crate::services::ai_dispatcher::{AiDispatcher, BatchRequestItem};

/// 一道题在某次历史提交中的得分与作答
#[derive(Debug, Clone, Copy)]
pub struct SubjectFeedback<'a> {
    pub score: f64,
    pub chosen_option_ids: &'a [u64],
    pub content: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub enum Resolver {
    Choice(ChoiceResolver),
    Text(TextResolver),
}

impl Resolver {
    /// 为需要作答的题目创建解题器；说明文字和不支持的题型返回 `None`
    pub fn for_subject(subject: Subject) -> Option<Self> {
        match subject.subject_type.shape()? {
            AnswerShape::SingleChoice => Some(Resolver::Choice(ChoiceResolver::new(
                subject,
                ChoiceMode::Single,
            ))),
            AnswerShape::MultiChoice => Some(Resolver::Choice(ChoiceResolver::new(
                subject,
                ChoiceMode::Multi,
            ))),
            AnswerShape::FreeText => Some(Resolver::Text(TextResolver::new(subject))),
            AnswerShape::NoAnswer => None,
        }
    }

    pub fn subject(&self) -> &Subject {
        match self {
            Resolver::Choice(r) => r.subject(),
            Resolver::Text(r) => r.subject(),
        }
    }

    /// 把一次历史作答的反馈喂给解题器
    ///
    /// 对选择题，非零得分时"题目给出但未被选中的选项"作为错误选项传入。
    pub fn learn(&mut self, feedback: SubjectFeedback<'_>) {
        match self {
            Resolver::Choice(r) => {
                if feedback.score > 0.0 {
                    let wrong: Vec<u64> = r
                        .subject()
                        .option_ids()
                        .into_iter()
                        .filter(|id| !feedback.chosen_option_ids.contains(id))
                        .collect();
                    r.add_answer_filter(feedback.score, &wrong);
                } else {
                    r.add_answer_filter(feedback.score, feedback.chosen_option_ids);
                }
                if r.mode() == ChoiceMode::Multi {
                    r.mark_tried(feedback.chosen_option_ids);
                }
            }
            Resolver::Text(r) => {
                if let Some(content) = feedback.content {
                    r.add_text_feedback(feedback.score, content);
                }
            }
        }
    }

    pub fn batch_request(&self) -> Option<BatchRequestItem> {
        match self {
            Resolver::Choice(r) => r.batch_request(),
            Resolver::Text(r) => r.batch_request(),
        }
    }

    pub fn set_batch_result(&mut self, raw: String) {
        match self {
            Resolver::Choice(r) => r.set_batch_result(raw),
            Resolver::Text(r) => r.set_batch_result(raw),
        }
    }

    pub async fn answer(&mut self, ai: &AiDispatcher) -> AnsweredSubject {
        let (answer_option_ids, answer) = match self {
            Resolver::Choice(r) => (r.answer(ai).await, None),
            Resolver::Text(r) => (Vec::new(), Some(r.answer(ai).await)),
        };
        let subject = self.subject();
        AnsweredSubject {
            subject_id: subject.id,
            subject_updated_at: subject.last_updated_at.clone(),
            answer_option_ids,
            answer,
        }
    }

    pub fn is_pass(&self) -> bool {
        match self {
            Resolver::Choice(r) => r.is_pass(),
            Resolver::Text(r) => r.is_pass(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Resolver::Choice(r) => r.reset(),
            Resolver::Text(r) => r.reset(),
        }
    }

    /// 用最新拉取的题目替换，题面变化时清空学习状态
    pub fn refresh(&mut self, subject: Subject) {
        match self {
            Resolver::Choice(r) => r.refresh(subject),
            Resolver::Text(r) => r.refresh(subject),
        }
    }
}
