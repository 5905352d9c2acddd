//! 选择类题目（单选、判断、多选）的解题器

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::models::{Subject, SubjectOption};
use crate::services::ai_dispatcher::{AiDispatcher, AnswerFormat, BatchRequestItem};
use crate::utils::{extract_indices, html_to_text, index_to_label};

/// 正确答案是单个选项还是选项集合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceMode {
    Single,
    Multi,
}

#[derive(Debug, Clone)]
pub struct ChoiceResolver {
    subject: Subject,
    mode: ChoiceMode,
    /// 已确认错误的选项
    excluded: BTreeSet<u64>,
    /// 已经提交过的组合（排序后的 id 列表），只对多选有意义
    tried: HashSet<Vec<u64>>,
    /// 多选题观察到过非零得分
    passed: bool,
    prefetched: Option<String>,
}

impl ChoiceResolver {
    pub fn new(subject: Subject, mode: ChoiceMode) -> Self {
        Self {
            subject,
            mode,
            excluded: BTreeSet::new(),
            tried: HashSet::new(),
            passed: false,
            prefetched: None,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn mode(&self) -> ChoiceMode {
        self.mode
    }

    pub fn excluded(&self) -> &BTreeSet<u64> {
        &self.excluded
    }

    /// 合并排除证据
    ///
    /// 只有非零得分才允许排除：零分只能说明"这一组选择不对"，
    /// 推不出任何单个选项的对错。对多选题，非零得分同时意味着
    /// 未被排除的选项就是正确集合。重复调用结果不变。
    pub fn add_answer_filter(&mut self, score: f64, wrong_option_ids: &[u64]) {
        if score <= 0.0 {
            return;
        }

        let option_ids: BTreeSet<u64> = self.subject.options.iter().map(|o| o.id).collect();
        let mut merged = self.excluded.clone();
        merged.extend(wrong_option_ids.iter().filter(|id| option_ids.contains(*id)));

        if merged.len() >= option_ids.len() && !option_ids.is_empty() {
            warn!(
                "题目 {} 的排除证据会排除全部选项，已忽略",
                self.subject.id
            );
        } else {
            self.excluded = merged;
        }

        if self.mode == ChoiceMode::Multi {
            self.passed = true;
        }
    }

    /// 记录一次已经提交过的组合
    pub fn mark_tried(&mut self, option_ids: &[u64]) {
        if option_ids.is_empty() {
            return;
        }
        self.tried.insert(normalize(option_ids));
    }

    pub fn is_pass(&self) -> bool {
        match self.mode {
            ChoiceMode::Single => self.available().len() == 1,
            ChoiceMode::Multi => self.passed,
        }
    }

    /// 未被排除的选项，保持原顺序
    pub fn available(&self) -> Vec<&SubjectOption> {
        self.subject
            .options
            .iter()
            .filter(|o| !self.excluded.contains(&o.id))
            .collect()
    }

    /// 需要 AI 回答时返回请求，已确定答案时返回 `None`
    pub fn batch_request(&self) -> Option<BatchRequestItem> {
        if self.is_pass() {
            return None;
        }
        Some(self.render())
    }

    pub fn set_batch_result(&mut self, raw: String) {
        self.prefetched = Some(raw);
    }

    /// 得出本次要提交的选项 id
    pub async fn answer(&mut self, ai: &AiDispatcher) -> Vec<u64> {
        if self.is_pass() {
            self.prefetched = None;
            let forced: Vec<u64> = self.available().iter().map(|o| o.id).collect();
            debug!("题目 {} 由排除法直接确定答案: {:?}", self.subject.id, forced);
            return forced;
        }

        let available: Vec<u64> = self.available().iter().map(|o| o.id).collect();
        if available.is_empty() {
            return Vec::new();
        }

        let raw = match self.prefetched.take() {
            Some(raw) => raw,
            None => ai.request(&self.render()).await,
        };

        let mut chosen: Vec<u64> = extract_indices(&raw, available.len())
            .into_iter()
            .map(|i| available[i])
            .collect();

        if chosen.is_empty() {
            warn!(
                "无法从 AI 回答中解析选项 (题目 {}): {}，选择第一个选项",
                self.subject.id,
                raw.trim()
            );
            chosen.push(available[0]);
        }

        match self.mode {
            ChoiceMode::Single => {
                chosen.truncate(1);
                chosen
            }
            ChoiceMode::Multi => {
                let mut chosen = normalize(&chosen);
                if self.tried.contains(&chosen) {
                    match self.perturb(&chosen, &available) {
                        Some(next) => {
                            debug!(
                                "题目 {} 的组合 {:?} 已提交过，改为 {:?}",
                                self.subject.id, chosen, next
                            );
                            chosen = next;
                        }
                        None => warn!("题目 {} 的所有组合都已尝试过", self.subject.id),
                    }
                }
                self.tried.insert(chosen.clone());
                chosen
            }
        }
    }

    /// 依次翻转某一个选项的选中状态，直到得到一个没试过的非空组合
    fn perturb(&self, current: &[u64], available: &[u64]) -> Option<Vec<u64>> {
        for id in available {
            let mut candidate: BTreeSet<u64> = current.iter().copied().collect();
            if !candidate.remove(id) {
                candidate.insert(*id);
            }
            if candidate.is_empty() {
                continue;
            }
            let candidate: Vec<u64> = candidate.into_iter().collect();
            if !self.tried.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// 清空所有学习到的状态
    pub fn reset(&mut self) {
        self.excluded.clear();
        self.tried.clear();
        self.passed = false;
        self.prefetched = None;
    }

    /// 替换为最新拉取的题目；题面有变化时清空学习状态
    pub fn refresh(&mut self, subject: Subject) {
        if self.subject.revision_differs(&subject) {
            debug!("题目 {} 已更新，重置解题状态", subject.id);
            self.reset();
        }
        self.subject = subject;
    }

    fn render(&self) -> BatchRequestItem {
        let available = self.available();
        let mut prompt = format!(
            "【{}】{}\n",
            self.subject.subject_type.name(),
            html_to_text(&self.subject.description)
        );
        for (i, option) in available.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {}\n",
                index_to_label(i),
                html_to_text(&option.content)
            ));
        }

        BatchRequestItem {
            id: self.subject.id,
            format: match self.mode {
                ChoiceMode::Single => AnswerFormat::SingleChoice,
                ChoiceMode::Multi => AnswerFormat::MultiChoice,
            },
            prompt,
            option_count: available.len(),
        }
    }
}

fn normalize(option_ids: &[u64]) -> Vec<u64> {
    let set: BTreeSet<u64> = option_ids.iter().copied().collect();
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubjectType;

    fn subject(subject_type: SubjectType, option_count: u64) -> Subject {
        Subject {
            id: 1,
            subject_type,
            description: "<p>下列哪项正确？</p>".into(),
            options: (1..=option_count)
                .map(|id| SubjectOption {
                    id: id * 10,
                    content: format!("选项{}", id),
                })
                .collect(),
            point: 2.0,
            last_updated_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn single(options: u64) -> ChoiceResolver {
        ChoiceResolver::new(subject(SubjectType::SingleSelection, options), ChoiceMode::Single)
    }

    fn multi(options: u64) -> ChoiceResolver {
        ChoiceResolver::new(subject(SubjectType::MultipleSelection, options), ChoiceMode::Multi)
    }

    #[test]
    fn test_single_forced_after_three_exclusions() {
        let mut resolver = single(4);
        resolver.add_answer_filter(2.0, &[10, 20, 40]);
        assert!(resolver.is_pass());
        assert!(resolver.batch_request().is_none());
        assert_eq!(resolver.available().len(), 1);
        assert_eq!(resolver.available()[0].id, 30);
    }

    #[test]
    fn test_zero_score_does_not_exclude() {
        let mut resolver = single(4);
        resolver.add_answer_filter(0.0, &[20]);
        assert!(resolver.excluded().is_empty());
        assert!(!resolver.is_pass());
        assert!(resolver.batch_request().is_some());
    }

    #[test]
    fn test_filter_is_idempotent_and_bounded() {
        let mut resolver = single(4);
        resolver.add_answer_filter(1.0, &[10, 999]);
        resolver.add_answer_filter(1.0, &[10]);
        assert_eq!(resolver.excluded().iter().copied().collect::<Vec<_>>(), vec![10]);

        // 不能把全部选项都排除
        resolver.add_answer_filter(1.0, &[20, 30, 40]);
        assert_eq!(resolver.excluded().len(), 1);
    }

    #[test]
    fn test_multi_passes_on_nonzero_score() {
        let mut resolver = multi(4);
        resolver.add_answer_filter(0.0, &[30, 40]);
        assert!(!resolver.is_pass());
        resolver.add_answer_filter(3.0, &[30, 40]);
        assert!(resolver.is_pass());
        let ids: Vec<u64> = resolver.available().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn test_render_skips_excluded_options() {
        let mut resolver = multi(3);
        resolver.excluded.insert(20);
        let item = resolver.batch_request().unwrap();
        assert_eq!(item.option_count, 2);
        assert_eq!(item.format, AnswerFormat::MultiChoice);
        assert!(item.prompt.starts_with("【多选题】下列哪项正确？"));
        assert!(item.prompt.contains("A. 选项1\nB. 选项3\n"));
    }

    #[test]
    fn test_refresh_resets_on_revision_change() {
        let mut resolver = single(4);
        resolver.add_answer_filter(1.0, &[10]);

        resolver.refresh(subject(SubjectType::SingleSelection, 4));
        assert_eq!(resolver.excluded().len(), 1);

        let mut changed = subject(SubjectType::SingleSelection, 4);
        changed.last_updated_at = "2024-02-01T00:00:00Z".into();
        resolver.refresh(changed);
        assert!(resolver.excluded().is_empty());
    }

    #[test]
    fn test_perturb_toggles_one_option() {
        let mut resolver = multi(3);
        resolver.mark_tried(&[30, 10]);
        let next = resolver.perturb(&[10, 30], &[10, 20, 30]).unwrap();
        assert_eq!(next, vec![30]);

        resolver.mark_tried(&[30]);
        let next = resolver.perturb(&[10, 30], &[10, 20, 30]).unwrap();
        assert_eq!(next, vec![10, 20, 30]);
    }
}
