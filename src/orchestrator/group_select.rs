//! 课程选择策略

use std::cmp::Ordering;

use tracing::warn;

use crate::config::Config;
use crate::models::CourseGroup;

/// 本次运行处理哪些课程
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupPolicy {
    /// 按列表顺序的下标（从 0 开始）
    Index(usize),
    /// 课程名包含该字符串
    Title(String),
    /// 所有未完成的课程，完成度低的优先
    LowestCompletion,
}

impl GroupPolicy {
    /// 下标优先于标题；都没配置时按完成度
    pub fn from_config(config: &Config) -> Self {
        if let Some(index) = config.course_index {
            return GroupPolicy::Index(index);
        }
        match config.course_title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => GroupPolicy::Title(title.to_string()),
            _ => GroupPolicy::LowestCompletion,
        }
    }
}

impl Default for GroupPolicy {
    fn default() -> Self {
        GroupPolicy::LowestCompletion
    }
}

/// 按策略从候选课程中选出要处理的课程
pub fn select_groups(candidates: Vec<CourseGroup>, policy: &GroupPolicy) -> Vec<CourseGroup> {
    match policy {
        GroupPolicy::Index(index) => {
            let total = candidates.len();
            match candidates.into_iter().nth(*index) {
                Some(group) => vec![group],
                None => {
                    warn!("⚠️ 课程下标 {} 超出范围（共 {} 门课程）", index, total);
                    Vec::new()
                }
            }
        }
        GroupPolicy::Title(title) => {
            let selected: Vec<_> = candidates
                .into_iter()
                .filter(|g| g.name.contains(title.as_str()))
                .collect();
            if selected.is_empty() {
                warn!("⚠️ 没有课程名包含 \"{}\"", title);
            }
            selected
        }
        GroupPolicy::LowestCompletion => {
            let mut selected: Vec<_> = candidates
                .into_iter()
                .filter(|g| g.completeness < 100.0)
                .collect();
            selected.sort_by(|a, b| {
                a.completeness
                    .partial_cmp(&b.completeness)
                    .unwrap_or(Ordering::Equal)
            });
            selected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<CourseGroup> {
        [("马克思主义基本原理", 40.0), ("大学英语", 100.0), ("管理学基础", 12.5), ("英语写作", 75.0)]
            .iter()
            .enumerate()
            .map(|(i, (name, completeness))| CourseGroup {
                id: i as u64 + 1,
                name: name.to_string(),
                completeness: *completeness,
            })
            .collect()
    }

    fn ids(groups: &[CourseGroup]) -> Vec<u64> {
        groups.iter().map(|g| g.id).collect()
    }

    #[test]
    fn test_index_selects_single_group() {
        assert_eq!(ids(&select_groups(groups(), &GroupPolicy::Index(2))), vec![3]);
        assert!(select_groups(groups(), &GroupPolicy::Index(9)).is_empty());
    }

    #[test]
    fn test_title_substring_match() {
        let selected = select_groups(groups(), &GroupPolicy::Title("英语".into()));
        assert_eq!(ids(&selected), vec![2, 4]);
    }

    #[test]
    fn test_lowest_completion_first_skips_finished() {
        let selected = select_groups(groups(), &GroupPolicy::LowestCompletion);
        assert_eq!(ids(&selected), vec![3, 1, 4]);
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = Config::default();
        assert_eq!(GroupPolicy::from_config(&config), GroupPolicy::LowestCompletion);

        config.course_title = Some("英语".into());
        assert_eq!(GroupPolicy::from_config(&config), GroupPolicy::Title("英语".into()));

        config.course_index = Some(0);
        assert_eq!(GroupPolicy::from_config(&config), GroupPolicy::Index(0));
    }
}
