//! 选项标签编解码
//!
//! 选项序号（从 0 开始）与字母标签之间的双射：
//! `0 → A`、`25 → Z`、`26 → AA`、`27 → AB` ……（无零的 26 进制）

use std::sync::LazyLock;

use regex::Regex;

static LETTER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("valid letter-run regex"));

/// 序号转标签
pub fn index_to_label(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// 标签转序号（不区分大小写），非字母或空串返回 `None`
pub fn label_to_index(label: &str) -> Option<usize> {
    if label.is_empty() {
        return None;
    }
    let mut acc: usize = 0;
    for c in label.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// 从模型输出中提取选项序号
///
/// 只识别整段都是大写字母的片段（避免把英文单词的首字母当成答案）。
/// 多字母片段先按单个标签解码，超出 `option_count` 时再逐字母拆分。
/// 结果按出现顺序去重，且全部落在 `[0, option_count)` 内。
pub fn extract_indices(text: &str, option_count: usize) -> Vec<usize> {
    let mut found = Vec::new();
    for m in LETTER_RUN.find_iter(text) {
        let run = m.as_str();
        if !run.chars().all(|c| c.is_ascii_uppercase()) {
            continue;
        }

        match label_to_index(run) {
            Some(index) if index < option_count => push_unique(&mut found, index),
            _ if run.len() > 1 => {
                for c in run.chars() {
                    if let Some(index) = label_to_index(&c.to_string()) {
                        if index < option_count {
                            push_unique(&mut found, index);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    found
}

fn push_unique(found: &mut Vec<usize>, index: usize) {
    if !found.contains(&index) {
        found.push(index);
    }
}
