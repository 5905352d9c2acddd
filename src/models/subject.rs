use serde::{Deserialize, Serialize};

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    /// 单选
    SingleSelection,
    /// 多选
    MultipleSelection,
    /// 判断
    TrueOrFalse,
    /// 简答
    ShortAnswer,
    /// 填空
    FillInBlank,
    /// 完形填空
    Cloze,
    /// 材料分析
    Analysis,
    /// 连线匹配
    Matching,
    /// 说明文字，不作答
    Text,
    #[serde(other)]
    Unsupported,
}

/// 题型所属的作答策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerShape {
    /// 只有一个正确选项
    SingleChoice,
    /// 正确选项是一个集合
    MultiChoice,
    /// 自由文本
    FreeText,
    /// 无需作答
    NoAnswer,
}

impl SubjectType {
    pub fn shape(self) -> Option<AnswerShape> {
        match self {
            SubjectType::SingleSelection | SubjectType::TrueOrFalse => {
                Some(AnswerShape::SingleChoice)
            }
            SubjectType::MultipleSelection => Some(AnswerShape::MultiChoice),
            SubjectType::ShortAnswer
            | SubjectType::FillInBlank
            | SubjectType::Cloze
            | SubjectType::Analysis
            | SubjectType::Matching => Some(AnswerShape::FreeText),
            SubjectType::Text => Some(AnswerShape::NoAnswer),
            SubjectType::Unsupported => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SubjectType::SingleSelection => "单选题",
            SubjectType::MultipleSelection => "多选题",
            SubjectType::TrueOrFalse => "判断题",
            SubjectType::ShortAnswer => "简答题",
            SubjectType::FillInBlank => "填空题",
            SubjectType::Cloze => "完形填空",
            SubjectType::Analysis => "材料分析题",
            SubjectType::Matching => "匹配题",
            SubjectType::Text => "说明",
            SubjectType::Unsupported => "不支持的题型",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectOption {
    pub id: u64,
    pub content: String,
}

/// 试卷中的一道题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: u64,
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
    pub description: String,
    #[serde(default)]
    pub options: Vec<SubjectOption>,
    #[serde(default)]
    pub point: f64,
    #[serde(default)]
    pub last_updated_at: String,
}

impl Subject {
    pub fn option_ids(&self) -> Vec<u64> {
        self.options.iter().map(|o| o.id).collect()
    }

    pub fn needs_answer(&self) -> bool {
        !matches!(self.subject_type.shape(), Some(AnswerShape::NoAnswer))
    }

    /// 同一道题的题面是否发生了变化（选项或更新时间）
    pub fn revision_differs(&self, other: &Subject) -> bool {
        self.last_updated_at != other.last_updated_at || self.option_ids() != other.option_ids()
    }
}
