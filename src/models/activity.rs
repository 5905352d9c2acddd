use serde::{Deserialize, Serialize};

/// 课程活动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// 视频
    OnlineVideo,
    /// 文档资料
    Material,
    /// 外部链接
    WebLink,
    /// 论坛
    Forum,
    /// 测验 / 考试
    Exam,
    /// 课堂练习
    Classroom,
    /// 平台新增的未知类型
    #[serde(other)]
    Unknown,
}

impl ActivityType {
    /// 所有已知类型
    pub const KNOWN: [ActivityType; 6] = [
        ActivityType::OnlineVideo,
        ActivityType::Material,
        ActivityType::WebLink,
        ActivityType::Forum,
        ActivityType::Exam,
        ActivityType::Classroom,
    ];

    /// 平台使用的类型标签
    pub fn tag(self) -> &'static str {
        match self {
            ActivityType::OnlineVideo => "online_video",
            ActivityType::Material => "material",
            ActivityType::WebLink => "web_link",
            ActivityType::Forum => "forum",
            ActivityType::Exam => "exam",
            ActivityType::Classroom => "classroom",
            ActivityType::Unknown => "unknown",
        }
    }

    /// 中文名称（日志用）
    pub fn name(self) -> &'static str {
        match self {
            ActivityType::OnlineVideo => "视频",
            ActivityType::Material => "资料",
            ActivityType::WebLink => "链接",
            ActivityType::Forum => "论坛",
            ActivityType::Exam => "测验",
            ActivityType::Classroom => "课堂练习",
            ActivityType::Unknown => "未知",
        }
    }
}

/// 活动完成进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    Full,
    Part,
    None,
}

/// 一个可学习单元（视频、测验、资料、论坛……）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseActivity {
    pub course_id: u64,
    pub module_id: u64,
    pub module_name: String,
    #[serde(default)]
    pub syllabus_id: Option<u64>,
    #[serde(default)]
    pub syllabus_name: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub activity_id: u64,
    pub activity_name: String,
    pub progress: Progress,
    #[serde(default)]
    pub sort: i64,
    /// 视频时长（秒），只有视频有
    #[serde(default)]
    pub duration: Option<u64>,
}

/// 一门课程，即编排器的分组单位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseGroup {
    pub id: u64,
    pub name: String,
    /// 完成度（0-100）
    #[serde(default)]
    pub completeness: f64,
}
