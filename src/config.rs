use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 单次分组运行允许的最大通道数
pub const MAX_LANES: usize = 6;

/// 程序配置文件
///
/// 加载顺序：默认值 → TOML 文件（可选）→ 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 学习平台地址
    pub target_url: String,
    /// 复用标题包含该文字的已打开页面，不设置时新建页面
    pub target_page_title: Option<String>,
    /// 并发通道数（0 表示自动，最多 6）
    pub concurrency: usize,
    /// 按序号选择课程（从 0 开始）
    pub course_index: Option<usize>,
    /// 按标题选择课程（包含匹配）
    pub course_title: Option<String>,
    /// 考试最大重试次数（总提交次数为该值 + 1）
    pub exam_max_retries: u32,
    /// 及格线（占总分的百分比）
    pub pass_threshold_percent: f64,
    /// 提交前随机等待的上限（毫秒）
    pub submit_jitter_ms: u64,
    /// AI 每秒请求数
    pub ai_requests_per_second: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: "https://lms.ouchn.cn/user/index".to_string(),
            target_page_title: None,
            concurrency: 0,
            course_index: None,
            course_title: None,
            exam_max_retries: 3,
            pass_threshold_percent: 80.0,
            submit_jitter_ms: 3000,
            ai_requests_per_second: 3,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    /// 只从环境变量读取配置
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 读取 TOML 配置文件（文件不存在时使用默认值），再叠加环境变量
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let base = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| {
                ConfigError::ReadFailed {
                    path: path.display().to_string(),
                    source,
                }
            })?;
            Self::from_toml_str(&content, &path.display().to_string())?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    fn from_toml_str(content: &str, path: &str) -> AppResult<Self> {
        let config = toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_string(),
            source,
        })?;
        Ok(config)
    }

    fn with_env_overrides(self) -> AppResult<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        if let Some(v) = parse_var(&lookup, "BROWSER_DEBUG_PORT")? {
            self.browser_debug_port = v;
        }
        if let Some(v) = lookup("TARGET_URL") {
            self.target_url = v;
        }
        if let Some(v) = lookup("TARGET_PAGE_TITLE") {
            // 空标题会匹配任意页面
            self.target_page_title = Some(v).filter(|title| !title.trim().is_empty());
        }
        if let Some(v) = parse_var(&lookup, "CONCURRENCY")? {
            self.concurrency = v;
        }
        if let Some(v) = parse_var(&lookup, "COURSE_INDEX")? {
            self.course_index = Some(v);
        }
        if let Some(v) = lookup("COURSE_TITLE") {
            self.course_title = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "EXAM_MAX_RETRIES")? {
            self.exam_max_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "PASS_THRESHOLD_PERCENT")? {
            self.pass_threshold_percent = v;
        }
        if let Some(v) = parse_var(&lookup, "SUBMIT_JITTER_MS")? {
            self.submit_jitter_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "AI_REQUESTS_PER_SECOND")? {
            self.ai_requests_per_second = v;
        }
        if let Some(v) = parse_var(&lookup, "VERBOSE_LOGGING")? {
            self.verbose_logging = v;
        }
        if let Some(v) = lookup("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Some(v) = lookup("LLM_API_BASE_URL") {
            self.llm_api_base_url = v;
        }
        if let Some(v) = lookup("LLM_MODEL_NAME") {
            self.llm_model_name = v;
        }
        Ok(self)
    }

    /// 考试引擎使用的参数
    pub fn exam_settings(&self) -> ExamSettings {
        ExamSettings {
            max_retries: self.exam_max_retries,
            pass_threshold_percent: self.pass_threshold_percent.clamp(0.0, 100.0),
            submit_jitter: Duration::from_millis(self.submit_jitter_ms),
            ..ExamSettings::default()
        }
    }

    /// 编排器使用的参数
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            concurrency: self.concurrency,
            ..OrchestratorSettings::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> AppResult<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value: raw,
                expected_type: std::any::type_name::<T>().to_string(),
            }
            .into()
        }),
    }
}

/// 考试引擎参数
#[derive(Clone, Debug)]
pub struct ExamSettings {
    pub max_retries: u32,
    pub pass_threshold_percent: f64,
    /// 等待阅卷的轮询次数上限
    pub grading_poll_limit: u32,
    pub grading_poll_interval: Duration,
    /// 429 时的重试次数上限
    pub rate_limit_retries: u32,
    pub rate_limit_backoff: Duration,
    pub submit_jitter: Duration,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            pass_threshold_percent: 80.0,
            grading_poll_limit: 10,
            grading_poll_interval: Duration::from_secs(3),
            rate_limit_retries: 5,
            rate_limit_backoff: Duration::from_secs(10),
            submit_jitter: Duration::from_secs(3),
        }
    }
}

/// 编排器参数
#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    pub concurrency: usize,
    /// 单个条目的最大执行次数（含首次）
    pub item_attempts: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            concurrency: 0,
            item_attempts: 3,
        }
    }
}

impl OrchestratorSettings {
    /// 计算实际通道数：min(配置值或自动, 6, 条目数)
    pub fn lane_count(&self, item_count: usize) -> usize {
        let wanted = if self.concurrency == 0 {
            MAX_LANES
        } else {
            self.concurrency
        };
        wanted.min(MAX_LANES).min(item_count)
    }
}
