use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 平台 API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 考试流程错误
    #[error("考试错误: {0}")]
    Exam(#[from] ExamError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 平台 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {message}")]
    RequestFailed { endpoint: String, message: String },
    /// HTTP 400：请求校验失败，重试无意义
    #[error("API校验失败 ({endpoint}): {message}")]
    BadRequest { endpoint: String, message: String },
    /// HTTP 429：请求频率限制
    #[error("API请求频率限制 ({endpoint})")]
    RateLimited { endpoint: String },
    /// 其他非 2xx 响应
    #[error("API返回错误响应 ({endpoint}): status={status}")]
    BadStatus { endpoint: String, status: u16 },
    /// 响应结构与约定不符
    #[error("API响应格式错误 ({endpoint}): {message}")]
    MalformedResponse { endpoint: String, message: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 构建请求失败
    #[error("构建LLM请求失败: {0}")]
    RequestBuild(String),
}

/// 考试流程错误
#[derive(Debug, Error)]
pub enum ExamError {
    /// 未能获得答题凭证（submission id）
    #[error("考试 {exam_id} 未返回答题凭证")]
    MissingAttemptToken { exam_id: u64 },
    /// 提交在多次限流重试后仍失败
    #[error("考试 {exam_id} 提交被限流，已重试 {attempts} 次")]
    SubmitRateLimited { exam_id: u64, attempts: u32 },
    /// 试卷中没有可作答的题目
    #[error("考试 {exam_id} 没有可作答的题目")]
    NoSubjects { exam_id: u64 },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::MalformedResponse {
            endpoint: String::new(),
            message: err.to_string(),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(endpoint: impl Into<String>, message: impl ToString) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            message: message.to_string(),
        })
    }

    /// 创建响应格式错误
    pub fn malformed(endpoint: impl Into<String>, message: impl ToString) -> Self {
        AppError::Api(ApiError::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.to_string(),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(model: impl Into<String>, message: impl ToString) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            message: message.to_string(),
        })
    }

    /// 是否为致命错误
    ///
    /// 致命错误只中止当前条目，并且不会被通用重试包装再次执行。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Api(ApiError::BadRequest { .. })
                | AppError::Api(ApiError::MalformedResponse { .. })
                | AppError::Exam(ExamError::MissingAttemptToken { .. })
        )
    }

    /// 是否为限流错误
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::Api(ApiError::RateLimited { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
