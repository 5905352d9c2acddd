//! LLM 客户端
//!
//! 基于 `async-openai`，兼容任何 OpenAI 风格的接口（Azure、Gemini、豆包等）。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::AiClient;
use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};

pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 发送一次聊天请求
    ///
    /// 格式要求追加在题目之后，作为同一条用户消息发送。
    pub async fn send_to_llm(&self, user_message: &str, system_message: &str) -> AppResult<String> {
        debug!(
            "调用 LLM API，模型: {}，消息长度: {} 字符",
            self.model_name,
            user_message.chars().count()
        );

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(|e| LlmError::RequestBuild(e.to_string()))?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| LlmError::RequestBuild(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.3)
            .max_tokens(1024u32)
            .build()
            .map_err(|e| LlmError::RequestBuild(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content)
    }
}

#[async_trait]
impl AiClient for LlmClient {
    async fn complete(&self, system: &str, prompt: &str, format: &str) -> AppResult<String> {
        let message = format!("{}\n\n{}", prompt, format);
        self.send_to_llm(&message, system).await
    }
}
