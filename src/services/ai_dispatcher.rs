//! AI 批量调度 - 业务能力层
//!
//! 所有通道共享一个调度器。每个"调用单元"（一批或一次直接请求）都要在
//! 公平的异步互斥锁上排队：等前面的单元全部结束，再按速率等待一个节拍，
//! 才能发出自己的请求。一批之内的请求并发执行。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::api::AiClient;
use crate::utils::index_to_label;

/// 自由文本题在推理失败时使用的占位答案
pub const FALLBACK_TEXT: &str = "略";

const SYSTEM_PROMPT: &str = "你是一名认真负责的课程助教，熟悉各学科的基础知识。\
请根据题目内容给出最可能正确的答案，严格按照要求的格式输出，不要解释。";

/// 期望的答案格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerFormat {
    SingleChoice,
    MultiChoice,
    FreeText,
}

impl AnswerFormat {
    /// 附在提示词后面的格式要求
    pub fn directive(self) -> &'static str {
        match self {
            AnswerFormat::SingleChoice => "只输出一个正确选项的字母，例如：B",
            AnswerFormat::MultiChoice => "输出所有正确选项的字母，不要分隔符，例如：ACD",
            AnswerFormat::FreeText => "直接输出答案正文，不要复述题目，不超过200字",
        }
    }
}

/// 解题器交给调度器的一项请求
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequestItem {
    /// 题目 id
    pub id: u64,
    pub format: AnswerFormat,
    /// 已渲染好的题干与选项
    pub prompt: String,
    /// 提示词中列出的选项数
    pub option_count: usize,
}

impl BatchRequestItem {
    /// 推理失败时的确定性替代答案
    pub fn fallback(&self) -> String {
        match self.format {
            AnswerFormat::SingleChoice | AnswerFormat::MultiChoice if self.option_count > 0 => {
                index_to_label(0)
            }
            _ => FALLBACK_TEXT.to_string(),
        }
    }
}

/// 题目 id → 模型原始输出
pub type BatchResults = HashMap<u64, String>;

/// 限速的 AI 批量调度器
pub struct AiDispatcher {
    client: Arc<dyn AiClient>,
    batch_size: usize,
    interval: Duration,
    /// 下一个调用单元最早可以开始的时间
    next_slot: Mutex<Option<Instant>>,
}

impl AiDispatcher {
    /// # 参数
    /// - `client`: AI 推理客户端
    /// - `requests_per_second`: 每秒请求数，同时也是每批的大小
    pub fn new(client: Arc<dyn AiClient>, requests_per_second: usize) -> Self {
        Self {
            client,
            batch_size: requests_per_second.max(1),
            interval: Duration::from_secs(1),
            next_slot: Mutex::new(None),
        }
    }

    /// 修改批次之间的间隔（默认 1 秒）
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 批量请求
    ///
    /// 按 `batch_size` 切批，批内并发，批间等待固定间隔（最后一批之后不等）。
    /// 单项失败会被替换为确定性答案，不影响整批。
    pub async fn batch_request(&self, items: &[BatchRequestItem]) -> BatchResults {
        let mut results = BatchResults::with_capacity(items.len());
        if items.is_empty() {
            return results;
        }

        let total_batches = items.len().div_ceil(self.batch_size);
        info!(
            "🤖 AI 批量请求: {} 项，分 {} 批，每批 {} 项",
            items.len(),
            total_batches,
            self.batch_size
        );

        for (batch_index, chunk) in items.chunks(self.batch_size).enumerate() {
            let answers = self
                .in_slot(chunk.len(), || join_all(chunk.iter().map(|item| self.call(item))))
                .await;
            debug!("AI 第 {}/{} 批完成", batch_index + 1, total_batches);

            for (item, answer) in chunk.iter().zip(answers) {
                results.insert(item.id, answer);
            }
        }

        results
    }

    /// 单次直接请求，同样经过全局队列
    pub async fn request(&self, item: &BatchRequestItem) -> String {
        self.in_slot(1, || self.call(item)).await
    }

    /// 在全局队列中占一个位置执行 `work`
    async fn in_slot<F, Fut, T>(&self, units: usize, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(ready_at) = *next_slot {
            sleep_until(ready_at).await;
        }

        let output = work().await;

        let pacing = self.interval.mul_f64(units as f64 / self.batch_size as f64);
        *next_slot = Some(Instant::now() + pacing);
        output
    }

    async fn call(&self, item: &BatchRequestItem) -> String {
        match self
            .client
            .complete(SYSTEM_PROMPT, &item.prompt, item.format.directive())
            .await
        {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => {
                warn!("题目 {} 的 AI 回答为空，使用默认答案", item.id);
                item.fallback()
            }
            Err(e) => {
                warn!("题目 {} 的 AI 请求失败，使用默认答案: {}", item.id, e);
                item.fallback()
            }
        }
    }
}
