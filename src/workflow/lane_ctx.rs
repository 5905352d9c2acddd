//! 通道上下文
//!
//! 封装"我是哪条通道、通过什么访问平台"这一信息

use std::fmt::Display;
use std::sync::Arc;

use crate::api::LmsApi;

/// 通道上下文
///
/// 每条通道独占一份，处理器通过它访问平台接口
#[derive(Clone)]
pub struct LaneContext {
    /// 通道编号（从 1 开始，仅用于日志和事件）
    pub lane_id: usize,

    /// 该通道自己的平台接口
    pub api: Arc<dyn LmsApi>,
}

impl LaneContext {
    /// 创建新的通道上下文
    pub fn new(lane_id: usize, api: Arc<dyn LmsApi>) -> Self {
        Self { lane_id, api }
    }
}

impl Display for LaneContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[通道 {}]", self.lane_id)
    }
}
