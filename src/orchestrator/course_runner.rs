//! 课程编排器 - 编排层
//!
//! 一门课程的所有条目放进共享的 FIFO 队列，由若干条长期存在的通道并发拉取。
//! 每条通道一次只处理一个条目，条目之间互不影响；
//! 一门课程出错也不会中断后面的课程。

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::api::{CourseDirectory, LmsApi};
use crate::config::OrchestratorSettings;
use crate::error::AppResult;
use crate::models::{CourseActivity, CourseGroup};
use crate::orchestrator::group_select::{select_groups, GroupPolicy};
use crate::services::EventBus;
use crate::workflow::{Gate, LaneContext, ProcessResult, ProcessorRegistry};

/// 为每条通道创建独立的平台会话（浏览器中即一个新页面）
#[async_trait]
pub trait LaneFactory: Send + Sync {
    async fn create_lane(&self, lane_id: usize) -> AppResult<Arc<dyn LmsApi>>;
}

/// 一门课程的处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupReport {
    pub total: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl GroupReport {
    fn merge(&mut self, other: GroupReport) {
        self.total += other.total;
        self.done += other.done;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// 整次运行的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// 选中的课程数
    pub groups: usize,
    /// 出错中断的课程数
    pub group_errors: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 单个条目的最终结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Done,
    Skipped,
    Failed,
}

pub struct CourseRunner {
    registry: Arc<ProcessorRegistry>,
    directory: Arc<dyn CourseDirectory>,
    lanes: Arc<dyn LaneFactory>,
    bus: EventBus,
    settings: OrchestratorSettings,
}

impl CourseRunner {
    pub fn new(
        registry: Arc<ProcessorRegistry>,
        directory: Arc<dyn CourseDirectory>,
        lanes: Arc<dyn LaneFactory>,
        bus: EventBus,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            directory,
            lanes,
            bus,
            settings,
        }
    }

    /// 列出课程，按策略选择后逐门处理
    pub async fn run(&self, policy: &GroupPolicy) -> AppResult<RunReport> {
        let candidates = self.directory.list_courses().await?;
        info!("📚 共 {} 门课程", candidates.len());

        let groups = select_groups(candidates, policy);
        info!("🎯 本次处理 {} 门课程 (策略: {:?})", groups.len(), policy);

        let mut report = RunReport {
            groups: groups.len(),
            ..Default::default()
        };
        for group in &groups {
            self.bus.group_start(group.id, &group.name);
            match self.run_group(group).await {
                Ok(result) => {
                    info!(
                        "[课程 {}] ✓ 完成 {}，跳过 {}，失败 {}（共 {}）",
                        group.name, result.done, result.skipped, result.failed, result.total
                    );
                    self.bus.group_end(
                        group.id,
                        &group.name,
                        result.done,
                        result.skipped,
                        result.failed,
                    );
                    report.done += result.done;
                    report.skipped += result.skipped;
                    report.failed += result.failed;
                }
                Err(e) => {
                    error!("[课程 {}] ❌ 处理中断: {}", group.name, e);
                    self.bus.group_error(group.id, &group.name, e.to_string());
                    report.group_errors += 1;
                }
            }
        }
        Ok(report)
    }

    /// 处理一门课程
    pub async fn run_group(&self, group: &CourseGroup) -> AppResult<GroupReport> {
        let activities = self.directory.unfinished_activities(group.id).await?;
        let fetched = activities.len();
        let items: VecDeque<CourseActivity> = activities
            .into_iter()
            .filter(|a| self.registry.supports(a.activity_type))
            .collect();

        info!(
            "[课程 {}] 📋 未完成条目 {} 个，可处理 {} 个",
            group.name,
            fetched,
            items.len()
        );
        if items.is_empty() {
            return Ok(GroupReport::default());
        }

        let lane_count = self.settings.lane_count(items.len());
        let lanes = self.open_lanes(lane_count).await?;
        info!("[课程 {}] 🚀 启动 {} 条通道", group.name, lanes.len());

        let queue = Arc::new(Mutex::new(items));
        let mut handles = Vec::with_capacity(lanes.len());
        for lane in lanes {
            let queue = queue.clone();
            let registry = self.registry.clone();
            let bus = self.bus.clone();
            let item_attempts = self.settings.item_attempts;
            handles.push(tokio::spawn(async move {
                let report = drain_queue(&lane, &queue, &registry, &bus, item_attempts).await;
                if let Err(e) = lane.api.close().await {
                    warn!("{} 关闭通道失败: {}", lane, e);
                }
                report
            }));
        }

        let mut report = GroupReport::default();
        for handle in handles {
            match handle.await {
                Ok(lane_report) => report.merge(lane_report),
                Err(e) => error!("[课程 {}] 通道任务异常退出: {}", group.name, e),
            }
        }
        Ok(report)
    }

    /// 创建通道；部分失败时用已创建的通道继续，全部失败才算课程出错
    async fn open_lanes(&self, count: usize) -> AppResult<Vec<LaneContext>> {
        let mut lanes = Vec::with_capacity(count);
        let mut last_error = None;
        for lane_id in 1..=count {
            match self.lanes.create_lane(lane_id).await {
                Ok(api) => lanes.push(LaneContext::new(lane_id, api)),
                Err(e) => {
                    warn!("[通道 {}] ⚠️ 创建失败: {}", lane_id, e);
                    last_error = Some(e);
                }
            }
        }
        match (lanes.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(lanes),
        }
    }
}

/// 一条通道不断从队列取条目，直到队列为空
async fn drain_queue(
    lane: &LaneContext,
    queue: &Mutex<VecDeque<CourseActivity>>,
    registry: &ProcessorRegistry,
    bus: &EventBus,
    item_attempts: u32,
) -> GroupReport {
    let mut report = GroupReport::default();
    loop {
        let next = queue.lock().await.pop_front();
        let Some(activity) = next else {
            break;
        };

        report.total += 1;
        let outcome = AssertUnwindSafe(run_item(lane, &activity, registry, bus, item_attempts))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = format!("处理器崩溃: {}", panic_message(payload.as_ref()));
                error!("{} ❌ {}: {}", lane, activity.activity_name, message);
                bus.course_error(
                    lane.lane_id,
                    activity.activity_id,
                    &activity.activity_name,
                    message,
                );
                ItemOutcome::Failed
            });
        match outcome {
            ItemOutcome::Done => report.done += 1,
            ItemOutcome::Skipped => report.skipped += 1,
            ItemOutcome::Failed => report.failed += 1,
        }
    }
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知错误".to_string()
    }
}

/// 处理单个条目，非致命错误时重载通道后重试
async fn run_item(
    lane: &LaneContext,
    activity: &CourseActivity,
    registry: &ProcessorRegistry,
    bus: &EventBus,
    item_attempts: u32,
) -> ItemOutcome {
    let name = activity.activity_name.as_str();
    bus.course_start(lane.lane_id, activity.activity_id, name);
    info!("{} ▶ {} [{}]", lane, name, activity.activity_type.name());

    let attempts = item_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(mut processor) = registry.create(activity.activity_type) else {
            bus.course_skip(lane.lane_id, activity.activity_id, name, "没有对应的处理器");
            return ItemOutcome::Skipped;
        };

        let result = match processor.condition(lane, activity).await {
            Ok(Gate::Skip(reason)) => Ok(ProcessResult::Skipped(reason)),
            Ok(Gate::Proceed) => processor.exec(lane, activity).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(ProcessResult::Success(message)) => {
                info!("{} ✅ {}: {}", lane, name, message);
                bus.course_done(lane.lane_id, activity.activity_id, name, message);
                return ItemOutcome::Done;
            }
            Ok(ProcessResult::Skipped(reason)) => {
                info!("{} ⏭ {}: {}", lane, name, reason);
                bus.course_skip(lane.lane_id, activity.activity_id, name, reason);
                return ItemOutcome::Skipped;
            }
            Err(e) if e.is_fatal() || attempt == attempts => {
                error!("{} ❌ {} (第 {}/{} 次): {}", lane, name, attempt, attempts, e);
                bus.course_error(lane.lane_id, activity.activity_id, name, e.to_string());
                return ItemOutcome::Failed;
            }
            Err(e) => {
                warn!(
                    "{} ⚠️ {} 第 {}/{} 次执行失败，重载后重试: {}",
                    lane, name, attempt, attempts, e
                );
                if let Err(reload_err) = lane.api.reload().await {
                    warn!("{} 重载失败: {}", lane, reload_err);
                }
            }
        }
    }
    ItemOutcome::Failed
}
