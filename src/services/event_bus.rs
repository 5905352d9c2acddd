//! 进度事件总线 - 业务能力层
//!
//! 有序、尽力而为的多播：订阅者按注册顺序依次收到每个事件，
//! 某个订阅者 panic 或接收端已关闭都不会影响其他订阅者。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// 进度事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    GroupStart {
        at: DateTime<Local>,
        group_id: u64,
        group_name: String,
    },
    #[serde(rename_all = "camelCase")]
    GroupEnd {
        at: DateTime<Local>,
        group_id: u64,
        group_name: String,
        done: usize,
        skipped: usize,
        failed: usize,
    },
    #[serde(rename_all = "camelCase")]
    GroupError {
        at: DateTime<Local>,
        group_id: u64,
        group_name: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    CourseStart {
        at: DateTime<Local>,
        lane: usize,
        activity_id: u64,
        activity_name: String,
    },
    #[serde(rename_all = "camelCase")]
    CourseDone {
        at: DateTime<Local>,
        lane: usize,
        activity_id: u64,
        activity_name: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    CourseSkip {
        at: DateTime<Local>,
        lane: usize,
        activity_id: u64,
        activity_name: String,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    CourseError {
        at: DateTime<Local>,
        lane: usize,
        activity_id: u64,
        activity_name: String,
        message: String,
    },
}

impl ProgressEvent {
    pub fn at(&self) -> DateTime<Local> {
        match self {
            ProgressEvent::GroupStart { at, .. }
            | ProgressEvent::GroupEnd { at, .. }
            | ProgressEvent::GroupError { at, .. }
            | ProgressEvent::CourseStart { at, .. }
            | ProgressEvent::CourseDone { at, .. }
            | ProgressEvent::CourseSkip { at, .. }
            | ProgressEvent::CourseError { at, .. } => *at,
        }
    }
}

type Callback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

enum Subscriber {
    Callback(Callback),
    Channel(mpsc::UnboundedSender<ProgressEvent>),
}

/// 进度事件总线，克隆后共享同一组订阅者
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册回调订阅者
    pub fn subscribe(&self, callback: impl Fn(&ProgressEvent) + Send + Sync + 'static) {
        self.push(Subscriber::Callback(Box::new(callback)));
    }

    /// 注册通道订阅者
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Subscriber::Channel(tx));
        rx
    }

    fn push(&self, subscriber: Subscriber) {
        match self.subscribers.write() {
            Ok(mut guard) => guard.push(subscriber),
            Err(poisoned) => poisoned.into_inner().push(subscriber),
        }
    }

    /// 投递事件
    pub fn emit(&self, event: ProgressEvent) {
        let guard = match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for subscriber in guard.iter() {
            match subscriber {
                Subscriber::Callback(callback) => {
                    if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                        warn!("进度订阅者处理事件时出错，已忽略");
                    }
                }
                Subscriber::Channel(tx) => {
                    let _ = tx.send(event.clone());
                }
            }
        }
    }

    pub fn group_start(&self, group_id: u64, group_name: &str) {
        self.emit(ProgressEvent::GroupStart {
            at: Local::now(),
            group_id,
            group_name: group_name.to_string(),
        });
    }

    pub fn group_end(
        &self,
        group_id: u64,
        group_name: &str,
        done: usize,
        skipped: usize,
        failed: usize,
    ) {
        self.emit(ProgressEvent::GroupEnd {
            at: Local::now(),
            group_id,
            group_name: group_name.to_string(),
            done,
            skipped,
            failed,
        });
    }

    pub fn group_error(&self, group_id: u64, group_name: &str, message: impl Into<String>) {
        self.emit(ProgressEvent::GroupError {
            at: Local::now(),
            group_id,
            group_name: group_name.to_string(),
            message: message.into(),
        });
    }

    pub fn course_start(&self, lane: usize, activity_id: u64, activity_name: &str) {
        self.emit(ProgressEvent::CourseStart {
            at: Local::now(),
            lane,
            activity_id,
            activity_name: activity_name.to_string(),
        });
    }

    pub fn course_done(
        &self,
        lane: usize,
        activity_id: u64,
        activity_name: &str,
        message: impl Into<String>,
    ) {
        self.emit(ProgressEvent::CourseDone {
            at: Local::now(),
            lane,
            activity_id,
            activity_name: activity_name.to_string(),
            message: message.into(),
        });
    }

    pub fn course_skip(
        &self,
        lane: usize,
        activity_id: u64,
        activity_name: &str,
        reason: impl Into<String>,
    ) {
        self.emit(ProgressEvent::CourseSkip {
            at: Local::now(),
            lane,
            activity_id,
            activity_name: activity_name.to_string(),
            reason: reason.into(),
        });
    }

    pub fn course_error(
        &self,
        lane: usize,
        activity_id: u64,
        activity_name: &str,
        message: impl Into<String>,
    ) {
        self.emit(ProgressEvent::CourseError {
            at: Local::now(),
            lane,
            activity_id,
            activity_name: activity_name.to_string(),
            message: message.into(),
        });
    }
}
