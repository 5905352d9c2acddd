/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::services::event_bus::{EventBus, ProgressEvent};

/// 初始化 tracing 订阅者
///
/// 优先使用 `RUST_LOG`，否则根据 `verbose` 选择 debug / info 级别。
/// 重复调用是安全的。
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n课程处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 把进度事件以 JSON 行的形式追加到日志文件
pub fn attach_event_log(bus: &EventBus, log_file_path: &str) {
    let path = log_file_path.to_string();
    bus.subscribe(move |event: &ProgressEvent| {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("事件序列化失败: {}", e);
                return;
            }
        };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = written {
            warn!("写入日志文件失败 ({}): {}", path, e);
        }
    });
}

/// 记录程序启动信息
pub fn log_startup(concurrency: usize, ai_rps: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 多通道课程处理模式");
    if concurrency == 0 {
        info!("📊 并发通道: 自动");
    } else {
        info!("📊 并发通道: {}", concurrency);
    }
    info!("🤖 AI 请求速率: {}/秒", ai_rps);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(
    groups: usize,
    done: usize,
    skipped: usize,
    failed: usize,
    log_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📚 课程数: {}", groups);
    info!("✅ 完成: {}", done);
    info!("⏭️ 跳过: {}", skipped);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
