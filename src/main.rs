use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use course_runner::browser::{self, BrowserLaneFactory};
use course_runner::clients::{LlmClient, PageLmsClient};
use course_runner::infrastructure::JsExecutor;
use course_runner::utils::logging;
use course_runner::{
    AiDispatcher, Config, CourseRunner, EventBus, GroupPolicy, ProcessorDeps, ProcessorRegistry,
};

/// 未指定时读取的配置文件，不存在则只用环境变量
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path).context("加载配置失败")?;

    logging::init(config.verbose_logging);
    logging::init_log_file(&config.output_log_file)?;
    logging::log_startup(config.concurrency, config.ai_requests_per_second);

    let bus = EventBus::new();
    logging::attach_event_log(&bus, &config.output_log_file);

    let (browser, page) = browser::connect_to_browser_and_page(
        config.browser_debug_port,
        Some(&config.target_url),
        config.target_page_title.as_deref(),
    )
    .await
    .context("连接浏览器失败")?;

    let directory = Arc::new(PageLmsClient::new(
        JsExecutor::new(page),
        config.target_url.clone(),
    ));
    let ai = Arc::new(AiDispatcher::new(
        Arc::new(LlmClient::new(&config)),
        config.ai_requests_per_second,
    ));
    let registry = Arc::new(ProcessorRegistry::standard(ProcessorDeps {
        ai,
        exam: config.exam_settings(),
    }));
    let lanes = Arc::new(BrowserLaneFactory::new(browser, config.target_url.clone()));

    let runner = CourseRunner::new(
        registry,
        directory,
        lanes,
        bus,
        config.orchestrator_settings(),
    );

    let policy = GroupPolicy::from_config(&config);
    info!("🎯 课程选择策略: {:?}", policy);
    let report = runner.run(&policy).await?;

    logging::print_final_stats(
        report.groups,
        report.done,
        report.skipped,
        report.failed,
        &config.output_log_file,
    );
    Ok(())
}
