//! 通道工厂：每条通道在同一个浏览器里开一个新页面

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::Browser;
use tracing::info;

use crate::api::LmsApi;
use crate::browser::connection::open_page;
use crate::clients::PageLmsClient;
use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::JsExecutor;
use crate::orchestrator::LaneFactory;

pub struct BrowserLaneFactory {
    browser: Browser,
    home_url: String,
}

impl BrowserLaneFactory {
    pub fn new(browser: Browser, home_url: impl Into<String>) -> Self {
        Self {
            browser,
            home_url: home_url.into(),
        }
    }
}

#[async_trait]
impl LaneFactory for BrowserLaneFactory {
    async fn create_lane(&self, lane_id: usize) -> AppResult<Arc<dyn LmsApi>> {
        let page = open_page(&self.browser, Some(self.home_url.as_str()))
            .await
            .map_err(|e| {
                AppError::Browser(BrowserError::PageCreationFailed {
                    source: e.into(),
                })
            })?;
        info!("[通道 {}] 🌐 页面已就绪", lane_id);

        let client = PageLmsClient::new(JsExecutor::new(page), self.home_url.clone());
        Ok(Arc::new(client))
    }
}
