use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 连接到用户已登录的浏览器，返回目标页面
///
/// 有标题匹配 `target_title` 的页面时直接复用，否则新建页面并导航到 `target_url`。
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: Option<&str>,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);
    debug!("目标 URL: {:?}, 目标标题: {:?}", target_url, target_title);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    if let Some(title) = target_title {
        for p in pages.iter() {
            if let Ok(Some(page_title)) = p.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 找到目标页面: {}", page_title);
                    return Ok((browser, p.clone()));
                }
            }
        }
        debug!("未找到标题包含 '{}' 的页面，将创建新页面", title);
    }

    let page = open_page(&browser, target_url).await?;
    Ok((browser, page))
}

/// 新建一个页面，可选导航到指定地址
pub async fn open_page(browser: &Browser, url: Option<&str>) -> Result<Page> {
    let page = browser
        .new_page("about:blank")
        .await
        .context("创建新页面失败")?;

    if let Some(url) = url {
        page.goto(url)
            .await
            .with_context(|| format!("导航到 {} 失败", url))?;
        debug!("已导航到: {}", url);
    }
    Ok(page)
}
