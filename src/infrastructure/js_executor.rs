//! JS 执行器 - 基础设施层
//!
//! 持有一个 page，只暴露"执行 JS"和"以页面登录态发请求"的能力

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::AppResult;

/// 页面内 fetch 的结果
///
/// `status` 为 0 表示请求没有发出去（网络错误等），此时 `body` 是错误描述。
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponse {
    pub status: u16,
    #[serde(default)]
    pub body: JsonValue,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// JS 执行器
///
/// 职责：
/// - 持有一个 Page 资源（每条通道一个）
/// - 暴露 eval() 能力
/// - 不认识课程 / 测验
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 在页面内发起 fetch，带上页面的 cookie
    ///
    /// # 参数
    /// - `method`: HTTP 方法
    /// - `url`: 绝对地址或相对当前页面的路径
    /// - `body`: JSON 请求体（可选）
    pub async fn fetch_json(
        &self,
        method: &str,
        url: &str,
        body: Option<&JsonValue>,
    ) -> AppResult<FetchResponse> {
        self.eval_as(fetch_script(method, url, body)?).await
    }
}

fn fetch_script(method: &str, url: &str, body: Option<&JsonValue>) -> AppResult<String> {
    let url_literal = serde_json::to_string(url)?;
    let method_literal = serde_json::to_string(method)?;
    let body_expr = match body {
        Some(body) => format!("JSON.stringify({})", serde_json::to_string(body)?),
        None => "undefined".to_string(),
    };

    Ok(format!(
        r#"
        (async () => {{
            try {{
                const res = await fetch({url}, {{
                    method: {method},
                    headers: {{
                        "Content-Type": "application/json",
                        "Accept": "application/json, text/plain, */*"
                    }},
                    credentials: "include",
                    body: {body}
                }});
                const text = await res.text();
                let body = null;
                if (text) {{
                    try {{ body = JSON.parse(text); }} catch (e) {{ body = text; }}
                }}
                return {{ status: res.status, body }};
            }} catch (err) {{
                return {{ status: 0, body: String(err) }};
            }}
        }})()
        "#,
        url = url_literal,
        method = method_literal,
        body = body_expr
    ))
}
