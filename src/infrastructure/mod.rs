//! 基础设施层
//!
//! 只和浏览器页面打交道，不包含任何业务概念

pub mod js_executor;

pub use js_executor::{FetchResponse, JsExecutor};
