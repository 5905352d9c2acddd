//! 浏览器连接
//!
//! 连接到用户已登录的 Chrome（远程调试端口），为主流程和每条通道提供页面。

pub mod connection;
pub mod lanes;

pub use connection::{connect_to_browser_and_page, open_page};
pub use lanes::BrowserLaneFactory;
