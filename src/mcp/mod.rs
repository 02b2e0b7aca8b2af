//! Model Context Protocol surface: the wire envelope (`types`), the C9 tool
//! dispatcher (`tools`), the C8 session manager (`session`), the HTTP
//! transport (`http`), and the newline-delimited stdio transport (`line`).
//! Both transports share `http::dispatch` so request handling never forks
//! into two copies.

pub mod http;
pub mod line;
pub mod session;
pub mod tools;
pub mod types;

pub use session::SessionManager;
pub use tools::ToolRegistry;
pub use types::*;
