//! # Dispatcher
//!
//! 帧分发模块。
//!
//! 负责：
//! - 汇聚所有上游连接的 `Frame`
//! - Fan-out 到所有订阅者，每次写入有独立的超时
//! - 驱逐写入失败或超时的订阅者，不阻塞其他订阅者
//! - 监听端口并接收新的订阅者连接

pub mod acceptor;
pub mod dispatcher;
pub mod error;
pub mod subscriber;

pub use acceptor::{AcceptorConfig, InboundAcceptor};
pub use contracts::{Frame, FrameSink};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig, DispatcherHandle, DispatcherStats};
pub use error::DispatcherError;
pub use subscriber::TcpSubscriber;
