//! ### English
//! Error taxonomy for the streaming harness.
//!
//! Every variant is fatal for the harness; the split only tells the reader where the failure
//! came from (setup, graphics backend at runtime, or a broken producer/consumer protocol).
//!
//! ### 中文
//! 流式测试工具的错误分类。
//!
//! 所有错误对本工具而言都是致命的；分类仅用于说明失败来源（初始化、运行期图形后端、
//! 或生产者/消费者协议被破坏）。

use thiserror::Error;

/// ### English
/// Harness error. `Clone` so the ring can hand a producer failure to the consumer more than once.
///
/// ### 中文
/// 工具错误类型。实现 `Clone`，以便环形缓冲可多次将生产者失败转交给消费者。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// ### English
    /// Window/context/resource creation failed.
    ///
    /// ### 中文
    /// window/上下文/资源创建失败。
    #[error("setup failed: {0}")]
    Setup(String),
    /// ### English
    /// The graphics backend reported an error while streaming.
    ///
    /// ### 中文
    /// 图形后端在流式运行期间报告错误。
    #[error("graphics backend error: {0}")]
    Backend(String),
    /// ### English
    /// A producer/consumer protocol invariant was violated (programming bug).
    ///
    /// ### 中文
    /// 生产者/消费者协议不变量被破坏（属于编程错误）。
    #[error("protocol invariant violated: {0}")]
    Invariant(String),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

impl HarnessError {
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

/// ### English
/// Reports `err` once and terminates the process with status 1.
///
/// Goes through `log` when a logger is installed, otherwise straight to stderr (a C embedder
/// usually has no Rust logger).
///
/// ### 中文
/// 报告一次 `err` 后以状态码 1 终止进程。
///
/// 若已安装 logger 则通过 `log` 输出，否则直接写 stderr（C 宿主通常没有 Rust logger）。
pub fn fatal(err: &HarnessError) -> ! {
    if log::log_enabled!(log::Level::Error) {
        log::error!("fatal: {err}");
    } else {
        eprintln!("fatal: {err}");
    }
    std::process::exit(1)
}
