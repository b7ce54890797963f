//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **TurnLoop**: タスク実行ループ（pass ごとに各 task へ 1 turn）
//! - **Task**: computation と状態機械（start → resume → complete）
//! - **Computation**: 手動で poll する中断可能な計算
//! - **TaskErrorInterceptor**: turn 中の panic を strategy に渡す
//! - **Registries**: results / errors / reports

pub mod computation;
pub mod config;
pub mod interceptor;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod task;

// 主要な型を再エクスポート
pub use self::computation::{BoxError, Computation, ComputationError, Suspend, TaskOutput, suspend};
pub use self::config::LoopConfig;
pub use self::interceptor::{TaskErrorInterceptor, hook_installed};
pub use self::queue::SlotKey;
pub use self::registry::{ErrorRegistry, ReportRegistry, ResultRegistry};
pub use self::scheduler::{TurnLoop, TurnLoopBuilder};
pub use self::status::LoopStatus;
pub use self::task::Task;
