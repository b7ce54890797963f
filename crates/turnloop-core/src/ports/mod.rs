//! Ports - 抽象化レイヤー
//!
//! 差し替え可能な境界（clock, error handling strategy）を定義します。

pub mod clock;
pub mod strategy;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::strategy::ErrorHandlingStrategy;
