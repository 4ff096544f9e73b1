//! Impls - ドライバの実装（デモ用・テスト用）
//!
//! # 含まれる実装
//! - **TickerDriver**: 一定間隔で進むだけのドライバ。CLI のデモと結合テストで使う
//!
//! 本物のジョブ（mirror, stream, backup など）はこのクレートの外で `JobDriver` を実装する。

pub mod ticker;

pub use self::ticker::{TickerConfig, TickerDriver};
