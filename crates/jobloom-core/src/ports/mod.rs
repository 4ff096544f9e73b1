//! Ports - 抽象化レイヤー
//!
//! エンジンの外側にいる協力者とのインターフェースを定義します。
//!
//! - **JobDriver**: ジョブの種類ごとの実装（mirror, stream, backup など）
//! - **JobTransaction**: ジョブをまとめて完了させるグループ

pub mod driver;
pub mod transaction;

// 主要な trait を再エクスポート
pub use self::driver::JobDriver;
pub use self::transaction::JobTransaction;
