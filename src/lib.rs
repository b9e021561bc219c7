//! catalog-match
//!
//! 仕入先のエクスポート表をカタログ表と照合する。直接一致ルールで決まらない行は
//! 補完サービスに意味照合を依頼し、結果をキャッシュして再実行時の呼び出しを省く。

pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod matcher;
pub mod registry;
