//! Upcycle AI
//!
//! 廃材の写真からアップサイクル企画を提案し、保存・評価・画像生成・ジャーナルを管理する。

pub mod chat;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod gemini;
pub mod provider;
pub mod scanner;
pub mod session;
pub mod storage;
pub mod store;

pub use error::{ErrorKind, Result, UpcycleError};
pub use store::ProjectStore;
