//! Infrastructure 層
//!
//! Repository 実装と、HTTP / WebSocket の入出力 DTO を提供します。

pub mod dto;
pub mod repository;
