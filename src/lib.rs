pub mod builder;
pub mod cleanup;
pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod index;
pub mod language;
pub mod package;
pub mod runtime;
pub mod scanner;
pub mod storage;
