#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod blueprint;
mod error;
mod executor;

pub mod client;
pub mod config;
pub mod reddit;
pub mod stages;
pub mod stopwords;
pub mod target;
pub mod text;

pub use crate::blueprint::{Blueprint, Handle, Pipeline, TaskContext, TaskResult};
pub use crate::error::{ClientError, ConfigError, PipelineError};
pub use crate::executor::{Outcome, Resolution};
pub use crate::target::{FileTarget, MemoryTarget, Target, TargetWriter};
