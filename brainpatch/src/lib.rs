//! 脑部MRI三维切块数据集的构建。
//!
//! 从清单文件读取受试者、按受试者随机划分训练/验证/测试/重建组、读取并填充体数据、
//! 按固定尺寸与步长切块并筛选前景切块，最后得到可按下标取样的数据集。

pub mod center;
pub mod config;
pub mod dataset;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod manifest;
pub mod natsort;
pub mod patch;
mod pool;
pub mod prelude;
pub mod report;
pub mod split;
pub mod stats;
pub mod timer;
pub mod volume;

pub use error::{PatchError, Result};
pub use pool::CancelFlag;
