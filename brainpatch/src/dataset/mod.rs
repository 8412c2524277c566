//! 可按下标访问的数据集抽象。
//!
//! 下游的批量加载器只依赖[`Dataset`]：`len()`与`get(index)`。`get`只读访问已构建好的数据，
//! 可在多个线程中同时调用。

mod augment;
mod concat;
mod file;
mod patch;
mod transform;

pub use augment::{Augmentation, IntensityJitter, RandomFlip};
pub use concat::ConcatDataset;
pub use file::FileDataset;
pub use patch::PatchDataset;
pub use transform::{Compose, Standardize, Transform};

use crate::error::{PatchError, Result};
use ndarray::Array4;

/// 数据集返回的一个样本。
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// 输入，形状`(channel, z, y, x)`。
    pub x: Array4<f32>,
    /// 标签。
    pub y: Option<Array4<f32>>,
    /// 增强后的输入。数据集返回的样本中总是存在；没有任何增强时等于`x`。
    pub augmented_x: Option<Array4<f32>>,
    /// 来源数据集编号，多来源训练时用于区分样本来源。
    pub dataset_id: usize,
    pub is_labeled: bool,
}

impl Sample {
    #[inline]
    pub fn new(x: Array4<f32>, y: Option<Array4<f32>>, dataset_id: usize) -> Self {
        let is_labeled = y.is_some();
        Self {
            x,
            y,
            augmented_x: None,
            dataset_id,
            is_labeled,
        }
    }
}

/// 有长度、可按下标取样的数据集。
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取第`index`个样本。`index`不在`[0, len)`内时返回`IndexOutOfRange`。
    fn get(&self, index: usize) -> Result<Sample>;
}

#[inline]
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(PatchError::IndexOutOfRange(index, len))
    }
}

/// 依次执行变换，再处理增强输入。
///
/// 有增强策略时，对（可能来自预先增强体数据的）`augmented_x`或`x`做增强；
/// 否则`augmented_x`缺省为`x`。
pub(crate) fn finish_sample(
    mut sample: Sample,
    transforms: &Compose,
    augmentation: Option<&dyn Augmentation>,
) -> Sample {
    sample = transforms.apply(sample);
    let base = sample.augmented_x.take();
    sample.augmented_x = Some(match (augmentation, base) {
        (Some(a), Some(b)) => a.augment(&b),
        (Some(a), None) => a.augment(&sample.x),
        (None, Some(b)) => b,
        (None, None) => sample.x.clone(),
    });
    sample
}
