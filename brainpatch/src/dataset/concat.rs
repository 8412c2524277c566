use super::{Dataset, Sample};
use crate::error::{PatchError, Result};
use std::sync::Arc;

/// 首尾相接的多个数据集，常用于把不同来源（不同`dataset_id`）的数据合并训练。
pub struct ConcatDataset {
    datasets: Vec<Arc<dyn Dataset>>,
    cumulative: Vec<usize>,
}

impl ConcatDataset {
    pub fn new(datasets: Vec<Arc<dyn Dataset>>) -> Self {
        let cumulative = datasets
            .iter()
            .scan(0, |total, d| {
                *total += d.len();
                Some(*total)
            })
            .collect();
        Self {
            datasets,
            cumulative,
        }
    }

    /// 全局下标 -> (数据集下标, 局部下标)。
    fn locate(&self, index: usize) -> Option<(usize, usize)> {
        let which = self.cumulative.partition_point(|&c| c <= index);
        if which >= self.datasets.len() {
            return None;
        }
        let offset = if which == 0 { 0 } else { self.cumulative[which - 1] };
        Some((which, index - offset))
    }
}

impl Dataset for ConcatDataset {
    #[inline]
    fn len(&self) -> usize {
        self.cumulative.last().copied().unwrap_or(0)
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let (which, local) = self
            .locate(index)
            .ok_or(PatchError::IndexOutOfRange(index, self.len()))?;
        self.datasets[which].get(local)
    }
}
