//! 数据集强度统计。

use crate::dataset::{Dataset, PatchDataset, Standardize};
use crate::error::{PatchError, Result};
use crate::patch::Patch;
use crate::volume::Volume;
use ndarray::ArrayView4;
use tracing::debug;

/// 切块强度的均值与标准差。
///
/// 均值为各切块均值的平均；标准差为各切块相对该均值的均方偏差再取平均后开方。
/// 所有切块尺寸相同时，二者与把全部切块体素合在一起计算的结果一致。
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PatchStatistics {
    pub mean: f64,
    pub std: f64,
    pub patches: usize,
}

#[inline]
fn mean_of(view: &ArrayView4<f32>) -> f64 {
    let n = view.len().max(1) as f64;
    view.iter().map(|&v| v as f64).sum::<f64>() / n
}

#[inline]
fn mean_sq_dev(view: &ArrayView4<f32>, mean: f64) -> f64 {
    let n = view.len().max(1) as f64;
    view.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n
}

impl PatchStatistics {
    /// 在一组体数据的指定切块上统计。没有切块时返回错误。
    pub fn from_patches(images: &[Volume], patches: &[Patch]) -> Result<Self> {
        if patches.is_empty() {
            return Err(PatchError::InsufficientSubjects("patches".to_string(), 1, 0));
        }
        let mut views = Vec::with_capacity(patches.len());
        for p in patches {
            let image = images
                .get(p.image_id)
                .ok_or(PatchError::IndexOutOfRange(p.image_id, images.len()))?;
            views.push(p.slice.checked_view(image)?);
        }
        Ok(Self::from_views(&views))
    }

    /// 直接使用切块数据集持有的体数据，不复制切块。
    pub fn of_patch_dataset(dataset: &PatchDataset) -> Result<Self> {
        Self::from_patches(dataset.images(), dataset.patches())
    }

    /// 对任意数据集逐个取样统计输入`x`（会执行数据集上的变换）。
    pub fn of_dataset(dataset: &dyn Dataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(PatchError::InsufficientSubjects("samples".to_string(), 1, 0));
        }
        let mut xs = Vec::with_capacity(dataset.len());
        for i in 0..dataset.len() {
            xs.push(dataset.get(i)?.x);
        }
        let views: Vec<ArrayView4<f32>> = xs.iter().map(|x| x.view()).collect();
        Ok(Self::from_views(&views))
    }

    fn from_views(views: &[ArrayView4<f32>]) -> Self {
        let n = views.len() as f64;
        let mean = views.iter().map(mean_of).sum::<f64>() / n;
        let var = views.iter().map(|v| mean_sq_dev(v, mean)).sum::<f64>() / n;
        debug!(patches = views.len(), mean, var, "intensity statistics");
        Self {
            mean,
            std: var.sqrt(),
            patches: views.len(),
        }
    }

    #[inline]
    pub fn to_standardize(&self) -> Standardize {
        Standardize::new(self.mean as f32, self.std as f32)
    }
}
