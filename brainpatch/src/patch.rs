//! 切块实体与切块提取。

use crate::center::CenterCoordinate;
use crate::error::{PatchError, Result};
use crate::geometry::{Geometry, PatchSlice, SliceBuilder};
use crate::pool::{run_indexed, CancelFlag, Failed};
use crate::volume::Volume;
use std::sync::Arc;
use tracing::debug;

/// 对某个体数据中一块区域的引用，不持有体素。
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Patch {
    pub slice: PatchSlice,
    /// 所属体数据在数据集体数据列表中的下标。
    pub image_id: usize,
    /// 仅在做过前景筛选时存在。
    pub center: Option<CenterCoordinate>,
}

impl Patch {
    #[inline]
    pub fn new(slice: PatchSlice, image_id: usize, center: Option<CenterCoordinate>) -> Self {
        Self {
            slice,
            image_id,
            center,
        }
    }
}

/// 枚举一个体数据上的全部切块。`keep_foreground`为真时只保留中心落在前景上的切块。
pub fn volume_patches(
    image: &Volume,
    label: &Volume,
    image_id: usize,
    geometry: Geometry,
    keep_foreground: bool,
) -> Result<Vec<Patch>> {
    if image.shape()[1..] != label.shape()[1..] {
        return Err(PatchError::ShapeMismatch(
            format!("image and label of volume {image_id}"),
            image.shape()[1..].to_vec(),
            label.shape()[1..].to_vec(),
        ));
    }
    let builder = SliceBuilder::from_dims(image.shape(), geometry)?;
    let patches: Vec<Patch> = if keep_foreground {
        builder
            .iter()
            .filter_map(|slice| {
                let center = CenterCoordinate::from_label(&slice.view(label))?;
                center
                    .is_foreground
                    .then(|| Patch::new(slice, image_id, Some(center)))
            })
            .collect()
    } else {
        builder
            .iter()
            .map(|slice| Patch::new(slice, image_id, None))
            .collect()
    };
    debug!(
        image_id,
        total = builder.len(),
        kept = patches.len(),
        "patches built"
    );
    Ok(patches)
}

pub(crate) fn extract_indexed(
    images: &Arc<Vec<Volume>>,
    labels: &Arc<Vec<Volume>>,
    geometry: Geometry,
    keep_foreground: bool,
    workers: Option<usize>,
    cancel: &CancelFlag,
) -> std::result::Result<Vec<Patch>, Failed> {
    if images.len() != labels.len() {
        return Err(Failed {
            index: images.len().min(labels.len()),
            error: PatchError::ShapeMismatch(
                "image and label volume lists".to_string(),
                vec![images.len()],
                vec![labels.len()],
            ),
        });
    }
    let (im, lb) = (Arc::clone(images), Arc::clone(labels));
    let per_volume = run_indexed(images.len(), workers, cancel, move |i| {
        volume_patches(&im[i], &lb[i], i, geometry, keep_foreground)
    })?;
    Ok(per_volume.into_iter().flatten().collect())
}

/// 对一组体数据提取切块，按体数据顺序拼接。
///
/// 各体数据之间互不依赖，可在多个线程上并行；结果与串行执行完全相同。
/// `workers`为`None`时使用全部逻辑CPU。
pub fn extract_patches(
    images: &Arc<Vec<Volume>>,
    labels: &Arc<Vec<Volume>>,
    geometry: Geometry,
    keep_foreground: bool,
    workers: Option<usize>,
    cancel: &CancelFlag,
) -> Result<Vec<Patch>> {
    Ok(extract_indexed(
        images,
        labels,
        geometry,
        keep_foreground,
        workers,
        cancel,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use pretty_assertions::assert_eq;

    fn sphere(side: usize, radius: f32) -> Volume {
        let c = side as f32 / 2.0;
        Array4::from_shape_fn((1, side, side, side), |(_, z, y, x)| {
            let d = ((z as f32 - c).powi(2) + (y as f32 - c).powi(2) + (x as f32 - c).powi(2)).sqrt();
            if d <= radius {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn reconstruction_keeps_every_position() {
        let label = Array4::<f32>::zeros((1, 64, 64, 64));
        let image = label.clone();
        let g = Geometry::new([1, 32, 32, 32], [1, 16, 16, 16]).unwrap();
        let all = volume_patches(&image, &label, 0, g, false).unwrap();
        assert_eq!(all.len(), 27);
        let fg = volume_patches(&image, &label, 0, g, true).unwrap();
        assert!(fg.is_empty());
    }

    #[test]
    fn foreground_is_a_subset() {
        let label = sphere(40, 6.0);
        let image = label.clone();
        let g = Geometry::training();
        let all = volume_patches(&image, &label, 3, g, false).unwrap();
        let fg = volume_patches(&image, &label, 3, g, true).unwrap();
        assert!(!fg.is_empty());
        assert!(fg.len() <= all.len());
        assert!(fg.iter().all(|p| p.image_id == 3 && p.center.map_or(false, |c| c.is_foreground)));
    }

    #[test]
    fn parallel_matches_serial() {
        let images = Arc::new(vec![sphere(40, 5.0), sphere(36, 8.0), sphere(48, 10.0)]);
        let labels = Arc::clone(&images);
        let cancel = CancelFlag::default();
        let serial = extract_patches(&images, &labels, Geometry::training(), true, Some(1), &cancel).unwrap();
        let parallel = extract_patches(&images, &labels, Geometry::training(), true, Some(3), &cancel).unwrap();
        assert_eq!(serial, parallel);
        let ids: Vec<usize> = serial.iter().map(|p| p.image_id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn mismatched_label_is_an_error() {
        let image = Array4::<f32>::zeros((1, 40, 40, 40));
        let label = Array4::<f32>::zeros((1, 40, 40, 36));
        assert!(matches!(
            volume_patches(&image, &label, 0, Geometry::training(), true),
            Err(PatchError::ShapeMismatch(..))
        ));
    }

    #[test]
    fn multimodal_patches_span_all_channels() {
        let image = Array4::<f32>::zeros((2, 40, 40, 40));
        let label = sphere(40, 6.0);
        let fg = volume_patches(&image, &label, 0, Geometry::training(), true).unwrap();
        assert!(fg.iter().all(|p| p.slice.view(&image).shape() == [2, 32, 32, 32]));
    }
}
