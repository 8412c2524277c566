use super::{check_index, finish_sample, Augmentation, Compose, Dataset, Sample, Transform};
use crate::error::{PatchError, Result};
use crate::patch::Patch;
use crate::volume::Volume;
use std::sync::Arc;

/// 切块数据集：持有整段体数据与切块列表，`get`时才从体数据中切出子数组。
pub struct PatchDataset {
    images: Arc<Vec<Volume>>,
    labels: Arc<Vec<Volume>>,
    augmented: Option<Arc<Vec<Volume>>>,
    patches: Vec<Patch>,
    subjects: Vec<String>,
    dataset_id: usize,
    transforms: Compose,
    augmentation: Option<Arc<dyn Augmentation>>,
}

impl PatchDataset {
    /// 检查每个切块都指向存在的体数据且没有越界。
    pub fn new(
        images: Arc<Vec<Volume>>,
        labels: Arc<Vec<Volume>>,
        patches: Vec<Patch>,
        dataset_id: usize,
    ) -> Result<Self> {
        if images.len() != labels.len() {
            return Err(PatchError::ShapeMismatch(
                "image and label volume lists".to_string(),
                vec![images.len()],
                vec![labels.len()],
            ));
        }
        for p in &patches {
            let image = images
                .get(p.image_id)
                .ok_or(PatchError::IndexOutOfRange(p.image_id, images.len()))?;
            p.slice.checked_view(image)?;
            p.slice.checked_view(&labels[p.image_id])?;
        }
        Ok(Self {
            images,
            labels,
            augmented: None,
            patches,
            subjects: Vec::new(),
            dataset_id,
            transforms: Compose::default(),
            augmentation: None,
        })
    }

    /// 每个体数据对应的受试者编号，下标与体数据列表相同。
    pub fn with_subjects(mut self, subjects: Vec<String>) -> Result<Self> {
        if subjects.len() != self.images.len() {
            return Err(PatchError::ShapeMismatch(
                "subject list".to_string(),
                vec![self.images.len()],
                vec![subjects.len()],
            ));
        }
        self.subjects = subjects;
        Ok(self)
    }

    /// 附加预先增强过的体数据。数量与形状都必须与原体数据一致。
    pub fn with_augmented_volumes(mut self, augmented: Arc<Vec<Volume>>) -> Result<Self> {
        if augmented.len() != self.images.len() {
            return Err(PatchError::ShapeMismatch(
                "augmented volume list".to_string(),
                vec![self.images.len()],
                vec![augmented.len()],
            ));
        }
        for (a, i) in augmented.iter().zip(self.images.iter()) {
            if a.shape() != i.shape() {
                return Err(PatchError::ShapeMismatch(
                    "augmented volume".to_string(),
                    i.shape().to_vec(),
                    a.shape().to_vec(),
                ));
            }
        }
        self.augmented = Some(augmented);
        Ok(self)
    }

    pub fn with_transform<T: Transform + 'static>(mut self, t: T) -> Self {
        self.transforms.push(t);
        self
    }

    pub fn with_augmentation(mut self, augmentation: Option<Arc<dyn Augmentation>>) -> Self {
        self.augmentation = augmentation;
        self
    }

    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    #[inline]
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    #[inline]
    pub fn images(&self) -> &[Volume] {
        &self.images
    }

    #[inline]
    pub fn labels(&self) -> &[Volume] {
        &self.labels
    }

    #[inline]
    pub fn dataset_id(&self) -> usize {
        self.dataset_id
    }

    #[inline]
    pub fn has_augmented_volumes(&self) -> bool {
        self.augmented.is_some()
    }

    #[inline]
    pub fn has_augmentation(&self) -> bool {
        self.augmentation.is_some()
    }

    /// 每个体数据保留下来的切块数。
    pub fn patches_per_volume(&self) -> Vec<usize> {
        let mut counts = vec![0; self.images.len()];
        for p in &self.patches {
            counts[p.image_id] += 1;
        }
        counts
    }
}

impl Dataset for PatchDataset {
    #[inline]
    fn len(&self) -> usize {
        self.patches.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        check_index(index, self.patches.len())?;
        let patch = self.patches[index];
        let id = patch.image_id;
        let x = patch.slice.view(&self.images[id]).to_owned();
        let y = patch.slice.view(&self.labels[id]).to_owned();
        let mut sample = Sample::new(x, Some(y), self.dataset_id);
        if let Some(augmented) = &self.augmented {
            sample.augmented_x = Some(patch.slice.view(&augmented[id]).to_owned());
        }
        Ok(finish_sample(
            sample,
            &self.transforms,
            self.augmentation.as_deref(),
        ))
    }
}

impl std::fmt::Debug for PatchDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchDataset")
            .field("volumes", &self.images.len())
            .field("patches", &self.patches.len())
            .field("dataset_id", &self.dataset_id)
            .field("augmented_volumes", &self.augmented.is_some())
            .field("transforms", &self.transforms)
            .field("augmentation", &self.augmentation.is_some())
            .finish()
    }
}
