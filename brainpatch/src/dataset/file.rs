use super::{check_index, finish_sample, Augmentation, Compose, Dataset, Sample, Transform};
use crate::error::Result;
use crate::manifest::SamplePaths;
use crate::volume::{load_pair, RemapClassIds, VolumeLoader};
use std::sync::Arc;

/// 每个样本对应一组文件的数据集。文件在`get`时才读取。
pub struct FileDataset {
    rows: Vec<SamplePaths>,
    loader: Arc<dyn VolumeLoader>,
    remap: Option<RemapClassIds>,
    dataset_id: usize,
    transforms: Compose,
    augmentation: Option<Arc<dyn Augmentation>>,
}

impl FileDataset {
    #[inline]
    pub fn new(rows: Vec<SamplePaths>, loader: Arc<dyn VolumeLoader>, dataset_id: usize) -> Self {
        Self {
            rows,
            loader,
            remap: None,
            dataset_id,
            transforms: Compose::default(),
            augmentation: None,
        }
    }

    pub fn with_label_remap(mut self, remap: Option<RemapClassIds>) -> Self {
        self.remap = remap;
        self
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
    pub fn rows(&self) -> &[SamplePaths] {
        &self.rows
    }

    #[inline]
    pub fn dataset_id(&self) -> usize {
        self.dataset_id
    }
}

impl Dataset for FileDataset {
    #[inline]
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        check_index(index, self.rows.len())?;
        let row = &self.rows[index];
        let (x, y) = load_pair(
            self.loader.as_ref(),
            &row.images,
            &row.label,
            self.remap.as_ref(),
        )?;
        Ok(finish_sample(
            Sample::new(x, Some(y), self.dataset_id),
            &self.transforms,
            self.augmentation.as_deref(),
        ))
    }
}

impl std::fmt::Debug for FileDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDataset")
            .field("rows", &self.rows.len())
            .field("dataset_id", &self.dataset_id)
            .field("remap", &self.remap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PatchError;
    use crate::volume::Volume;
    use ndarray::Array4;
    use std::path::{Path, PathBuf};

    fn loader(p: &Path) -> Result<Volume> {
        let v = if p.to_string_lossy().contains("label") { 250.0 } else { 1.0 };
        Ok(Array4::from_elem((1, 4, 4, 4), v))
    }

    #[test]
    fn lazy_load_with_remap() {
        let rows = vec![SamplePaths {
            subject: "1".to_string(),
            images: vec![PathBuf::from("1/T1.npy"), PathBuf::from("1/T2.npy")],
            label: PathBuf::from("1/label.npy"),
        }];
        let ds = FileDataset::new(rows, Arc::new(loader), 1).with_label_remap(Some(RemapClassIds::iseg()));
        let s = ds.get(0).unwrap();
        assert_eq!(s.x.shape(), &[2, 4, 4, 4]);
        assert!(s.y.unwrap().iter().all(|&v| v == 3.0));
        assert!(matches!(ds.get(1), Err(PatchError::IndexOutOfRange(1, 1))));
    }
}
