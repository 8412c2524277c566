//! 体数据的读取、多模态堆叠与标签值重映射。
//!
//! 所有体数据在内存中统一为`f32`的四维数组`(channel, z, y, x)`。

use crate::error::{PatchError, Result};
use ndarray::{concatenate, ArrayBase, ArrayD, ArrayView4, Axis, DataMut, Dimension, Ix4};
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// 内存中的一个体数据。
pub type Volume = ndarray::Array4<f32>;

/// 体数据解码器：给定路径，返回四维体数据。
///
/// 任何`Fn(&Path) -> Result<Volume>`闭包都实现了该trait，便于测试中替换。
pub trait VolumeLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Volume>;
}

impl<F> VolumeLoader for F
where
    F: Fn(&Path) -> Result<Volume> + Send + Sync,
{
    #[inline]
    fn load(&self, path: &Path) -> Result<Volume> {
        self(path)
    }
}

/// 默认解码器：`.npy`总是支持；`.nii`、`.nii.gz`需要开启`nifti`特性。
#[derive(Copy, Clone, Debug, Default)]
pub struct FileLoader;

impl VolumeLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<Volume> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let array = if name.ends_with(".npy") {
            read_npy_any(path)?
        } else if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            read_nifti(path)?
        } else {
            return Err(PatchError::Volume(
                path.to_path_buf(),
                "unknown file extension".to_string(),
            ));
        };
        let volume = into_volume(array, path)?;
        debug!(path = %path.display(), shape = ?volume.shape(), "volume decoded");
        Ok(volume)
    }
}

/// 三维数组补上长度为1的通道轴；四维数组原样返回。
fn into_volume(array: ArrayD<f32>, path: &Path) -> Result<Volume> {
    let array = match array.ndim() {
        3 => array.insert_axis(Axis(0)),
        4 => array,
        n => {
            return Err(PatchError::Volume(
                path.to_path_buf(),
                format!("expected a 3D or 4D array, got {n}D"),
            ))
        }
    };
    array
        .into_dimensionality::<Ix4>()
        .map_err(|e| PatchError::Volume(path.to_path_buf(), e.to_string()))
}

fn npy_error(path: &Path, e: ReadNpyError) -> PatchError {
    PatchError::Volume(path.to_path_buf(), e.to_string())
}

fn read_npy_as<T>(path: &Path) -> std::result::Result<ArrayD<f32>, ReadNpyError>
where
    T: ndarray_npy::ReadableElement + Copy + Into<f64>,
{
    let file = File::open(path).map_err(ReadNpyError::from)?;
    let array = ArrayD::<T>::read_npy(file)?;
    Ok(array.mapv(|v| Into::<f64>::into(v) as f32))
}

/// 读取`.npy`。元素类型依次尝试`f32`、`f64`、`i16`、`u8`，统一转为`f32`。
fn read_npy_any(path: &Path) -> Result<ArrayD<f32>> {
    let readers: [fn(&Path) -> std::result::Result<ArrayD<f32>, ReadNpyError>; 4] = [
        read_npy_as::<f32>,
        read_npy_as::<f64>,
        read_npy_as::<i16>,
        read_npy_as::<u8>,
    ];
    let mut last = None;
    for read in readers {
        match read(path) {
            Ok(v) => return Ok(v),
            Err(e @ ReadNpyError::WrongDescriptor(_)) => last = Some(e),
            Err(e) => return Err(npy_error(path, e)),
        }
    }
    Err(match last {
        Some(e) => npy_error(path, e),
        None => PatchError::Volume(path.to_path_buf(), "unsupported element type".to_string()),
    })
}

cfg_if::cfg_if! {
    if #[cfg(feature = "nifti")] {
        use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

        /// 读取NIfTI。`(x, y, z[, t])` -> `([t, ]z, y, x)`。
        fn read_nifti(path: &Path) -> Result<ArrayD<f32>> {
            let fail = |e: nifti::NiftiError| PatchError::Volume(path.to_path_buf(), e.to_string());
            let obj = ReaderOptions::new().read_file(path).map_err(fail)?;
            let array = obj.into_volume().into_ndarray::<f32>().map_err(fail)?;
            let axes: Vec<usize> = (0..array.ndim()).rev().collect();
            Ok(array.permuted_axes(axes).as_standard_layout().into_owned())
        }
    } else {
        fn read_nifti(path: &Path) -> Result<ArrayD<f32>> {
            Err(PatchError::Volume(
                path.to_path_buf(),
                "built without NIfTI support".to_string(),
            ))
        }
    }
}

/// 沿通道轴堆叠多个模态，通道顺序即输入顺序。各模态的空间形状必须一致。
pub fn stack_modalities(volumes: &[Volume]) -> Result<Volume> {
    let first = volumes.first().ok_or_else(|| {
        PatchError::UnsupportedConfiguration("no modality to stack".to_string())
    })?;
    let spatial = &first.shape()[1..];
    for v in &volumes[1..] {
        if &v.shape()[1..] != spatial {
            return Err(PatchError::ShapeMismatch(
                "modality stack".to_string(),
                spatial.to_vec(),
                v.shape()[1..].to_vec(),
            ));
        }
    }
    let views: Vec<ArrayView4<f32>> = volumes.iter().map(|v| v.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| {
        PatchError::ShapeMismatch(
            format!("modality stack ({e})"),
            first.shape().to_vec(),
            Vec::new(),
        )
    })
}

/// iSEG原始标签灰度与类别编号的对应。
pub const ISEG_CLASS_IDS: &[(f32, f32)] = &[(10.0, 1.0), (150.0, 2.0), (250.0, 3.0)];

/// 标签值重映射，例如把原始灰度标签`10, 150, 250`映射为类别编号`1, 2, 3`。不在表中的值保持不变。
#[derive(Clone, Debug, PartialEq)]
pub struct RemapClassIds {
    from: Vec<f32>,
    to: Vec<f32>,
}

impl RemapClassIds {
    pub fn new(from: Vec<f32>, to: Vec<f32>) -> Result<Self> {
        if from.len() != to.len() {
            return Err(PatchError::Config(format!(
                "class remapping has {} source ids but {} target ids",
                from.len(),
                to.len()
            )));
        }
        Ok(Self { from, to })
    }

    /// 由`(原始值, 类别编号)`对构造。
    pub fn from_pairs(pairs: &[(f32, f32)]) -> Self {
        let (from, to) = pairs.iter().copied().unzip();
        Self { from, to }
    }

    /// iSEG标签的映射。
    #[inline]
    pub fn iseg() -> Self {
        Self::from_pairs(ISEG_CLASS_IDS)
    }

    #[inline]
    pub fn map(&self, v: f32) -> f32 {
        self.from
            .iter()
            .position(|&f| f == v)
            .map_or(v, |i| self.to[i])
    }

    pub fn apply<S, D>(&self, array: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = f32>,
        D: Dimension,
    {
        array.mapv_inplace(|v| self.map(v));
    }
}

/// 读取一组模态文件并按顺序堆叠为一个多通道体数据。
pub fn load_image(loader: &dyn VolumeLoader, images: &[impl AsRef<Path>]) -> Result<Volume> {
    let mut channels = Vec::with_capacity(images.len());
    for p in images {
        channels.push(loader.load(p.as_ref())?);
    }
    match channels.len() {
        1 => channels.pop().ok_or_else(|| {
            PatchError::UnsupportedConfiguration("no modality to stack".to_string())
        }),
        _ => stack_modalities(&channels),
    }
}

/// 读取一个样本：各模态图像堆叠为多通道，标签为单独的体数据。图像与标签的空间形状必须一致。
pub fn load_pair(
    loader: &dyn VolumeLoader,
    images: &[impl AsRef<Path>],
    label: &Path,
    remap: Option<&RemapClassIds>,
) -> Result<(Volume, Volume)> {
    let image = load_image(loader, images)?;
    let mut target = loader.load(label)?;
    if image.shape()[1..] != target.shape()[1..] {
        return Err(PatchError::ShapeMismatch(
            format!("image and label `{}`", label.display()),
            image.shape()[1..].to_vec(),
            target.shape()[1..].to_vec(),
        ));
    }
    if let Some(r) = remap {
        r.apply(&mut target);
    }
    Ok((image, target))
}
