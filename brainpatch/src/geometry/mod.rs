//! 切块几何：在体数据上按固定尺寸、固定步长枚举所有切块窗口。
//!
//! 体数据统一为四维`(channel, z, y, x)`。通道轴从不滑动：每个切块总是覆盖体数据的全部通道，
//! 因此多模态体数据的切块形状为`(模态数, pz, py, px)`。

mod iter;
mod pad;

pub use iter::SliceIter;
pub use pad::{pad_to_patch_shape, padded_shape};

use crate::error::{PatchError, Result};
use ndarray::{s, Array4, ArrayView4};

/// 四维形状`(channel, z, y, x)`。
pub type Shape4 = [usize; 4];

/// 轴名，仅用于错误信息。
const AXIS_NAMES: [&str; 4] = ["channel", "z", "y", "x"];

/// 切块尺寸与步长。
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Geometry {
    pub patch_size: Shape4,
    pub step: Shape4,
}

impl Geometry {
    /// 检查切块尺寸与步长均为正。
    pub fn new(patch_size: Shape4, step: Shape4) -> Result<Self> {
        for axis in 0..4 {
            if patch_size[axis] == 0 {
                return Err(PatchError::InvalidGeometry(format!(
                    "patch size along {} axis is zero",
                    AXIS_NAMES[axis]
                )));
            }
            if step[axis] == 0 {
                return Err(PatchError::InvalidGeometry(format!(
                    "step along {} axis is zero",
                    AXIS_NAMES[axis]
                )));
            }
        }
        Ok(Self { patch_size, step })
    }

    /// 训练切块的默认几何：32³切块，步长4。
    pub const fn training() -> Self {
        Self {
            patch_size: [1, 32, 32, 32],
            step: [1, 4, 4, 4],
        }
    }

    /// 重建划分的默认几何：64³切块，步长16。
    pub const fn reconstruction() -> Self {
        Self {
            patch_size: [1, 64, 64, 64],
            step: [1, 16, 16, 16],
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::training()
    }
}

/// 一个切块在体数据中的位置：每个轴上的左闭右开区间`[start, stop)`。
///
/// 它只是对体数据某一区域的引用描述，不持有任何体素。
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PatchSlice {
    pub start: Shape4,
    pub stop: Shape4,
}

impl PatchSlice {
    #[inline]
    pub fn new(start: Shape4, stop: Shape4) -> Self {
        Self { start, stop }
    }

    /// 每个轴上的长度。
    #[inline]
    pub fn size(&self) -> Shape4 {
        [
            self.stop[0] - self.start[0],
            self.stop[1] - self.start[1],
            self.stop[2] - self.start[2],
            self.stop[3] - self.start[3],
        ]
    }

    #[inline]
    pub fn to_ranges(self) -> [(usize, usize); 4] {
        [
            (self.start[0], self.stop[0]),
            (self.start[1], self.stop[1]),
            (self.start[2], self.stop[2]),
            (self.start[3], self.stop[3]),
        ]
    }

    /// 判断切块是否完全落在`shape`内（通道轴不检查）。
    pub fn fits(&self, shape: &[usize]) -> bool {
        shape.len() == 4 && (1..4).all(|a| self.start[a] < self.stop[a] && self.stop[a] <= shape[a])
    }

    /// 从体数据中取出切块对应的只读视图。通道轴总是取全部通道。
    ///
    /// 调用者需保证切块在`volume`的空间范围内，否则panic。
    #[inline]
    pub fn view<'a, A>(&self, volume: &'a Array4<A>) -> ArrayView4<'a, A> {
        volume.slice(s![
            ..,
            self.start[1]..self.stop[1],
            self.start[2]..self.stop[2],
            self.start[3]..self.stop[3]
        ])
    }

    /// 同`view`，但越界时返回错误而不是panic。
    pub fn checked_view<'a, A>(&self, volume: &'a Array4<A>) -> Result<ArrayView4<'a, A>> {
        if self.fits(volume.shape()) {
            Ok(self.view(volume))
        } else {
            Err(PatchError::ShapeMismatch(
                "patch bounds".to_string(),
                self.stop.to_vec(),
                volume.shape().to_vec(),
            ))
        }
    }
}

/// 某一轴上所有合法起点：从0开始以`step`为步长扫描到`len - size`（含）；
/// 若最后一个起点没有恰好落在`len - size`上，则追加一个锚定在`len - size`的窗口以保证完全覆盖。
fn axis_starts(len: usize, size: usize, step: usize) -> Vec<usize> {
    let last = len - size;
    let mut starts: Vec<usize> = (0..=last).step_by(step).collect();
    if let Some(&tail) = starts.last() {
        if tail != last {
            starts.push(last);
        }
    }
    starts
}

/// 切块几何构建器。
#[derive(Clone, Debug)]
pub struct SliceBuilder {
    shape: Shape4,
    starts: [Vec<usize>; 3],
}

impl SliceBuilder {
    /// 以体数据形状`shape`和几何`geometry`初始化。任一轴上切块尺寸大于体数据尺寸时返回错误。
    pub fn new(shape: Shape4, geometry: Geometry) -> Result<Self> {
        let Geometry { patch_size, step } = Geometry::new(geometry.patch_size, geometry.step)?;
        for axis in 0..4 {
            if patch_size[axis] > shape[axis] {
                return Err(PatchError::InvalidGeometry(format!(
                    "patch size {} exceeds volume size {} along {} axis",
                    patch_size[axis], shape[axis], AXIS_NAMES[axis]
                )));
            }
        }
        let starts = [
            axis_starts(shape[1], patch_size[1], step[1]),
            axis_starts(shape[2], patch_size[2], step[2]),
            axis_starts(shape[3], patch_size[3], step[3]),
        ];
        Ok(Self {
            shape: [shape[0], patch_size[1], patch_size[2], patch_size[3]],
            starts,
        })
    }

    /// 从任意维度的形状切片构建；维度不为4时返回错误。
    pub fn from_dims(dims: &[usize], geometry: Geometry) -> Result<Self> {
        match *dims {
            [c, z, y, x] => Self::new([c, z, y, x], geometry),
            _ => Err(PatchError::InvalidGeometry(format!(
                "expected a 4D volume, got shape {dims:?}"
            ))),
        }
    }

    /// 切块总数。
    #[inline]
    pub fn len(&self) -> usize {
        self.starts.iter().map(Vec::len).product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按`(z, y, x)`字典序枚举所有切块。
    #[inline]
    pub fn iter(&self) -> SliceIter<'_> {
        SliceIter::new(&self.starts, self.shape)
    }

    /// 收集所有切块。
    pub fn build_slices(&self) -> Vec<PatchSlice> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a SliceBuilder {
    type Item = PatchSlice;
    type IntoIter = SliceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
