use super::{Geometry, Shape4};
use ndarray::{s, Array4};

/// 某一空间轴填充后的长度：至少为`size`，且`(len - size)`是`step`的整数倍。
#[inline]
fn padded_len(len: usize, size: usize, step: usize) -> usize {
    if len <= size {
        size
    } else {
        let over = len - size;
        size + (over + step - 1) / step * step
    }
}

/// 体数据填充后的形状。通道轴不变。
pub fn padded_shape(shape: Shape4, geometry: Geometry) -> Shape4 {
    let Geometry { patch_size, step } = geometry;
    [
        shape[0],
        padded_len(shape[1], patch_size[1], step[1].max(1)),
        padded_len(shape[2], patch_size[2], step[2].max(1)),
        padded_len(shape[3], patch_size[3], step[3].max(1)),
    ]
}

/// 用零（`A::default()`）在空间轴两侧对称填充，使体数据与切块尺寸、步长相容。
///
/// 奇数差值时多出的一个体素填在末端。已经相容的体数据原样返回一份拷贝。
pub fn pad_to_patch_shape<A>(volume: &Array4<A>, geometry: Geometry) -> Array4<A>
where
    A: Clone + Default,
{
    let (c, z, y, x) = volume.dim();
    let target = padded_shape([c, z, y, x], geometry);
    if target == [c, z, y, x] {
        return volume.clone();
    }
    let (bz, by, bx) = (
        (target[1] - z) / 2,
        (target[2] - y) / 2,
        (target[3] - x) / 2,
    );
    let mut padded = Array4::from_elem((target[0], target[1], target[2], target[3]), A::default());
    padded
        .slice_mut(s![.., bz..bz + z, by..by + y, bx..bx + x])
        .assign(volume);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SliceBuilder;

    #[test]
    fn padded_len_is_congruent() {
        assert_eq!(padded_len(40, 32, 4), 40);
        assert_eq!(padded_len(41, 32, 4), 44);
        assert_eq!(padded_len(20, 32, 4), 32);
        assert_eq!(padded_len(33, 32, 16), 48);
    }

    #[test]
    fn small_volume_is_padded_symmetrically() {
        let volume = Array4::<f32>::ones((1, 30, 32, 29));
        let padded = pad_to_patch_shape(&volume, Geometry::training());
        assert_eq!(padded.dim(), (1, 32, 32, 32));
        assert_eq!(padded[[0, 0, 0, 0]], 0.0);
        assert_eq!(padded[[0, 1, 0, 1]], 1.0);
        assert_eq!(padded[[0, 31, 0, 31]], 0.0);
        assert_eq!(padded.sum(), volume.sum());
    }

    #[test]
    fn padded_volume_accepts_patches() {
        let volume = Array4::<u8>::zeros((2, 45, 33, 70));
        let geometry = Geometry::new([1, 32, 32, 32], [1, 8, 8, 8]).unwrap();
        let padded = pad_to_patch_shape(&volume, geometry);
        let (c, z, y, x) = padded.dim();
        assert_eq!(c, 2);
        for len in [z, y, x] {
            assert!(len >= 32);
            assert_eq!((len - 32) % 8, 0);
        }
        assert!(SliceBuilder::new([c, z, y, x], geometry).is_ok());
    }
}
