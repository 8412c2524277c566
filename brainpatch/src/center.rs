//! 切块中心前景判定。

use ndarray::ArrayView4;

/// 背景类别的标签值。
pub const BACKGROUND: f32 = 0.0;

/// 切块中心体素的信息。
///
/// 中心取每个空间轴上的`size / 2`（偶数尺寸时为靠后的那个中间体素），只看标签的第0通道。
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CenterCoordinate {
    /// 中心在切块内部的`(z, y, x)`坐标。
    pub center: [usize; 3],
    /// 中心体素的标签值。
    pub class_id: f32,
    pub is_foreground: bool,
}

impl CenterCoordinate {
    /// 由切块的标签子数组计算中心信息。标签子数组为空时返回`None`。
    pub fn from_label(label: &ArrayView4<f32>) -> Option<Self> {
        let (c, z, y, x) = label.dim();
        if c == 0 || z == 0 || y == 0 || x == 0 {
            return None;
        }
        let center = [z / 2, y / 2, x / 2];
        let class_id = label[[0, center[0], center[1], center[2]]];
        Some(Self {
            center,
            class_id,
            is_foreground: class_id != BACKGROUND,
        })
    }
}

/// 判断切块中心是否落在非背景组织上。
///
/// 只取决于标签子数组在几何中心处的值，与周围体素无关；空数组视为背景。
#[inline]
pub fn is_foreground(label: &ArrayView4<f32>) -> bool {
    CenterCoordinate::from_label(label).map_or(false, |c| c.is_foreground)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn all_zero_is_background() {
        let label = Array4::<f32>::zeros((1, 32, 32, 32));
        assert!(!is_foreground(&label.view()));
    }

    #[test]
    fn exact_center_decides() {
        let mut label = Array4::<f32>::zeros((1, 32, 32, 32));
        label[[0, 16, 16, 16]] = 2.0;
        assert!(is_foreground(&label.view()));
        let c = CenterCoordinate::from_label(&label.view()).unwrap();
        assert_eq!(c.center, [16, 16, 16]);
        assert_eq!(c.class_id, 2.0);
    }

    #[test]
    fn surroundings_do_not_matter() {
        let mut label = Array4::<f32>::ones((1, 32, 32, 32));
        label[[0, 16, 16, 16]] = 0.0;
        assert!(!is_foreground(&label.view()));

        let mut label = Array4::<f32>::zeros((1, 31, 31, 31));
        label[[0, 15, 15, 15]] = 1.0;
        assert!(is_foreground(&label.view()));
    }

    #[test]
    fn only_first_label_channel_counts() {
        let mut label = Array4::<f32>::zeros((2, 8, 8, 8));
        label[[1, 4, 4, 4]] = 3.0;
        assert!(!is_foreground(&label.view()));
    }

    #[test]
    fn empty_is_background() {
        let label = Array4::<f32>::zeros((1, 0, 4, 4));
        assert!(!is_foreground(&label.view()));
        assert!(CenterCoordinate::from_label(&label.view()).is_none());
    }
}
