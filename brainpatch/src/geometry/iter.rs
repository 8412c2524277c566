use super::{PatchSlice, Shape4};

/// 按`(z, y, x)`字典序枚举切块。
///
/// 迭代器只借用每个轴的起点列表，不会一次性生成所有切块。
pub struct SliceIter<'a> {
    starts: &'a [Vec<usize>; 3],
    size: Shape4,
    cursor: [usize; 3],
    done: bool,
}

impl<'a> SliceIter<'a> {
    /// `size`的第0项为通道数，其余为空间轴上的切块尺寸。
    #[inline]
    pub fn new(starts: &'a [Vec<usize>; 3], size: Shape4) -> Self {
        Self {
            starts,
            size,
            cursor: [0, 0, 0],
            done: starts.iter().any(Vec::is_empty),
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        if self.done {
            return 0;
        }
        let [nz, ny, nx] = [
            self.starts[0].len(),
            self.starts[1].len(),
            self.starts[2].len(),
        ];
        let [cz, cy, cx] = self.cursor;
        nz * ny * nx - (cz * ny * nx + cy * nx + cx)
    }
}

impl<'a> Iterator for SliceIter<'a> {
    type Item = PatchSlice;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let [cz, cy, cx] = self.cursor;
        let (z, y, x) = (self.starts[0][cz], self.starts[1][cy], self.starts[2][cx]);
        let ret = PatchSlice::new(
            [0, z, y, x],
            [
                self.size[0],
                z + self.size[1],
                y + self.size[2],
                x + self.size[3],
            ],
        );
        // 最内层轴先进位
        if cx + 1 < self.starts[2].len() {
            self.cursor[2] += 1;
        } else if cy + 1 < self.starts[1].len() {
            self.cursor = [cz, cy + 1, 0];
        } else if cz + 1 < self.starts[0].len() {
            self.cursor = [cz + 1, 0, 0];
        } else {
            self.done = true;
        }
        Some(ret)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl<'a> ExactSizeIterator for SliceIter<'a> {}

#[cfg(test)]
mod tests {
    use super::SliceIter;
    use crate::geometry::PatchSlice;

    fn test_slice_iter_with(nz: usize, ny: usize, nx: usize) {
        let starts = [
            (0..nz).collect::<Vec<_>>(),
            (0..ny).map(|v| v * 2).collect(),
            (0..nx).map(|v| v * 3).collect(),
        ];
        let mut it = SliceIter::new(&starts, [1, 4, 4, 4]);
        assert_eq!(it.len(), nz * ny * nx);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let (z, y, x) = (z, y * 2, x * 3);
                    assert_eq!(
                        it.next(),
                        Some(PatchSlice::new([0, z, y, x], [1, z + 4, y + 4, x + 4]))
                    );
                }
            }
        }
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_slice_iter_empty() {
        test_slice_iter_with(0, 3, 3);
    }

    #[test]
    fn test_slice_iter_single() {
        test_slice_iter_with(1, 1, 1);
    }

    #[test]
    fn test_slice_iter_grid() {
        test_slice_iter_with(3, 4, 5);
    }
}
