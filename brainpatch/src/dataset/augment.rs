use crate::split::{seeded_rng, SplitRng};
use ndarray::{Array4, Axis};
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// 运行时数据增强，只作用于输入。
pub trait Augmentation: Send + Sync {
    fn augment(&self, x: &Array4<f32>) -> Array4<f32>;
}

impl<F> Augmentation for F
where
    F: Fn(&Array4<f32>) -> Array4<f32> + Send + Sync,
{
    #[inline]
    fn augment(&self, x: &Array4<f32>) -> Array4<f32> {
        self(x)
    }
}

/// 增强阶段自带的随机数生成器。多个线程取样时按加锁顺序抽取。
struct StageRng(Mutex<SplitRng>);

impl StageRng {
    fn from_entropy() -> Self {
        Self(Mutex::new(seeded_rng(None).0))
    }

    fn from_seed(seed: u64) -> Self {
        Self(Mutex::new(SplitRng::seed_from_u64(seed)))
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, SplitRng> {
        // 持锁线程panic不会让生成器处于无效状态
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 随机强度缩放与平移：`v * a + b`，`a ∈ [1 - scale, 1 + scale]`，`b ∈ [-shift, shift]`。
pub struct IntensityJitter {
    pub scale: f32,
    pub shift: f32,
    rng: StageRng,
}

impl IntensityJitter {
    /// 随机数从系统熵播种。
    #[inline]
    pub fn new(scale: f32, shift: f32) -> Self {
        Self {
            scale: scale.abs(),
            shift: shift.abs(),
            rng: StageRng::from_entropy(),
        }
    }

    /// 用固定种子重新播种，相同种子给出相同的增强序列。
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StageRng::from_seed(seed);
        self
    }
}

impl fmt::Debug for IntensityJitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntensityJitter")
            .field("scale", &self.scale)
            .field("shift", &self.shift)
            .finish()
    }
}

impl Augmentation for IntensityJitter {
    fn augment(&self, x: &Array4<f32>) -> Array4<f32> {
        let (a, b) = {
            let mut rng = self.rng.lock();
            let a = if self.scale > 0.0 {
                rng.gen_range(1.0 - self.scale..=1.0 + self.scale)
            } else {
                1.0
            };
            let b = if self.shift > 0.0 {
                rng.gen_range(-self.shift..=self.shift)
            } else {
                0.0
            };
            (a, b)
        };
        x.mapv(|v| v * a + b)
    }
}

/// 以概率`p`沿某个空间轴翻转（`0`为z，`1`为y，`2`为x）。
pub struct RandomFlip {
    pub axis: usize,
    pub p: f64,
    rng: StageRng,
}

impl RandomFlip {
    #[inline]
    pub fn new(axis: usize, p: f64) -> Self {
        Self {
            axis: axis.min(2),
            p: p.clamp(0.0, 1.0),
            rng: StageRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StageRng::from_seed(seed);
        self
    }
}

impl fmt::Debug for RandomFlip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomFlip")
            .field("axis", &self.axis)
            .field("p", &self.p)
            .finish()
    }
}

impl Augmentation for RandomFlip {
    fn augment(&self, x: &Array4<f32>) -> Array4<f32> {
        let mut out = x.clone();
        if self.rng.lock().gen_bool(self.p) {
            out.invert_axis(Axis(self.axis + 1));
            out = out.as_standard_layout().into_owned();
        }
        out
    }
}
