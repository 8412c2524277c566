use super::Sample;
use crate::volume::RemapClassIds;

/// 作用于样本的确定性变换。
pub trait Transform: Send + Sync {
    fn apply(&self, sample: Sample) -> Sample;
}

impl<F> Transform for F
where
    F: Fn(Sample) -> Sample + Send + Sync,
{
    #[inline]
    fn apply(&self, sample: Sample) -> Sample {
        self(sample)
    }
}

/// 按顺序串联的变换。空的`Compose`不做任何事。
#[derive(Default)]
pub struct Compose {
    stages: Vec<Box<dyn Transform>>,
}

impl Compose {
    #[inline]
    pub fn new(stages: Vec<Box<dyn Transform>>) -> Self {
        Self { stages }
    }

    pub fn push<T: Transform + 'static>(&mut self, stage: T) {
        self.stages.push(Box::new(stage));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Transform for Compose {
    fn apply(&self, sample: Sample) -> Sample {
        self.stages.iter().fold(sample, |s, t| t.apply(s))
    }
}

impl std::fmt::Debug for Compose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compose")
            .field("stages", &self.stages.len())
            .finish()
    }
}

/// 标准化输入强度：`(v - mean) / std`。同时作用于已存在的增强输入。
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Standardize {
    pub mean: f32,
    pub std: f32,
}

impl Standardize {
    #[inline]
    pub fn new(mean: f32, std: f32) -> Self {
        Self { mean, std }
    }
}

impl Transform for Standardize {
    fn apply(&self, mut sample: Sample) -> Sample {
        let (mean, std) = (self.mean, if self.std > 0.0 { self.std } else { 1.0 });
        sample.x.mapv_inplace(|v| (v - mean) / std);
        if let Some(a) = sample.augmented_x.as_mut() {
            a.mapv_inplace(|v| (v - mean) / std);
        }
        sample
    }
}

/// 作用于标签。
impl Transform for RemapClassIds {
    fn apply(&self, mut sample: Sample) -> Sample {
        if let Some(y) = sample.y.as_mut() {
            self.apply(y);
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn sample() -> Sample {
        let mut y = Array4::<f32>::zeros((1, 2, 2, 2));
        y[[0, 1, 1, 1]] = 150.0;
        Sample::new(Array4::from_elem((1, 2, 2, 2), 4.0), Some(y), 0)
    }

    #[test]
    fn stages_run_in_order() {
        let mut c = Compose::default();
        c.push(|mut s: Sample| {
            s.x.mapv_inplace(|v| v + 1.0);
            s
        });
        c.push(Standardize::new(1.0, 2.0));
        let s = c.apply(sample());
        assert!(s.x.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn remap_touches_only_labels() {
        let s = Transform::apply(&RemapClassIds::iseg(), sample());
        let y = s.y.unwrap();
        assert_eq!(y[[0, 1, 1, 1]], 2.0);
        assert_eq!(s.x[[0, 0, 0, 0]], 4.0);
    }

    #[test]
    fn zero_std_does_not_divide_by_zero() {
        let s = Standardize::new(4.0, 0.0).apply(sample());
        assert!(s.x.iter().all(|&v| v == 0.0));
    }
}
