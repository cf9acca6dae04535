use super::Tensor;

impl Tensor {
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f32) -> f32,
    {
        Self::from_array(self.data.mapv(f))
    }

    pub fn abs(&self) -> Self {
        self.map(f32::abs)
    }

    pub fn sqrt(&self) -> Self {
        self.map(f32::sqrt)
    }

    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    /// 所有元素的均值；空张量返回0
    pub fn mean(&self) -> f32 {
        if self.size() == 0 {
            return 0.0;
        }
        self.sum() / self.size() as f32
    }

    /// L2范数（用f64累加，大参数张量时不易溢出精度）
    pub fn norm_l2(&self) -> f32 {
        self.data
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt() as f32
    }

    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}
