use super::Tensor;

impl Tensor {
    /// 通用的条件过滤函数，可以灵活处理张量中的元素
    ///
    /// # 参数
    /// * `condition` - 条件函数，接收元素值并返回bool
    /// * `true_fn` - 当条件为true时的值转换函数
    /// * `false_fn` - 当条件为false时的值转换函数
    ///
    /// # 示例
    /// ```
    /// use f2s_gan::tensor::Tensor;
    /// let t = Tensor::new(&[-1.0, 0.0, 1.0], &[3]);
    ///
    /// // 类似 np.where(x > 0.0, x, 0.2 * x)
    /// let result = t.where_with_f32(|x| x > 0.0, |x| x, |x| 0.2 * x);
    /// assert_eq!(result.to_vec(), vec![-0.2, 0.0, 1.0]);
    /// ```
    pub fn where_with_f32<F, T, U>(&self, condition: F, true_fn: T, false_fn: U) -> Self
    where
        F: Fn(f32) -> bool,
        T: Fn(f32) -> f32,
        U: Fn(f32) -> f32,
    {
        self.map(|x| {
            if x.is_nan() {
                f32::NAN
            } else if condition(x) {
                true_fn(x)
            } else {
                false_fn(x)
            }
        })
    }

    /// 基于另一个同形张量的逐元素条件过滤：`f(self[i], other[i])`
    ///
    /// # Panics
    /// 两张量形状不一致时
    pub fn zip_map<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(f32, f32) -> f32,
    {
        assert!(
            self.is_same_shape(other),
            "zip_map要求形状一致：{:?} vs {:?}",
            self.shape(),
            other.shape()
        );
        let mut data = self.data.clone();
        data.zip_mut_with(&other.data, |a, &b| *a = f(*a, b));
        Self::from_array(data)
    }
}
