/*
 * @Description  : 张量。底层数据为`ndarray`的动态维数组，布局约定为行优先（C 序）；
 *                 图像张量统一为通道在后（channel-last）的[batch, height, width, channels]。
 */

use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

mod filter;
mod ops;
mod others;
mod property;
mod shape;

#[cfg(test)]
mod tests;

/// 定义张量的结构体。其可以是标量、向量、矩阵或更高维度的数组。
/// 注：只要通Tensor初始化的都是张量（即使标量也是张量）；
/// 而通常意义上的数字（类型为usize、i32、f64等）就只是纯数（number），在这里不被认为是张量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    /// 创建一个张量，若为标量，`shape`可以是[]、[1]、[1,1]、[1,1,1]...
    /// 注：`data`的长度必须和`shape`中所有元素的乘积相等，否则panic。
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        let expected: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected,
            "数据长度{}与形状{:?}不符",
            data.len(),
            shape
        );
        Self::from_vec(data.to_vec(), shape)
    }

    /// 直接接管`Vec`，避免额外拷贝（大张量时有意义）
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Self {
        let data = ArrayD::from_shape_vec(IxDyn(shape), data)
            .unwrap_or_else(|e| panic!("无法用给定数据构建形状为{shape:?}的张量：{e}"));
        Self { data }
    }

    /// 统一转为标准布局，保证`as_slice`总能成功
    pub(crate) fn from_array(data: ArrayD<f32>) -> Self {
        if data.is_standard_layout() {
            Self { data }
        } else {
            Self {
                data: data.as_standard_layout().into_owned(),
            }
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::full(1.0, shape)
    }

    pub fn full(value: f32, shape: &[usize]) -> Self {
        Self {
            data: ArrayD::from_elem(IxDyn(shape), value),
        }
    }

    /// 创建一个服从正态分布N(mean, std_dev²)的随机张量（Box-Muller），随机源由调用方给定
    pub fn normal_with_rng(mean: f32, std_dev: f32, shape: &[usize], rng: &mut StdRng) -> Self {
        let data_len = shape.iter().product::<usize>();
        let mut data = Vec::with_capacity(data_len);

        while data.len() < data_len {
            // u1 取 (0, 1]，避免 ln(0)
            let u1: f32 = 1.0 - rng.r#gen::<f32>();
            let u2: f32 = rng.r#gen();
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f32::consts::PI * u2;
            let z0 = mean + std_dev * r * theta.cos();
            let z1 = mean + std_dev * r * theta.sin();

            if z0.is_finite() {
                data.push(z0);
            }
            if data.len() < data_len && z1.is_finite() {
                data.push(z1);
            }
        }

        Self::from_vec(data, shape)
    }

    /// 创建一个在[min, max)上均匀分布的随机张量
    pub fn uniform_with_rng(min: f32, max: f32, shape: &[usize], rng: &mut StdRng) -> Self {
        let data_len = shape.iter().product::<usize>();
        let data = (0..data_len).map(|_| rng.gen_range(min..max)).collect();
        Self::from_vec(data, shape)
    }
}
