/*
 * @Description  : 算子节点。图像类算子统一为NHWC布局。
 */

mod add;
mod batch_norm;
mod bias_add;
mod concat;
mod conv2d;
mod conv_transpose2d;
mod dropout;
mod im2col;
mod leaky_relu;
mod mat_mul;
mod reshape;
mod scalar_multiply;
mod sigmoid;
mod tanh;

#[cfg(test)]
mod test_utils;

pub(in crate::nn) use add::Add;
pub(in crate::nn) use batch_norm::{BATCH_NORM_EPSILON, BatchNorm};
pub(in crate::nn) use bias_add::BiasAdd;
pub(in crate::nn) use concat::Concat;
pub(in crate::nn) use conv_transpose2d::ConvTranspose2d;
pub(in crate::nn) use conv2d::Conv2d;
pub(in crate::nn) use dropout::Dropout;
pub use im2col::{Padding, same_padding};
pub(in crate::nn) use leaky_relu::LeakyReLU;
pub(in crate::nn) use mat_mul::MatMul;
pub(in crate::nn) use reshape::Reshape;
pub(in crate::nn) use scalar_multiply::ScalarMultiply;
pub(in crate::nn) use sigmoid::{Sigmoid, stable_sigmoid};
pub(in crate::nn) use tanh::Tanh;
