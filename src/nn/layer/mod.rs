/*
 * @Description  : 神经网络层（PyTorch 风格：层持有参数 Var，forward 复用同一组参数）
 */

mod batch_norm;
mod conv2d;
mod conv_transpose2d;
mod linear;

pub use batch_norm::BatchNorm;
pub use conv2d::Conv2d;
pub use conv_transpose2d::ConvTranspose2d;
pub use linear::Linear;

use crate::nn::Padding;

/// 卷积层的填充方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingMode {
    /// TF "SAME"：输出尺寸 = ceil(输入 / 步长)；反卷积则为 输入 * 步长
    Same,
    /// 固定填充
    Explicit(Padding),
}

/// 层参数共用的初始化：N(0, 0.02)
pub(in crate::nn) const WEIGHT_INIT: crate::nn::Init = crate::nn::Init::Normal {
    mean: 0.0,
    std: 0.02,
};
