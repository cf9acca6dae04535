/*
 * @Description  : Var 扩展 trait 模块
 *
 * 按功能领域组织 Var 的扩展方法，用户按需 import。
 *
 * # 模块结构
 * - `activation`: 激活与随机失活（relu, leaky_relu, sigmoid, tanh, dropout）
 * - `loss`: 损失函数（l1_loss, sigmoid_cross_entropy）
 * - `matrix`: 带参数的线性运算（matmul, bias_add, conv2d, conv_transpose2d, batch_norm）
 * - `shape`: 形状变换（reshape, concat）
 *
 * # 使用示例
 * ```ignore
 * use f2s_gan::nn::{VarActivationOps, VarLossOps, VarMatrixOps, VarShapeOps};
 *
 * let h = x.conv2d(&kernel, 2, padding)?.leaky_relu(0.2)?;
 * let y = h.concat(&[&skip])?;
 * let loss = y.l1_loss(&target)?;
 * ```
 */

mod activation;
mod loss;
mod matrix;
mod shape;

pub use activation::VarActivationOps;
pub use loss::VarLossOps;
pub use matrix::VarMatrixOps;
pub use shape::VarShapeOps;
