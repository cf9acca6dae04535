/*
 * @Author       : 老董
 * @Description  : 优化器模块，PyTorch 风格：优化器绑定一组参数 Var，只更新这组参数
 */

mod adam;

pub use adam::Adam;

use crate::nn::GraphError;

/// 优化器 trait
///
/// # 使用示例
/// ```ignore
/// let mut optimizer = Adam::new(&graph, &discriminator.parameters(), 0.0002, 0.5)?;
/// optimizer.zero_grad()?;
/// graph.backward_for(&loss, optimizer.params())?;
/// optimizer.step()?;
/// ```
pub trait Optimizer {
    /// 清零所有绑定参数的梯度
    fn zero_grad(&mut self) -> Result<(), GraphError>;

    /// 用已累积的梯度更新绑定参数
    fn step(&mut self) -> Result<(), GraphError>;

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, lr: f32);

    /// 重置累积状态（如 Adam 的动量）
    fn reset(&mut self);
}
