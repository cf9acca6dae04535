/*
 * @Description  : Module trait 定义
 */

use super::Var;

/// 模块 trait
///
/// # 设计原则
/// - `forward()` **不是** trait 方法（签名各异）
/// - `new()` **不是** trait 方法（参数各异）
/// - `parameters()` 返回 `Vec<Var>`（签名一致，放入 trait）
/// - 模块在创建时分配参数、之后每次`forward`都复用同一组参数，
///   同一个判别器对真/假两路输入各调用一次即实现权重共享
///
/// # 使用示例
///
/// ```ignore
/// struct Head {
///     fc: Linear,
/// }
///
/// impl Module for Head {
///     fn parameters(&self) -> Vec<Var> {
///         self.fc.parameters()
///     }
/// }
/// ```
pub trait Module {
    /// 获取所有可训练参数
    fn parameters(&self) -> Vec<Var>;

    /// 获取参数（Var）个数
    fn num_params(&self) -> usize {
        self.parameters().len()
    }
}
