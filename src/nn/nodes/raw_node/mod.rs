/*
 * @Description  : 原始节点：只负责“怎么算”（前向值与对父节点的VJP），
 *                 节点的id/名称/值/梯度等通用状态由`NodeHandle`持有。
 */

mod input;
mod loss;
mod ops;
mod parameter;

pub(in crate::nn) use input::Input;
pub(in crate::nn) use loss::*;
pub(in crate::nn) use ops::*;
pub use ops::{Padding, same_padding};
pub(in crate::nn) use parameter::Parameter;

use crate::nn::GraphError;
use crate::tensor::Tensor;
use enum_dispatch::enum_dispatch;

#[enum_dispatch]
pub(in crate::nn) enum NodeType {
    Input(Input),
    Parameter(Parameter),
    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓算子↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    Add(Add),
    BatchNorm(BatchNorm),
    BiasAdd(BiasAdd),
    Concat(Concat),
    Conv2d(Conv2d),
    ConvTranspose2d(ConvTranspose2d),
    Dropout(Dropout),
    LeakyReLU(LeakyReLU),
    MatMul(MatMul),
    Reshape(Reshape),
    ScalarMultiply(ScalarMultiply),
    Sigmoid(Sigmoid),
    Tanh(Tanh),
    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓损失↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    L1Loss(L1Loss),
    SigmoidCrossEntropy(SigmoidCrossEntropy),
}

#[enum_dispatch(NodeType)]
pub(in crate::nn) trait TraitNode {
    /// 节点类型名，用于自动命名和错误信息
    fn type_name(&self) -> &'static str;

    /// 节点创建时即确定的输出形状
    fn value_expected_shape(&self) -> &[usize];

    /// 根据父节点的值计算本节点的值（父节点的值已由Graph预先算好）
    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError>;

    /// 计算损失对第`parent_index`个父节点的梯度（VJP）
    ///
    /// - `parents`: 各父节点的值
    /// - `value`: 本节点前向得到的值
    /// - `upstream_grad`: 损失对本节点的梯度，形状与`value`一致
    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        parents: &[&Tensor],
        value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError>;

    /// 训练/评估模式切换，默认无影响（目前只有Dropout关心）
    fn set_training(&mut self, _training: bool) {}
}

/// 叶子节点（输入、参数）共用：其值只能被设置，不能由父节点计算
fn leaf_cannot_compute(type_name: &str) -> GraphError {
    GraphError::InvalidOperation(format!(
        "{type_name}节点的值只能被直接设置，不能通过前向传播计算"
    ))
}
