/*
 * @Description  : 节点句柄：图中每个节点的通用状态（id、名称、值、梯度），
 *                 具体的运算逻辑委托给内部的raw_node。
 */

use super::raw_node::{NodeType, TraitNode};
use crate::nn::GraphError;
use crate::tensor::Tensor;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

pub(in crate::nn) struct NodeHandle {
    id: NodeId,
    name: String,
    raw_node: NodeType,
    /// 本节点的值；`None`表示尚未计算或已被上游的改动作废
    value: Option<Tensor>,
    /// 仅参数节点会长期持有梯度，中间节点的梯度只在反向传播期间临时存在
    grad: Option<Tensor>,
}

impl NodeHandle {
    pub(in crate::nn) fn new<T: Into<NodeType>>(id: NodeId, name: &str, raw_node: T) -> Self {
        Self {
            id,
            name: name.to_string(),
            raw_node: raw_node.into(),
            value: None,
            grad: None,
        }
    }

    pub(in crate::nn) const fn id(&self) -> NodeId {
        self.id
    }

    pub(in crate::nn) fn name(&self) -> &str {
        &self.name
    }

    pub(in crate::nn) const fn raw_node(&self) -> &NodeType {
        &self.raw_node
    }

    pub(in crate::nn) fn raw_node_mut(&mut self) -> &mut NodeType {
        &mut self.raw_node
    }

    pub(in crate::nn) fn value_expected_shape(&self) -> &[usize] {
        self.raw_node.value_expected_shape()
    }

    pub(in crate::nn) const fn value(&self) -> Option<&Tensor> {
        self.value.as_ref()
    }

    pub(in crate::nn) const fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub(in crate::nn) const fn is_leaf(&self) -> bool {
        matches!(self.raw_node, NodeType::Input(_) | NodeType::Parameter(_))
    }

    pub(in crate::nn) const fn is_parameter(&self) -> bool {
        matches!(self.raw_node, NodeType::Parameter(_))
    }

    /// 设置值，形状须与节点创建时确定的形状一致
    pub(in crate::nn) fn set_value(&mut self, value: Option<Tensor>) -> Result<(), GraphError> {
        if let Some(ref v) = value {
            if v.shape() != self.value_expected_shape() {
                return Err(GraphError::ShapeMismatch {
                    expected: self.value_expected_shape().to_vec(),
                    got: v.shape().to_vec(),
                    message: format!("{self}的值形状与创建时不一致"),
                });
            }
        }
        self.value = value;
        Ok(())
    }

    pub(in crate::nn) fn clear_value(&mut self) {
        self.value = None;
    }

    pub(in crate::nn) const fn grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    /// 累加梯度（PyTorch语义：不清零就一直累加）
    pub(in crate::nn) fn accumulate_grad(&mut self, grad: Tensor) {
        match self.grad.as_mut() {
            Some(existing) => *existing += &grad,
            None => self.grad = Some(grad),
        }
    }

    pub(in crate::nn) fn clear_grad(&mut self) {
        self.grad = None;
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "节点[id={}, name={}, type={}]",
            self.id.0,
            self.name,
            self.raw_node.type_name()
        )
    }
}
