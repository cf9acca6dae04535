/*
 * @Description  : GraphInner VJP 反向传播
 *
 * 只沿“目标参数 → 损失”之间的路径传播：判别器更新时不会为生成器参数计算梯度，
 * 反之亦然。中间节点的梯度只在本次反向传播内临时存在，用完即释放；
 * 目标参数的梯度累加到其节点上，由优化器读取并清零。
 */

use super::super::error::GraphError;
use super::GraphInner;
use crate::nn::NodeId;
use crate::nn::nodes::TraitNode;
use crate::tensor::Tensor;
use std::collections::{HashMap, HashSet};

impl GraphInner {
    // ========== VJP 反向传播核心 ==========

    /// 反向传播：以`loss`为起点，只把梯度累加到`targets`这些参数上
    ///
    /// 要求`loss`已前向计算且为标量；返回损失的标量值。
    pub fn backward_for(&mut self, loss: NodeId, targets: &[NodeId]) -> Result<f32, GraphError> {
        let loss_node = self.get_node(loss)?;
        let loss_value = loss_node.value().ok_or_else(|| {
            GraphError::ComputationError(format!("损失{loss_node}没有值，请先执行 forward"))
        })?;
        let loss_scalar = loss_value.get_data_number().ok_or_else(|| {
            GraphError::InvalidOperation(format!(
                "反向传播要求损失为标量，但得到 {:?}",
                loss_value.shape()
            ))
        })?;
        if !self.is_train_mode() {
            log::warn!("在 eval 模式下调用 backward，这通常是误用");
        }
        for &target in targets {
            let node = self.get_node(target)?;
            if !node.is_parameter() {
                return Err(GraphError::InvalidOperation(format!(
                    "反向传播的目标{node}不是参数节点"
                )));
            }
        }

        let relevant = self.nodes_between(targets, loss)?;
        let order = self.topological_sort_backward(loss, &relevant)?;

        let mut grads: HashMap<NodeId, Tensor> = HashMap::new();
        grads.insert(loss, Tensor::ones(loss_value.shape()));

        for node_id in order {
            let Some(upstream) = grads.remove(&node_id) else {
                continue;
            };
            let node = self.get_node(node_id)?;
            if node.is_parameter() {
                self.get_node_mut(node_id)?.accumulate_grad(upstream);
                continue;
            }

            let parent_ids = self.get_node_parents(node_id)?;
            let value = node.value().ok_or_else(|| {
                GraphError::ComputationError(format!("{node}没有值，无法反向传播"))
            })?;
            let parent_values = parent_ids
                .iter()
                .map(|&pid| {
                    self.get_node(pid)?.value().ok_or_else(|| {
                        GraphError::ComputationError(format!("{node}的父节点{pid:?}没有值"))
                    })
                })
                .collect::<Result<Vec<&Tensor>, GraphError>>()?;

            for (index, &parent_id) in parent_ids.iter().enumerate() {
                if !relevant.contains(&parent_id) {
                    continue;
                }
                let grad = node
                    .raw_node()
                    .calc_grad_to_parent(index, &parent_values, value, &upstream)?;
                if grad.shape() != parent_values[index].shape() {
                    return Err(GraphError::ShapeMismatch {
                        expected: parent_values[index].shape().to_vec(),
                        got: grad.shape().to_vec(),
                        message: format!("{node}传给第{index}个父节点的梯度形状有误"),
                    });
                }
                match grads.get_mut(&parent_id) {
                    Some(existing) => *existing += &grad,
                    None => {
                        grads.insert(parent_id, grad);
                    }
                }
            }
        }

        Ok(loss_scalar)
    }

    /// 既是`loss`的祖先（或其本身）、又是某个目标的后代（或其本身）的节点集合
    fn nodes_between(&self, targets: &[NodeId], loss: NodeId) -> Result<HashSet<NodeId>, GraphError> {
        let mut descendants: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = targets.to_vec();
        while let Some(id) = stack.pop() {
            if descendants.insert(id) {
                stack.extend(self.get_node_children(id)?);
            }
        }

        let mut relevant = HashSet::new();
        let mut stack = vec![loss];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if descendants.contains(&id) {
                relevant.insert(id);
            }
            stack.extend(self.get_node_parents(id)?);
        }
        Ok(relevant)
    }

    /// 相关子图上的逆拓扑序（损失在前，参数在后）
    fn topological_sort_backward(
        &self,
        loss: NodeId,
        relevant: &HashSet<NodeId>,
    ) -> Result<Vec<NodeId>, GraphError> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(loss, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !relevant.contains(&id) || !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for parent in self.get_node_parents(id)? {
                if !visited.contains(&parent) {
                    stack.push((parent, false));
                }
            }
        }
        order.reverse();
        Ok(order)
    }

    /// 清零给定参数的梯度
    pub fn clear_grads(&mut self, params: &[NodeId]) -> Result<(), GraphError> {
        for &id in params {
            self.get_node_mut(id)?.clear_grad();
        }
        Ok(())
    }
}
