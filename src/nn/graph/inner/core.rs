/*
 * @Description  : GraphInner 核心操作 + 前向传播
 */

use super::super::error::GraphError;
use super::GraphInner;
use crate::nn::NodeId;
use crate::nn::nodes::{NodeHandle, TraitNode};
use crate::tensor::Tensor;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};

impl GraphInner {
    // ========== 创建 ==========

    pub fn new() -> Self {
        Self::with_name_and_rng("default_graph", StdRng::from_entropy())
    }

    /// 创建一个带固定种子的计算图（确保可重复性）
    pub fn new_with_seed(seed: u64) -> Self {
        Self::with_name_and_seed("default_graph", seed)
    }

    /// 创建一个带名称和固定种子的计算图
    pub fn with_name_and_seed(name: &str, seed: u64) -> Self {
        Self::with_name_and_rng(name, StdRng::seed_from_u64(seed))
    }

    fn with_name_and_rng(name: &str, rng: StdRng) -> Self {
        Self {
            name: name.to_string(),
            nodes: HashMap::new(),
            forward_edges: HashMap::new(),
            backward_edges: HashMap::new(),
            node_names: HashSet::new(),
            next_id: 0,
            is_eval_mode: false,
            rng,
        }
    }

    // ========== 基础访问器 ==========

    /// 设置/重置图的随机种子
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes_count(&self) -> usize {
        self.nodes.len()
    }

    pub(in crate::nn) fn get_node(&self, id: NodeId) -> Result<&NodeHandle, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(in crate::nn) fn get_node_mut(&mut self, id: NodeId) -> Result<&mut NodeHandle, GraphError> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(in crate::nn) fn get_nodes(&self, ids: &[NodeId]) -> Result<Vec<&NodeHandle>, GraphError> {
        ids.iter().map(|&id| self.get_node(id)).collect()
    }

    pub fn get_node_parents(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        // 先检查节点是否存在
        let _ = self.get_node(id)?;
        Ok(self.backward_edges.get(&id).cloned().unwrap_or_default())
    }

    pub fn get_node_children(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let _ = self.get_node(id)?;
        Ok(self.forward_edges.get(&id).cloned().unwrap_or_default())
    }

    pub fn get_node_name(&self, id: NodeId) -> Result<&str, GraphError> {
        Ok(self.get_node(id)?.name())
    }

    pub fn get_node_value_expected_shape(&self, id: NodeId) -> Result<&[usize], GraphError> {
        Ok(self.get_node(id)?.value_expected_shape())
    }

    pub fn has_node_value(&self, id: NodeId) -> Result<bool, GraphError> {
        Ok(self.get_node(id)?.has_value())
    }

    pub fn get_node_value(&self, id: NodeId) -> Result<Option<&Tensor>, GraphError> {
        Ok(self.get_node(id)?.value())
    }

    /// 设置叶子节点（输入/参数）的值，并作废其所有后代的缓存值
    pub fn set_node_value(&mut self, id: NodeId, value: Option<&Tensor>) -> Result<(), GraphError> {
        let node = self.get_node_mut(id)?;
        if !node.is_leaf() {
            return Err(GraphError::InvalidOperation(format!(
                "{node}不是输入/参数节点，其值只能通过前向传播计算"
            )));
        }
        node.set_value(value.cloned())?;
        self.invalidate_descendants(id);
        Ok(())
    }

    pub fn get_node_grad(&self, id: NodeId) -> Result<Option<&Tensor>, GraphError> {
        let node = self.get_node(id)?;
        if !node.is_parameter() {
            return Err(GraphError::InvalidOperation(format!(
                "{node}不是参数节点，不持有梯度"
            )));
        }
        Ok(node.grad())
    }

    /// 名称以`prefix`开头的参数节点，按创建顺序排列
    pub fn parameters_with_prefix(&self, prefix: &str) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.is_parameter() && node.name().starts_with(prefix))
            .map(NodeHandle::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// 所有参数节点，按创建顺序排列
    pub fn get_trainable_nodes(&self) -> Vec<NodeId> {
        self.parameters_with_prefix("")
    }

    // ========== ID/名称生成 ==========

    pub(in crate::nn::graph) fn generate_valid_node_id(&mut self) -> NodeId {
        // 先递增再返回，所以第一个节点 ID 是 1
        self.next_id += 1;
        NodeId(self.next_id)
    }

    pub(in crate::nn::graph) fn check_duplicate_node_name(&self, name: &str) -> Result<(), GraphError> {
        if self.node_names.contains(name) {
            return Err(GraphError::DuplicateNodeName(format!(
                "节点{}在图{}中重复",
                name,
                self.name()
            )));
        }
        Ok(())
    }

    pub(in crate::nn::graph) fn generate_valid_new_node_name(
        &self,
        base_name: &str,
        node_type: &str,
    ) -> Result<String, GraphError> {
        if !base_name.is_empty() {
            self.check_duplicate_node_name(base_name)?;
            return Ok(base_name.to_string());
        }

        let prefix = node_type.to_lowercase();
        let mut counter = 1;
        loop {
            let name = format!("{prefix}_{counter}");
            if !self.node_names.contains(&name) {
                return Ok(name);
            }
            counter += 1;
        }
    }

    // ========== 缓存失效 ==========

    /// 清除`id`所有后代的值。遇到本就无值的节点即停止（其后代必然也无值）
    pub(in crate::nn::graph) fn invalidate_descendants(&mut self, id: NodeId) {
        let mut stack = self.forward_edges.get(&id).cloned().unwrap_or_default();
        while let Some(child) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&child) {
                if node.has_value() {
                    node.clear_value();
                    if let Some(grand_children) = self.forward_edges.get(&child) {
                        stack.extend(grand_children.iter().copied());
                    }
                }
            }
        }
    }

    /// 清除所有非叶子节点的值
    pub(in crate::nn::graph) fn release_intermediate_results(&mut self) {
        for node in self.nodes.values_mut() {
            if !node.is_leaf() {
                node.clear_value();
            }
        }
    }

    // ========== 前向传播 ==========

    /// 计算`node_id`的值：只重算其祖先中没有缓存值的节点
    pub fn forward(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        let order = self.pending_forward_order(node_id)?;
        for id in order {
            self.forward_node_internal(id)?;
        }
        Ok(())
    }

    /// 后序DFS：父节点总在子节点之前；已有值的节点连同其祖先一并剪掉
    fn pending_forward_order(&self, target: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(target, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            let node = self.get_node(id)?;
            if node.has_value() {
                continue;
            }
            if node.is_leaf() {
                return Err(GraphError::InvalidOperation(format!(
                    "{node}的值应通过 set_value 设置，前向传播时它仍没有值"
                )));
            }
            stack.push((id, true));
            for parent in self.get_node_parents(id)?.into_iter().rev() {
                if !visited.contains(&parent) {
                    stack.push((parent, false));
                }
            }
        }
        Ok(order)
    }

    fn forward_node_internal(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        let parent_ids = self.get_node_parents(node_id)?;
        // 暂时取出节点，以便同时借用父节点的值
        let mut node = self
            .nodes
            .remove(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let result = self
            .calc_value_with_parents(&mut node, &parent_ids)
            .and_then(|value| node.set_value(Some(value)));
        self.nodes.insert(node_id, node);
        result
    }

    fn calc_value_with_parents(
        &self,
        node: &mut NodeHandle,
        parent_ids: &[NodeId],
    ) -> Result<Tensor, GraphError> {
        let parents = parent_ids
            .iter()
            .map(|&pid| {
                let parent = self.get_node(pid)?;
                parent.value().ok_or_else(|| {
                    GraphError::ComputationError(format!(
                        "{node}的父节点{parent}没有值。不该触及本错误，否则说明crate代码有问题"
                    ))
                })
            })
            .collect::<Result<Vec<&Tensor>, GraphError>>()?;
        node.raw_node_mut().calc_value_by_parents(&parents)
    }

    /// 节点原始类型（供测试与统计）
    pub(in crate::nn) fn node_type_name(&self, id: NodeId) -> Result<&'static str, GraphError> {
        Ok(self.get_node(id)?.raw_node().type_name())
    }
}
