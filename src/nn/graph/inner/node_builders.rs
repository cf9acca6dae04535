/*
 * @Description  : GraphInner 节点构建方法（new_*_node）
 */

use super::super::error::GraphError;
use super::GraphInner;
use crate::nn::NodeId;
use crate::nn::nodes::raw_node::{
    Add, BatchNorm, BiasAdd, Concat, Conv2d, ConvTranspose2d, Dropout, Input, L1Loss, LeakyReLU,
    MatMul, Parameter, Reshape, ScalarMultiply, Sigmoid, SigmoidCrossEntropy, Tanh,
};
use crate::nn::nodes::{NodeHandle, NodeType, Padding, TraitNode};
use rand::Rng;

impl GraphInner {
    /// 添加节点到列表
    pub(in crate::nn::graph) fn add_node_to_list<T: Into<NodeType>>(
        &mut self,
        raw_node: T,
        name: Option<&str>,
        parents: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let mut raw_node: NodeType = raw_node.into();
        let node_name = self.generate_valid_new_node_name(name.unwrap_or(""), raw_node.type_name())?;
        let node_id = self.generate_valid_node_id();
        raw_node.set_training(self.is_train_mode());

        for &parent_id in parents {
            self.forward_edges.entry(parent_id).or_default().push(node_id);
        }
        self.backward_edges
            .entry(node_id)
            .or_default()
            .extend(parents);

        self.node_names.insert(node_name.clone());
        self.nodes
            .insert(node_id, NodeHandle::new(node_id, &node_name, raw_node));
        Ok(node_id)
    }

    // ========== 叶子节点 ==========

    /// 创建输入节点（值由外部每步喂入）
    pub fn new_input_node(&mut self, shape: &[usize], name: Option<&str>) -> Result<NodeId, GraphError> {
        self.add_node_to_list(Input::new(shape)?, name, &[])
    }

    /// 创建参数节点（值须随后通过`set_node_value`初始化）
    pub fn new_parameter_node(&mut self, shape: &[usize], name: Option<&str>) -> Result<NodeId, GraphError> {
        self.add_node_to_list(Parameter::new(shape)?, name, &[])
    }

    // ========== 卷积 ==========

    pub fn new_conv2d_node(
        &mut self,
        input: NodeId,
        kernel: NodeId,
        stride: usize,
        padding: Padding,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [input, kernel];
        let node = Conv2d::new(&self.get_nodes(&parents)?, stride, padding)?;
        self.add_node_to_list(node, name, &parents)
    }

    pub fn new_conv_transpose2d_node(
        &mut self,
        input: NodeId,
        kernel: NodeId,
        stride: usize,
        padding: Padding,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [input, kernel];
        let node = ConvTranspose2d::new(&self.get_nodes(&parents)?, stride, padding)?;
        self.add_node_to_list(node, name, &parents)
    }

    pub fn new_batch_norm_node(
        &mut self,
        input: NodeId,
        gamma: NodeId,
        beta: NodeId,
        epsilon: f32,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [input, gamma, beta];
        let node = BatchNorm::new(&self.get_nodes(&parents)?, epsilon)?;
        self.add_node_to_list(node, name, &parents)
    }

    // ========== 逐元素/形状 ==========

    pub fn new_add_node(&mut self, parents: &[NodeId], name: Option<&str>) -> Result<NodeId, GraphError> {
        let node = Add::new(&self.get_nodes(parents)?)?;
        self.add_node_to_list(node, name, parents)
    }

    pub fn new_bias_add_node(
        &mut self,
        input: NodeId,
        bias: NodeId,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [input, bias];
        let node = BiasAdd::new(&self.get_nodes(&parents)?)?;
        self.add_node_to_list(node, name, &parents)
    }

    pub fn new_concat_node(&mut self, parents: &[NodeId], name: Option<&str>) -> Result<NodeId, GraphError> {
        let node = Concat::new(&self.get_nodes(parents)?)?;
        self.add_node_to_list(node, name, parents)
    }

    /// Dropout的随机源由图的RNG派生，保证同一种子下可复现
    pub fn new_dropout_node(
        &mut self,
        input: NodeId,
        keep_prob: f32,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let seed: u64 = self.rng.r#gen();
        let node = Dropout::new(&self.get_nodes(&[input])?, keep_prob, seed)?;
        self.add_node_to_list(node, name, &[input])
    }

    pub fn new_leaky_relu_node(
        &mut self,
        input: NodeId,
        negative_slope: f32,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let node = LeakyReLU::new(&self.get_nodes(&[input])?, negative_slope)?;
        self.add_node_to_list(node, name, &[input])
    }

    pub fn new_mat_mul_node(
        &mut self,
        left: NodeId,
        right: NodeId,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [left, right];
        let node = MatMul::new(&self.get_nodes(&parents)?)?;
        self.add_node_to_list(node, name, &parents)
    }

    pub fn new_reshape_node(
        &mut self,
        input: NodeId,
        shape: &[usize],
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let node = Reshape::new(&self.get_nodes(&[input])?, shape)?;
        self.add_node_to_list(node, name, &[input])
    }

    pub fn new_scalar_multiply_node(
        &mut self,
        input: NodeId,
        scalar: f32,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let node = ScalarMultiply::new(&self.get_nodes(&[input])?, scalar)?;
        self.add_node_to_list(node, name, &[input])
    }

    pub fn new_sigmoid_node(&mut self, input: NodeId, name: Option<&str>) -> Result<NodeId, GraphError> {
        let node = Sigmoid::new(&self.get_nodes(&[input])?)?;
        self.add_node_to_list(node, name, &[input])
    }

    pub fn new_tanh_node(&mut self, input: NodeId, name: Option<&str>) -> Result<NodeId, GraphError> {
        let node = Tanh::new(&self.get_nodes(&[input])?)?;
        self.add_node_to_list(node, name, &[input])
    }

    // ========== 损失 ==========

    pub fn new_l1_loss_node(
        &mut self,
        input: NodeId,
        target: NodeId,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [input, target];
        let node = L1Loss::new(&self.get_nodes(&parents)?)?;
        self.add_node_to_list(node, name, &parents)
    }

    pub fn new_sigmoid_cross_entropy_node(
        &mut self,
        logits: NodeId,
        labels: NodeId,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [logits, labels];
        let node = SigmoidCrossEntropy::new(&self.get_nodes(&parents)?)?;
        self.add_node_to_list(node, name, &parents)
    }
}
