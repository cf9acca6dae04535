/*
 * @Description  : Graph 句柄（用户级 API）
 */

use super::error::GraphError;
use super::inner::GraphInner;
use crate::nn::NodeId;
use crate::nn::var::{Init, Var};
use crate::tensor::Tensor;
use std::cell::RefCell;
use std::rc::Rc;

/// Graph - 计算图句柄（PyTorch 风格用户 API）
///
/// # 设计原则
/// - 是 `Rc<RefCell<GraphInner>>` 的薄封装
/// - Clone 语义：多个 Graph 引用同一个 GraphInner
/// - 创建的 Var 自动持有图引用
#[derive(Clone)]
pub struct Graph {
    inner: Rc<RefCell<GraphInner>>,
}

impl Graph {
    // ==================== 创建 ====================

    /// 创建新图
    pub fn new() -> Self {
        Self::from_inner(GraphInner::new())
    }

    /// 创建带种子的图（用于确定性训练）
    pub fn new_with_seed(seed: u64) -> Self {
        Self::from_inner(GraphInner::new_with_seed(seed))
    }

    /// 从现有 GraphInner 创建句柄
    pub fn from_inner(inner: GraphInner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// 从现有 Rc 创建句柄
    pub(crate) const fn from_rc(inner: Rc<RefCell<GraphInner>>) -> Self {
        Self { inner }
    }

    /// 内部共享引用（供优化器等长期持有图的组件使用）
    pub(crate) const fn inner_rc(&self) -> &Rc<RefCell<GraphInner>> {
        &self.inner
    }

    /// 获取内部 GraphInner 的不可变引用
    pub fn inner(&self) -> std::cell::Ref<'_, GraphInner> {
        self.inner.borrow()
    }

    /// 获取内部 GraphInner 的可变引用
    pub fn inner_mut(&self) -> std::cell::RefMut<'_, GraphInner> {
        self.inner.borrow_mut()
    }

    /// 将 NodeId 包装成 Var
    pub fn wrap_node_id(&self, node_id: NodeId) -> Var {
        Var::new(node_id, Rc::clone(&self.inner))
    }

    // ==================== 创建变量 ====================

    /// 创建带形状的输入节点（值稍后通过`Var::set_value`喂入）
    pub fn input_shape(&self, shape: &[usize], name: Option<&str>) -> Result<Var, GraphError> {
        let node_id = self.inner.borrow_mut().new_input_node(shape, name)?;
        Ok(self.wrap_node_id(node_id))
    }

    /// 创建输入节点并设置数据
    pub fn input(&self, data: &Tensor) -> Result<Var, GraphError> {
        self.constant_with_name(data, None)
    }

    /// 创建命名输入节点
    pub fn input_named(&self, data: &Tensor, name: &str) -> Result<Var, GraphError> {
        self.constant_with_name(data, Some(name))
    }

    fn constant_with_name(&self, data: &Tensor, name: Option<&str>) -> Result<Var, GraphError> {
        let mut g = self.inner.borrow_mut();
        let node_id = g.new_input_node(data.shape(), name)?;
        g.set_node_value(node_id, Some(data))?;
        Ok(Var::new(node_id, Rc::clone(&self.inner)))
    }

    /// 创建参数节点，用图的随机数生成器初始化
    pub fn parameter(&self, shape: &[usize], init: Init, name: &str) -> Result<Var, GraphError> {
        let mut g = self.inner.borrow_mut();
        let node_id = g.new_parameter_node(shape, Some(name))?;
        let init_data = init.generate_with_rng(shape, &mut g.rng);
        g.set_node_value(node_id, Some(&init_data))?;
        Ok(Var::new(node_id, Rc::clone(&self.inner)))
    }

    /// 名称以`prefix`开头的全部参数（按创建顺序）
    pub fn parameters_with_prefix(&self, prefix: &str) -> Vec<Var> {
        let ids = self.inner.borrow().parameters_with_prefix(prefix);
        ids.into_iter().map(|id| self.wrap_node_id(id)).collect()
    }

    /// 名称以`prefix`开头的参数的标量总数
    pub fn parameter_count(&self, prefix: &str) -> usize {
        self.inner.borrow().parameter_count(prefix)
    }

    /// 参数总数与分组统计（见`GraphInner::describe`）
    pub fn describe(&self, prefixes: &[&str]) -> String {
        self.inner.borrow().describe(prefixes)
    }

    // ==================== 执行 ====================

    /// 前向传播
    pub fn forward(&self, output: &Var) -> Result<(), GraphError> {
        self.inner.borrow_mut().forward(output.node_id())
    }

    /// 反向传播，只把梯度累加到`targets`上，返回损失值
    pub fn backward_for(&self, loss: &Var, targets: &[Var]) -> Result<f32, GraphError> {
        let ids: Vec<NodeId> = targets.iter().map(Var::node_id).collect();
        let mut g = self.inner.borrow_mut();
        // ensure-forward：先执行前向传播
        g.forward(loss.node_id())?;
        g.backward_for(loss.node_id(), &ids)
    }

    // ==================== 训练控制 ====================

    /// 清零给定参数的梯度
    pub fn zero_grad(&self, params: &[Var]) -> Result<(), GraphError> {
        let ids: Vec<NodeId> = params.iter().map(Var::node_id).collect();
        self.inner.borrow_mut().clear_grads(&ids)
    }

    /// 设置训练模式
    pub fn train(&self) {
        self.inner.borrow_mut().set_train_mode();
    }

    /// 设置评估模式
    pub fn eval(&self) {
        self.inner.borrow_mut().set_eval_mode();
    }

    /// 是否处于评估模式
    pub fn is_eval(&self) -> bool {
        !self.inner.borrow().is_train_mode()
    }

    /// 节点总数（权重共享检查会用到）
    pub fn nodes_count(&self) -> usize {
        self.inner.borrow().nodes_count()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
