/*
 * @Description  : Var - 变量句柄，持有图引用，支持链式调用
 */

use super::graph::{Graph, GraphInner};
use super::{GraphError, NodeId};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::rc::Rc;

// ==================== Init 枚举 ====================

/// 参数初始化策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    /// 常数初始化
    Constant(f32),
    /// 全零（偏置、BN的beta）
    Zeros,
    /// 全一
    Ones,
    /// 正态分布（卷积核、全连接权重用N(0, 0.02)，BN的gamma用N(1, 0.02)）
    Normal { mean: f32, std: f32 },
}

impl Init {
    /// 生成初始化后的 Tensor（使用指定的 RNG）
    pub fn generate_with_rng(&self, shape: &[usize], rng: &mut StdRng) -> Tensor {
        match self {
            Self::Constant(v) => Tensor::full(*v, shape),
            Self::Zeros => Tensor::zeros(shape),
            Self::Ones => Tensor::ones(shape),
            Self::Normal { mean, std } => Tensor::normal_with_rng(*mean, *std, shape, rng),
        }
    }
}

// ==================== Var 结构 ====================

/// 变量句柄 - 携带图引用，支持链式调用
///
/// # 设计原则
/// - 持有 `Rc<RefCell<GraphInner>>` 引用
/// - Clone 语义（非 Copy），但开销极低（Rc clone）
///
/// # 使用示例
/// ```ignore
/// let graph = Graph::new_with_seed(42);
/// let x = graph.input_shape(&[1, 256, 256, 3], Some("x"))?;
/// let h = x.conv2d(&kernel, 2, Padding::same(256, 256, (4, 4), 2))?.leaky_relu(0.2)?;
/// let loss = h.l1_loss(&target)?;
/// ```
#[derive(Clone)]
pub struct Var {
    /// 节点 ID
    id: NodeId,
    /// 图引用（用户不可见）
    graph: Rc<RefCell<GraphInner>>,
}

impl std::fmt::Debug for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Var").field("id", &self.id).finish()
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.same_graph(other)
    }
}

impl Var {
    /// 创建新的 Var（内部使用）
    pub(crate) const fn new(id: NodeId, graph: Rc<RefCell<GraphInner>>) -> Self {
        Self { id, graph }
    }

    /// 获取节点 ID
    pub const fn node_id(&self) -> NodeId {
        self.id
    }

    /// 获取内部图引用（供 trait 和内部模块使用）
    pub(crate) const fn graph(&self) -> &Rc<RefCell<GraphInner>> {
        &self.graph
    }

    /// 基于本Var的图创建新的Var
    pub(crate) fn wrap(&self, id: NodeId) -> Self {
        Self::new(id, Rc::clone(&self.graph))
    }

    /// 检查两个 Var 是否来自同一个 Graph
    pub fn same_graph(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.graph, &other.graph)
    }

    /// 两个 Var 须来自同一个 Graph
    pub(crate) fn check_same_graph(&self, other: &Self) -> Result<(), GraphError> {
        if self.same_graph(other) {
            Ok(())
        } else {
            Err(GraphError::InvalidOperation(
                "不能对来自不同 Graph 的 Var 进行操作".to_string(),
            ))
        }
    }

    /// 获取 Var 所属的 Graph handle
    pub fn get_graph(&self) -> Graph {
        Graph::from_rc(Rc::clone(&self.graph))
    }

    /// 节点名称
    pub fn name(&self) -> Result<String, GraphError> {
        Ok(self.graph.borrow().get_node_name(self.id)?.to_string())
    }

    /// 获取节点的预期输出形状（节点创建时就已确定）
    pub fn value_expected_shape(&self) -> Result<Vec<usize>, GraphError> {
        Ok(self
            .graph
            .borrow()
            .get_node_value_expected_shape(self.id)?
            .to_vec())
    }

    // ==================== 执行 ====================

    /// 前向传播
    pub fn forward(&self) -> Result<(), GraphError> {
        self.graph.borrow_mut().forward(self.id)
    }

    // ==================== 值访问和设置 ====================

    /// 获取节点的值（克隆的 Tensor）
    pub fn value(&self) -> Result<Option<Tensor>, GraphError> {
        Ok(self.graph.borrow().get_node_value(self.id)?.cloned())
    }

    /// 设置输入/参数节点的值（形状须与创建时一致），其下游缓存随之作废
    pub fn set_value(&self, value: &Tensor) -> Result<(), GraphError> {
        self.graph.borrow_mut().set_node_value(self.id, Some(value))
    }

    /// 前向计算并返回节点值
    pub fn eval_value(&self) -> Result<Tensor, GraphError> {
        self.forward()?;
        self.value()?.ok_or_else(|| {
            GraphError::ComputationError(format!("节点{:?}前向传播后仍没有值", self.id))
        })
    }

    /// 获取标量值（如损失）
    pub fn item(&self) -> Result<f32, GraphError> {
        let value = self.eval_value()?;
        value.get_data_number().ok_or_else(|| {
            GraphError::InvalidOperation(format!("item() 要求标量，但形状为 {:?}", value.shape()))
        })
    }

    /// 获取参数节点的梯度（克隆的 Tensor）
    pub fn grad(&self) -> Result<Option<Tensor>, GraphError> {
        Ok(self.graph.borrow().get_node_grad(self.id)?.cloned())
    }

    // ==================== 组合 ====================

    /// 逐元素相加（形状须一致）
    pub fn try_add(&self, other: &Self) -> Result<Self, GraphError> {
        self.check_same_graph(other)?;
        let id = self
            .graph
            .borrow_mut()
            .new_add_node(&[self.id, other.id], None)?;
        Ok(self.wrap(id))
    }

    /// 乘以固定标量
    pub fn scale(&self, scalar: f32) -> Result<Self, GraphError> {
        let id = self
            .graph
            .borrow_mut()
            .new_scalar_multiply_node(self.id, scalar, None)?;
        Ok(self.wrap(id))
    }
}
