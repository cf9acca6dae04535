/*
 * @Author       : 老董
 * @Description  : Adam优化器实现（β2 = 0.999，ε = 1e-8）
 */

use super::Optimizer;
use crate::nn::graph::GraphInner;
use crate::nn::{Graph, GraphError, NodeId, Var};
use crate::tensor::Tensor;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const DEFAULT_BETA2: f32 = 0.999;
pub const DEFAULT_EPSILON: f32 = 1e-8;

/// Adam优化器
///
/// GAN 训练时为生成器和判别器各创建一个，分别绑定各自的参数组：
/// ```ignore
/// let optimizer_d = Adam::new(&graph, &graph.parameters_with_prefix("discriminator"), 0.0002, 0.5)?;
/// let optimizer_g = Adam::new(&graph, &graph.parameters_with_prefix("generator"), 0.0002, 0.5)?;
/// ```
pub struct Adam {
    /// 图引用
    graph: Rc<RefCell<GraphInner>>,
    /// 要优化的参数
    params: Vec<Var>,
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    /// 一阶矩估计
    m: HashMap<NodeId, Tensor>,
    /// 二阶矩估计
    v: HashMap<NodeId, Tensor>,
    /// 时间步（每个优化器实例独立计数）
    t: usize,
}

impl Adam {
    pub fn new(graph: &Graph, params: &[Var], lr: f32, beta1: f32) -> Result<Self, GraphError> {
        Self::with_config(graph, params, lr, beta1, DEFAULT_BETA2, DEFAULT_EPSILON)
    }

    pub fn with_config(
        graph: &Graph,
        params: &[Var],
        lr: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    ) -> Result<Self, GraphError> {
        let graph_rc = Rc::clone(graph.inner_rc());
        for param in params {
            if !Rc::ptr_eq(param.graph(), &graph_rc) {
                return Err(GraphError::InvalidOperation(
                    "Adam 绑定的参数必须来自同一个 Graph".to_string(),
                ));
            }
            if graph.inner().get_node_grad(param.node_id()).is_err() {
                return Err(GraphError::InvalidOperation(format!(
                    "节点{:?}不是参数节点，不能交给优化器",
                    param.node_id()
                )));
            }
        }
        Ok(Self {
            graph: graph_rc,
            params: params.to_vec(),
            lr,
            beta1,
            beta2,
            epsilon,
            m: HashMap::new(),
            v: HashMap::new(),
            t: 0,
        })
    }

    /// 绑定的参数
    pub fn params(&self) -> &[Var] {
        &self.params
    }

    /// 已执行的更新次数
    pub const fn steps(&self) -> usize {
        self.t
    }
}

impl Optimizer for Adam {
    fn zero_grad(&mut self) -> Result<(), GraphError> {
        let ids: Vec<NodeId> = self.params.iter().map(Var::node_id).collect();
        self.graph.borrow_mut().clear_grads(&ids)
    }

    /// 没有梯度的参数（不在本次损失的子图上）保持不变
    ///
    /// ε加在√v̂上（即Adam论文的写法）；TF的`AdamOptimizer`把偏差修正并入学习率、ε加在√v上，
    /// 两者只在梯度接近0时有可见差别
    fn step(&mut self) -> Result<(), GraphError> {
        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        let mut g = self.graph.borrow_mut();
        for param in &self.params {
            let node_id = param.node_id();
            let Some(gradient) = g.get_node_grad(node_id)?.cloned() else {
                continue;
            };
            let current_value = g.get_node_value(node_id)?.cloned().ok_or_else(|| {
                GraphError::ComputationError(format!("参数{node_id:?}没有值，无法更新"))
            })?;

            // m = β1 * m + (1 - β1) * g
            let m = self
                .m
                .entry(node_id)
                .or_insert_with(|| Tensor::zeros(gradient.shape()));
            *m *= self.beta1;
            *m += &(&gradient * (1.0 - self.beta1));

            // v = β2 * v + (1 - β2) * g²
            let v = self
                .v
                .entry(node_id)
                .or_insert_with(|| Tensor::zeros(gradient.shape()));
            *v *= self.beta2;
            *v += &(&(&gradient * &gradient) * (1.0 - self.beta2));

            // θ = θ - α * m̂ / (√v̂ + ε)
            let m_hat = &*m / bias_correction1;
            let v_hat = &*v / bias_correction2;
            let update = &m_hat / &(&v_hat.sqrt() + self.epsilon);
            let new_value = current_value - self.lr * &update;

            // 参数值改变会作废下游缓存
            g.set_node_value(node_id, Some(&new_value))?;
        }
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn reset(&mut self) {
        self.m.clear();
        self.v.clear();
        self.t = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::VarLossOps;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_adam_first_step_moves_by_lr() {
        // 第一步经偏差修正后 m̂/√v̂ = sign(g)，参数恰好移动 lr
        let graph = Graph::new_with_seed(7);
        let w = graph
            .parameter(&[1, 2], crate::nn::Init::Constant(1.0), "w")
            .unwrap();
        let target = graph.input(&Tensor::new(&[0.0, 3.0], &[1, 2])).unwrap();
        let loss = w.l1_loss(&target).unwrap();

        let mut adam = Adam::new(&graph, &[w.clone()], 0.1, 0.5).unwrap();
        adam.zero_grad().unwrap();
        graph.backward_for(&loss, adam.params()).unwrap();
        adam.step().unwrap();

        let value = w.value().unwrap().unwrap();
        assert_abs_diff_eq!(value.as_slice()[0], 0.9, epsilon = 1e-5);
        assert_abs_diff_eq!(value.as_slice()[1], 1.1, epsilon = 1e-5);
        assert_eq!(adam.steps(), 1);
        // 参数更新后损失需要重新计算
        assert!(!graph.inner().has_node_value(loss.node_id()).unwrap());
    }

    #[test]
    fn test_adam_epsilon_added_to_corrected_second_moment() {
        // g = 1e-8 = ε：第一步 m̂ = g、√v̂ = g，更新量为 lr·g/(g+ε) = lr/2
        let graph = Graph::new_with_seed(7);
        let w = graph.parameter(&[1, 1], crate::nn::Init::Ones, "w").unwrap();
        let target = graph.input(&Tensor::zeros(&[1, 1])).unwrap();
        let loss = w.scale(1e-8).unwrap().l1_loss(&target).unwrap();

        let mut adam = Adam::new(&graph, &[w.clone()], 0.1, 0.5).unwrap();
        graph.backward_for(&loss, adam.params()).unwrap();
        adam.step().unwrap();
        assert_abs_diff_eq!(w.value().unwrap().unwrap().as_slice()[0], 0.95, epsilon = 1e-4);
    }

    #[test]
    fn test_adam_skips_params_without_grad() {
        let graph = Graph::new_with_seed(7);
        let a = graph.parameter(&[1, 1], crate::nn::Init::Ones, "a").unwrap();
        let b = graph.parameter(&[1, 1], crate::nn::Init::Ones, "b").unwrap();
        let target = graph.input(&Tensor::zeros(&[1, 1])).unwrap();
        let loss = a.l1_loss(&target).unwrap();

        let mut adam = Adam::new(&graph, &[a.clone(), b.clone()], 0.01, 0.5).unwrap();
        graph.backward_for(&loss, &[a.clone()]).unwrap();
        adam.step().unwrap();
        assert_abs_diff_eq!(a.value().unwrap().unwrap().as_slice()[0], 0.99, epsilon = 1e-5);
        assert_eq!(b.value().unwrap().unwrap().as_slice()[0], 1.0);
    }

    #[test]
    fn test_adam_rejects_non_parameter() {
        let graph = Graph::new_with_seed(7);
        let x = graph.input(&Tensor::zeros(&[1, 1])).unwrap();
        assert!(Adam::new(&graph, &[x], 0.01, 0.5).is_err());
    }

    #[test]
    fn test_adam_zero_grad_clears() {
        let graph = Graph::new_with_seed(7);
        let a = graph.parameter(&[1, 1], crate::nn::Init::Ones, "a").unwrap();
        let target = graph.input(&Tensor::zeros(&[1, 1])).unwrap();
        let loss = a.l1_loss(&target).unwrap();
        let mut adam = Adam::new(&graph, &[a.clone()], 0.01, 0.5).unwrap();
        graph.backward_for(&loss, adam.params()).unwrap();
        assert!(a.grad().unwrap().is_some());
        adam.zero_grad().unwrap();
        assert!(a.grad().unwrap().is_none());
    }
}
