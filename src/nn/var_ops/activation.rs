/*
 * @Description  : Var 激活函数扩展 trait
 */

use crate::nn::{GraphError, Var};

/// 激活函数扩展 trait
///
/// - `relu()`: `ReLU` 激活（解码器）
/// - `leaky_relu(slope)`: `LeakyReLU` 激活（编码器、判别器，slope=0.2）
/// - `sigmoid()`: Sigmoid 激活（判别器真伪输出）
/// - `tanh()`: Tanh 激活（生成器输出）
/// - `dropout(keep_prob)`: 训练模式下随机失活，评估模式下恒等
pub trait VarActivationOps {
    fn relu(&self) -> Result<Var, GraphError>;

    fn leaky_relu(&self, negative_slope: f32) -> Result<Var, GraphError>;

    fn sigmoid(&self) -> Result<Var, GraphError>;

    fn tanh(&self) -> Result<Var, GraphError>;

    fn dropout(&self, keep_prob: f32) -> Result<Var, GraphError>;
}

impl VarActivationOps for Var {
    fn relu(&self) -> Result<Var, GraphError> {
        self.leaky_relu(0.0)
    }

    fn leaky_relu(&self, negative_slope: f32) -> Result<Var, GraphError> {
        let id = self
            .graph()
            .borrow_mut()
            .new_leaky_relu_node(self.node_id(), negative_slope, None)?;
        Ok(self.wrap(id))
    }

    fn sigmoid(&self) -> Result<Var, GraphError> {
        let id = self
            .graph()
            .borrow_mut()
            .new_sigmoid_node(self.node_id(), None)?;
        Ok(self.wrap(id))
    }

    fn tanh(&self) -> Result<Var, GraphError> {
        let id = self.graph().borrow_mut().new_tanh_node(self.node_id(), None)?;
        Ok(self.wrap(id))
    }

    fn dropout(&self, keep_prob: f32) -> Result<Var, GraphError> {
        let id = self
            .graph()
            .borrow_mut()
            .new_dropout_node(self.node_id(), keep_prob, None)?;
        Ok(self.wrap(id))
    }
}
