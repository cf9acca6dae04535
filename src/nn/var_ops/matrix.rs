/*
 * @Description  : Var 线性运算扩展 trait（卷积、矩阵乘、偏置、批归一化）
 */

use crate::nn::{GraphError, Padding, Var};

/// 线性运算扩展 trait
///
/// 参数（卷积核、权重、偏置、gamma/beta）本身也是 Var，
/// 由各 Layer 创建并持有，从而可在多次调用间共享。
pub trait VarMatrixOps {
    /// [B, K] · [K, M]
    fn matmul(&self, other: &Var) -> Result<Var, GraphError>;

    /// 沿最后一维加偏置
    fn bias_add(&self, bias: &Var) -> Result<Var, GraphError>;

    /// NHWC 卷积，`kernel`为[kH, kW, C_in, C_out]
    fn conv2d(&self, kernel: &Var, stride: usize, padding: Padding) -> Result<Var, GraphError>;

    /// NHWC 转置卷积，`kernel`为[kH, kW, C_out, C_in]
    fn conv_transpose2d(
        &self,
        kernel: &Var,
        stride: usize,
        padding: Padding,
    ) -> Result<Var, GraphError>;

    /// 按通道批归一化（总是使用当前批次统计量）
    fn batch_norm(&self, gamma: &Var, beta: &Var, epsilon: f32) -> Result<Var, GraphError>;
}

impl VarMatrixOps for Var {
    fn matmul(&self, other: &Var) -> Result<Var, GraphError> {
        self.check_same_graph(other)?;
        let id = self
            .graph()
            .borrow_mut()
            .new_mat_mul_node(self.node_id(), other.node_id(), None)?;
        Ok(self.wrap(id))
    }

    fn bias_add(&self, bias: &Var) -> Result<Var, GraphError> {
        self.check_same_graph(bias)?;
        let id = self
            .graph()
            .borrow_mut()
            .new_bias_add_node(self.node_id(), bias.node_id(), None)?;
        Ok(self.wrap(id))
    }

    fn conv2d(&self, kernel: &Var, stride: usize, padding: Padding) -> Result<Var, GraphError> {
        self.check_same_graph(kernel)?;
        let id = self.graph().borrow_mut().new_conv2d_node(
            self.node_id(),
            kernel.node_id(),
            stride,
            padding,
            None,
        )?;
        Ok(self.wrap(id))
    }

    fn conv_transpose2d(
        &self,
        kernel: &Var,
        stride: usize,
        padding: Padding,
    ) -> Result<Var, GraphError> {
        self.check_same_graph(kernel)?;
        let id = self.graph().borrow_mut().new_conv_transpose2d_node(
            self.node_id(),
            kernel.node_id(),
            stride,
            padding,
            None,
        )?;
        Ok(self.wrap(id))
    }

    fn batch_norm(&self, gamma: &Var, beta: &Var, epsilon: f32) -> Result<Var, GraphError> {
        self.check_same_graph(gamma)?;
        self.check_same_graph(beta)?;
        let id = self.graph().borrow_mut().new_batch_norm_node(
            self.node_id(),
            gamma.node_id(),
            beta.node_id(),
            epsilon,
            None,
        )?;
        Ok(self.wrap(id))
    }
}
