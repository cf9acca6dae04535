/*
 * @Description  : Var 形状变换扩展 trait
 */

use crate::nn::{GraphError, Var};

/// 形状变换扩展 trait
///
/// # 使用示例
/// ```ignore
/// let flat = bottleneck.reshape(&[batch, 512])?;
/// let joined = decoder_out.concat(&[&skip])?;   // 沿通道拼接
/// ```
pub trait VarShapeOps {
    /// 改变形状（元素总数不变）
    fn reshape(&self, shape: &[usize]) -> Result<Var, GraphError>;

    /// 把`self`与`others`依次沿最后一维拼接
    fn concat(&self, others: &[&Var]) -> Result<Var, GraphError>;
}

impl VarShapeOps for Var {
    fn reshape(&self, shape: &[usize]) -> Result<Var, GraphError> {
        let id = self
            .graph()
            .borrow_mut()
            .new_reshape_node(self.node_id(), shape, None)?;
        Ok(self.wrap(id))
    }

    fn concat(&self, others: &[&Var]) -> Result<Var, GraphError> {
        let mut ids = Vec::with_capacity(others.len() + 1);
        ids.push(self.node_id());
        for other in others {
            self.check_same_graph(other)?;
            ids.push(other.node_id());
        }
        let id = self.graph().borrow_mut().new_concat_node(&ids, None)?;
        Ok(self.wrap(id))
    }
}
