/*
 * @Description  : Var 损失函数扩展 trait
 */

use crate::nn::{GraphError, Var};

/// 损失函数扩展 trait，结果均为标量损失节点 [1, 1]
///
/// # 使用示例
/// ```ignore
/// let gan_loss = predict_fake.sigmoid_cross_entropy(&ones)?;
/// let l1_loss = outputs.l1_loss(&targets)?;
/// ```
pub trait VarLossOps {
    /// 平均绝对误差
    fn l1_loss(&self, target: &Var) -> Result<Var, GraphError>;

    /// Sigmoid 交叉熵（`self`视为logits），均值归约
    fn sigmoid_cross_entropy(&self, labels: &Var) -> Result<Var, GraphError>;
}

impl VarLossOps for Var {
    fn l1_loss(&self, target: &Var) -> Result<Var, GraphError> {
        self.check_same_graph(target)?;
        let id = self
            .graph()
            .borrow_mut()
            .new_l1_loss_node(self.node_id(), target.node_id(), None)?;
        Ok(self.wrap(id))
    }

    fn sigmoid_cross_entropy(&self, labels: &Var) -> Result<Var, GraphError> {
        self.check_same_graph(labels)?;
        let id = self.graph().borrow_mut().new_sigmoid_cross_entropy_node(
            self.node_id(),
            labels.node_id(),
            None,
        )?;
        Ok(self.wrap(id))
    }
}
