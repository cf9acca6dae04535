/*
 * @Description  : GraphInner train/eval 模式
 */

use super::GraphInner;
use crate::nn::nodes::TraitNode;

impl GraphInner {
    pub fn set_train_mode(&mut self) {
        self.set_mode(false);
    }

    pub fn set_eval_mode(&mut self) {
        self.set_mode(true);
    }

    pub const fn is_train_mode(&self) -> bool {
        !self.is_eval_mode
    }

    /// 切换模式会改变Dropout等节点的行为，因此所有中间值一并作废
    fn set_mode(&mut self, eval: bool) {
        if self.is_eval_mode == eval {
            return;
        }
        self.is_eval_mode = eval;
        for node in self.nodes.values_mut() {
            node.raw_node_mut().set_training(!eval);
        }
        self.release_intermediate_results();
    }

    /// no_grad 上下文
    pub fn no_grad_scope<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let was_train = self.is_train_mode();
        self.set_eval_mode();
        let result = f(self);
        if was_train {
            self.set_train_mode();
        }
        result
    }
}
