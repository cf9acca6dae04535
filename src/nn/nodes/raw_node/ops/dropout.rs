/*
 * @Description  : Dropout节点（inverted dropout）
 *
 * 训练模式下按保留概率`keep_prob`随机置零，保留的元素放大`1/keep_prob`；
 * 评估模式下为恒等映射。掩码在前向时生成并留到反向使用，
 * 因此同一次前向的值与梯度总是对应同一个掩码。
 */

use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub(in crate::nn) struct Dropout {
    shape: Vec<usize>,
    keep_prob: f32,
    training: bool,
    rng: StdRng,
    /// 已含`1/keep_prob`缩放的掩码；评估模式下为None
    mask: Option<Tensor>,
}

impl Dropout {
    pub(in crate::nn) fn new(parents: &[&NodeHandle], keep_prob: f32, seed: u64) -> Result<Self, GraphError> {
        if parents.len() != 1 {
            return Err(GraphError::InvalidOperation(
                "Dropout节点只需要1个父节点".to_string(),
            ));
        }
        if !(keep_prob > 0.0 && keep_prob <= 1.0) {
            return Err(GraphError::InvalidOperation(format!(
                "Dropout的保留概率须在(0, 1]内，但得到: {keep_prob}"
            )));
        }
        Ok(Self {
            shape: parents[0].value_expected_shape().to_vec(),
            keep_prob,
            training: true,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        })
    }
}

impl TraitNode for Dropout {
    fn type_name(&self) -> &'static str {
        "Dropout"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        if !self.training {
            self.mask = None;
            return Ok(parents[0].clone());
        }
        let keep = self.keep_prob;
        let scale = 1.0 / keep;
        let data: Vec<f32> = (0..parents[0].size())
            .map(|_| if self.rng.r#gen::<f32>() < keep { scale } else { 0.0 })
            .collect();
        let mask = Tensor::from_vec(data, &self.shape);
        let out = parents[0] * &mask;
        self.mask = Some(mask);
        Ok(out)
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(match &self.mask {
            Some(mask) => upstream_grad * mask,
            None => upstream_grad.clone(),
        })
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}
