/*
 * @Description  : 算子单元测试的公共工具：构造占位父节点、数值梯度校验
 */

use crate::nn::nodes::raw_node::{Input, TraitNode};
use crate::nn::nodes::{NodeHandle, NodeId};
use crate::tensor::Tensor;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// 只用于提供形状的占位父节点
pub(super) fn handle(shape: &[usize]) -> NodeHandle {
    NodeHandle::new(NodeId(0), "placeholder", Input::new(shape).unwrap())
}

fn weighted_sum(value: &Tensor, weights: &Tensor) -> f64 {
    value
        .as_slice()
        .iter()
        .zip(weights.as_slice())
        .map(|(&v, &w)| f64::from(v) * f64::from(w))
        .sum()
}

/// 以`L = Σ value * w`（w随机）为目标，用中心差分校验每个父节点的解析梯度
///
/// 每个父节点最多抽查16个元素；容差按`tol * max(1, |解析值|)`计。
pub(super) fn check_grad<N: TraitNode>(mut node: N, parent_shapes: &[&[usize]], tol: f64) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut parents: Vec<Tensor> = parent_shapes
        .iter()
        .map(|s| Tensor::normal_with_rng(0.0, 1.0, s, &mut rng))
        .collect();

    let value = {
        let refs: Vec<&Tensor> = parents.iter().collect();
        node.calc_value_by_parents(&refs).unwrap()
    };
    let weights = Tensor::normal_with_rng(0.0, 1.0, value.shape(), &mut rng);

    let eps = 1e-2f32;
    for idx in 0..parents.len() {
        let analytic = {
            let refs: Vec<&Tensor> = parents.iter().collect();
            node.calc_grad_to_parent(idx, &refs, &value, &weights)
                .unwrap()
        };
        assert_eq!(analytic.shape(), parents[idx].shape());

        let size = parents[idx].size();
        let step = (size / 16).max(1);
        for elem in (0..size).step_by(step) {
            let original = parents[idx].as_slice()[elem];
            let mut eval = |delta: f32| {
                let mut data = parents[idx].to_vec();
                data[elem] = original + delta;
                parents[idx] = Tensor::from_vec(data, parent_shapes[idx]);
                let refs: Vec<&Tensor> = parents.iter().collect();
                let v = node.calc_value_by_parents(&refs).unwrap();
                weighted_sum(&v, &weights)
            };
            let numeric = (eval(eps) - eval(-eps)) / (2.0 * f64::from(eps));
            eval(0.0);

            let got = f64::from(analytic.as_slice()[elem]);
            assert!(
                (got - numeric).abs() <= tol * got.abs().max(1.0),
                "父节点{idx}的第{elem}个元素：解析梯度{got}，数值梯度{numeric}"
            );
        }
    }
}
