/*
 * @Description  : Linear (全连接) 层：output = x · W + b
 *
 * 输入 [batch, in_features]，输出 [batch, out_features]
 */

use super::WEIGHT_INIT;
use crate::nn::{Graph, GraphError, Init, Module, Var, VarMatrixOps};

pub struct Linear {
    /// [in_features, out_features]
    weights: Var,
    /// [out_features]
    bias: Var,
}

impl Linear {
    pub fn new(
        graph: &Graph,
        in_features: usize,
        out_features: usize,
        name: &str,
    ) -> Result<Self, GraphError> {
        let weights = graph.parameter(
            &[in_features, out_features],
            WEIGHT_INIT,
            &format!("{name}/weights"),
        )?;
        let bias = graph.parameter(&[out_features], Init::Zeros, &format!("{name}/bias"))?;
        Ok(Self { weights, bias })
    }

    pub fn forward(&self, x: &Var) -> Result<Var, GraphError> {
        x.matmul(&self.weights)?.bias_add(&self.bias)
    }
}

impl Module for Linear {
    fn parameters(&self) -> Vec<Var> {
        vec![self.weights.clone(), self.bias.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn test_linear_forward_with_zero_bias() {
        let graph = Graph::new_with_seed(4);
        let x = graph.input(&Tensor::ones(&[2, 3])).unwrap();
        let fc = Linear::new(&graph, 3, 5, "head").unwrap();
        let y = fc.forward(&x).unwrap();
        let out = y.eval_value().unwrap();
        assert_eq!(out.shape(), &[2, 5]);
        // 两行输入相同，输出也相同
        assert_eq!(&out.as_slice()[..5], &out.as_slice()[5..]);
        assert_eq!(fc.num_params(), 2);
    }
}
