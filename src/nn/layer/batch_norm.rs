/*
 * @Description  : BatchNorm 层：gamma ~ N(1, 0.02)，beta = 0，eps = 1e-5
 */

use crate::nn::nodes::BATCH_NORM_EPSILON;
use crate::nn::{Graph, GraphError, Init, Module, Var, VarMatrixOps};

pub struct BatchNorm {
    gamma: Var,
    beta: Var,
}

impl BatchNorm {
    pub fn new(graph: &Graph, channels: usize, name: &str) -> Result<Self, GraphError> {
        let gamma = graph.parameter(
            &[channels],
            Init::Normal {
                mean: 1.0,
                std: 0.02,
            },
            &format!("{name}/gamma"),
        )?;
        let beta = graph.parameter(&[channels], Init::Zeros, &format!("{name}/beta"))?;
        Ok(Self { gamma, beta })
    }

    pub fn forward(&self, x: &Var) -> Result<Var, GraphError> {
        x.batch_norm(&self.gamma, &self.beta, BATCH_NORM_EPSILON)
    }
}

impl Module for BatchNorm {
    fn parameters(&self) -> Vec<Var> {
        vec![self.gamma.clone(), self.beta.clone()]
    }
}
