/*
 * @Author       : 老董
 * @Date         : 2024-01-31 20:23:53
 * @Description  : 负责神经网络（neural network）的构建
 */

mod ema;
mod graph;
pub mod layer;
mod module;
mod nodes;
pub mod optimizer;
mod var;
mod var_ops;

pub use ema::{DEFAULT_EMA_DECAY, ExponentialMovingAverage};
pub use graph::{Graph, GraphError, GraphInner};
pub use layer::{BatchNorm, Conv2d, ConvTranspose2d, Linear, PaddingMode};
pub use module::Module;
pub use nodes::{NodeId, Padding, same_padding};
pub use optimizer::{Adam, Optimizer};
pub use var::{Init, Var};
pub use var_ops::{VarActivationOps, VarLossOps, VarMatrixOps, VarShapeOps};

#[cfg(test)]
mod tests;
