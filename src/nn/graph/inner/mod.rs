/*
 * @Description  : GraphInner 计算图的底层实现
 *
 * 各 impl 块分散在子模块中：
 * - core.rs: 基础操作、取值/设值、惰性前向传播
 * - backward.rs: VJP 反向传播（只对指定参数累积梯度）
 * - mode.rs: train/eval
 * - node_builders.rs: new_*_node
 * - describe.rs: 参数统计
 */

mod backward;
mod core;
mod describe;
mod mode;
mod node_builders;

use crate::nn::NodeId;
use crate::nn::nodes::NodeHandle;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};

/// 图的完整定义（核心实现）
///
/// 节点的值采用惰性缓存：叶子节点（输入、参数）的值被改写时，
/// 其所有后代的值随即作废，下次`forward`只重算作废的那部分。
pub struct GraphInner {
    pub(in crate::nn::graph) name: String,
    pub(in crate::nn::graph) nodes: HashMap<NodeId, NodeHandle>,
    /// 正向边：parent_id -> child_ids（父节点指向子节点）
    pub(in crate::nn::graph) forward_edges: HashMap<NodeId, Vec<NodeId>>,
    /// 反向边：child_id -> parent_ids（子节点指向父节点，顺序即父节点下标）
    pub(in crate::nn::graph) backward_edges: HashMap<NodeId, Vec<NodeId>>,
    pub(in crate::nn::graph) node_names: HashSet<String>,
    pub(in crate::nn::graph) next_id: u64,
    pub(in crate::nn::graph) is_eval_mode: bool,
    /// 图级别的随机数生成器（参数初始化、Dropout种子）
    pub(in crate::nn::graph) rng: StdRng,
}

impl Default for GraphInner {
    fn default() -> Self {
        Self::new()
    }
}
