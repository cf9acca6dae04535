/*
 * @Description  : Module trait 单元测试：参数收集与复用
 */

use crate::nn::graph::Graph;
use crate::nn::layer::{BatchNorm, Conv2d, Linear, PaddingMode};
use crate::nn::{Module, Var};

struct Block {
    conv: Conv2d,
    norm: BatchNorm,
}

impl Module for Block {
    fn parameters(&self) -> Vec<Var> {
        let mut params = self.conv.parameters();
        params.extend(self.norm.parameters());
        params
    }
}

/// 测试 Linear 层实现 Module trait
#[test]
fn test_linear_implements_module() {
    let graph = Graph::new_with_seed(42);
    let fc = Linear::new(&graph, 10, 5, "fc").unwrap();

    let params = fc.parameters();
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].value_expected_shape().unwrap(), vec![10, 5]);
    assert_eq!(params[1].value_expected_shape().unwrap(), vec![5]);
}

/// 测试组合模块的参数收集
#[test]
fn test_composite_module_parameters() {
    let graph = Graph::new_with_seed(42);
    let block = Block {
        conv: Conv2d::new(&graph, 3, 8, 4, 2, PaddingMode::Same, false, "block/conv").unwrap(),
        norm: BatchNorm::new(&graph, 8, "block/bn").unwrap(),
    };
    assert_eq!(block.num_params(), 3);
    let names: Vec<String> = block.parameters().iter().map(|p| p.name().unwrap()).collect();
    assert_eq!(names, vec!["block/conv/kernel", "block/bn/gamma", "block/bn/beta"]);
}

/// 测试多次 forward 复用同一组参数：不新增参数节点
#[test]
fn test_forward_twice_reuses_parameters() {
    let graph = Graph::new_with_seed(42);
    let conv = Conv2d::new(&graph, 3, 4, 4, 2, PaddingMode::Same, false, "shared").unwrap();
    let x1 = graph.input_shape(&[1, 8, 8, 3], None).unwrap();
    let x2 = graph.input_shape(&[1, 8, 8, 3], None).unwrap();

    conv.forward(&x1).unwrap();
    let params_before = graph.parameters_with_prefix("").len();
    conv.forward(&x2).unwrap();
    assert_eq!(graph.parameters_with_prefix("").len(), params_before);
}
