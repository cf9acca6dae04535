/*
 * @Description  : 张量的四则运算。支持：
 *                 1. 张量与纯数（f32）：对每个元素运算，形状不变；
 *                 2. 张量与张量：NumPy风格广播（从右向左对齐，维度相等或其一为1）。
 *                 形状不兼容属于调用方的编程错误，直接panic（附带TensorError信息）。
 */

mod assign;

use crate::errors::{Operator, TensorError};
use crate::tensor::Tensor;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// 判断两个形状能否按NumPy规则广播
fn can_broadcast(shape_1: &[usize], shape_2: &[usize]) -> bool {
    shape_1
        .iter()
        .rev()
        .zip(shape_2.iter().rev())
        .all(|(&a, &b)| a == b || a == 1 || b == 1)
}

fn check_broadcast(tensor_1: &Tensor, tensor_2: &Tensor, operator: Operator) {
    assert!(
        can_broadcast(tensor_1.shape(), tensor_2.shape()),
        "{}",
        TensorError::OperatorError {
            operator,
            tensor1_shape: tensor_1.shape().to_vec(),
            tensor2_shape: tensor_2.shape().to_vec(),
        }
    );
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:tt, $operator:expr) => {
        /*↓↓↓↓↓↓↓↓↓↓↓↓（不）带引用的张量 与（不）带引用的张量↓↓↓↓↓↓↓↓↓↓↓↓*/
        impl<'b> $trait<&'b Tensor> for &Tensor {
            type Output = Tensor;

            fn $method(self, other: &'b Tensor) -> Tensor {
                check_broadcast(self, other, $operator);
                Tensor::from_array(self.data() $op other.data())
            }
        }
        impl $trait<Tensor> for &Tensor {
            type Output = Tensor;

            fn $method(self, other: Tensor) -> Tensor {
                self $op &other
            }
        }
        impl<'a> $trait<&'a Tensor> for Tensor {
            type Output = Tensor;

            fn $method(self, other: &'a Tensor) -> Tensor {
                &self $op other
            }
        }
        impl $trait for Tensor {
            type Output = Tensor;

            fn $method(self, other: Tensor) -> Tensor {
                &self $op &other
            }
        }
        /*↓↓↓↓↓↓↓↓↓↓↓↓（不）带引用的张量 与 f32↓↓↓↓↓↓↓↓↓↓↓↓*/
        impl $trait<f32> for &Tensor {
            type Output = Tensor;

            fn $method(self, scalar: f32) -> Tensor {
                Tensor::from_array(self.data() $op scalar)
            }
        }
        impl $trait<f32> for Tensor {
            type Output = Tensor;

            fn $method(self, scalar: f32) -> Tensor {
                Tensor::from_array(self.into_array() $op scalar)
            }
        }
        /*↓↓↓↓↓↓↓↓↓↓↓↓f32 与（不）带引用的张量↓↓↓↓↓↓↓↓↓↓↓↓*/
        impl<'a> $trait<&'a Tensor> for f32 {
            type Output = Tensor;

            fn $method(self, tensor: &'a Tensor) -> Tensor {
                Tensor::from_array(tensor.data().mapv(|x| self $op x))
            }
        }
        impl $trait<Tensor> for f32 {
            type Output = Tensor;

            fn $method(self, tensor: Tensor) -> Tensor {
                self $op &tensor
            }
        }
    };
}

impl_binary_op!(Add, add, +, Operator::Add);
impl_binary_op!(Sub, sub, -, Operator::Sub);
impl_binary_op!(Mul, mul, *, Operator::Mul);
impl_binary_op!(Div, div, /, Operator::Div);

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        Tensor::from_array(-self.data())
    }
}

impl Neg for Tensor {
    type Output = Self;

    fn neg(self) -> Self {
        Self::from_array(-self.into_array())
    }
}
