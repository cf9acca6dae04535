/*
 * @Description  : 张量的原地（复合赋值）运算。优化器对大参数张量的更新都走这里，避免多余分配。
 *                 右操作数须能广播到左操作数的形状。
 */

use super::check_broadcast;
use crate::errors::Operator;
use crate::tensor::Tensor;
use std::ops::{AddAssign, MulAssign, SubAssign};

macro_rules! impl_assign_op {
    ($trait:ident, $method:ident, $op:tt, $operator:expr) => {
        impl<'a> $trait<&'a Tensor> for Tensor {
            fn $method(&mut self, other: &'a Tensor) {
                check_broadcast(self, other, $operator);
                self.data $op &other.data;
            }
        }
        impl $trait<Tensor> for Tensor {
            fn $method(&mut self, other: Tensor) {
                *self $op &other;
            }
        }
        impl $trait<f32> for Tensor {
            fn $method(&mut self, scalar: f32) {
                self.data $op scalar;
            }
        }
    };
}

impl_assign_op!(AddAssign, add_assign, +=, Operator::AddAssign);
impl_assign_op!(SubAssign, sub_assign, -=, Operator::SubAssign);
impl_assign_op!(MulAssign, mul_assign, *=, Operator::MulAssign);
