/*
 * @Description  : GraphInner 参数统计与摘要
 */

use super::GraphInner;
use std::fmt::Write;

impl GraphInner {
    /// 名称以`prefix`开头的参数的标量总数
    pub fn parameter_count(&self, prefix: &str) -> usize {
        self.parameters_with_prefix(prefix)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| node.value_expected_shape().iter().product::<usize>())
            .sum()
    }

    /// 全部参数的标量总数及各前缀下的标量数，如`"参数共6个：generator=4，discriminator=2"`
    pub fn describe(&self, prefixes: &[&str]) -> String {
        let groups: Vec<String> = prefixes
            .iter()
            .map(|prefix| format!("{prefix}={}", self.parameter_count(prefix)))
            .collect();
        format!("参数共{}个：{}", self.parameter_count(""), groups.join("，"))
    }

    /// 参数摘要：每行一个参数（名称、形状、参数量），末尾是合计
    ///
    /// # 示例
    /// ```ignore
    /// log::debug!("\n{}", graph.inner().summary_string("generator/"));
    /// // generator/encoder_1/conv/kernel    [4, 4, 3, 64]    3072
    /// // ...
    /// // 合计：54425859
    /// ```
    pub fn summary_string(&self, prefix: &str) -> String {
        let mut output = String::new();
        for id in self.parameters_with_prefix(prefix) {
            if let Some(node) = self.nodes.get(&id) {
                let shape = node.value_expected_shape();
                let _ = writeln!(
                    output,
                    "{:<48} {:<20} {}",
                    node.name(),
                    format!("{shape:?}"),
                    shape.iter().product::<usize>()
                );
            }
        }
        let _ = write!(output, "合计：{}", self.parameter_count(prefix));
        output
    }
}
