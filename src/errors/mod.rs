/*
 * @Description  : 图注意力前向计算的错误类型
 */

use thiserror::Error;

/// 本crate统一的`Result`别名
pub type Result<T> = std::result::Result<T, GatError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatError {
    // 图结构
    #[error("非法图结构：第{edge_index}条边({src_node}->{dst_node})的节点索引须在[0, {num_nodes})范围内")]
    InvalidGraph {
        edge_index: usize,
        src_node: usize,
        dst_node: usize,
        num_nodes: usize,
    },
    // 形状
    #[error("形状不一致：预期{expected:?}，实际为{got:?}（{message}）")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        message: String,
    },
    // 配置
    #[error("配置错误：{0}")]
    ConfigurationError(String),
}

impl GatError {
    pub(crate) fn shape_mismatch(expected: &[usize], got: &[usize], message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }
}

impl From<serde_json::Error> for GatError {
    fn from(e: serde_json::Error) -> Self {
        Self::ConfigurationError(format!("无法解析JSON配置：{e}"))
    }
}
