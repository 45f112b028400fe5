/*
 * @Description  : 多头输出的合并方式（拼接 / 平均）
 */

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::{GatError, Result};

/// 多头输出的合并方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// [num_nodes, heads × head_dim]，用于隐藏层
    #[default]
    Concat,
    /// 对头取平均 → [num_nodes, head_dim]，用于输出层
    Average,
}

impl CombineMode {
    /// 合并后每个节点的特征宽度
    pub fn output_width(&self, heads: usize, head_dim: usize) -> usize {
        match self {
            Self::Concat => heads * head_dim,
            Self::Average => head_dim,
        }
    }

    /// 合并[num_nodes, heads, head_dim]的聚合结果，并加上可选偏置
    pub fn combine(&self, aggregated: Array3<f32>, bias: Option<&Array1<f32>>) -> Result<Array2<f32>> {
        let (n, heads, head_dim) = aggregated.dim();
        let mut out = match self {
            Self::Concat => aggregated
                .as_standard_layout()
                .into_owned()
                .into_shape((n, heads * head_dim))
                .map_err(|e| GatError::shape_mismatch(&[n, heads * head_dim], &[n, heads, head_dim], e.to_string()))?,
            Self::Average => aggregated
                .mean_axis(Axis(1))
                .unwrap_or_else(|| Array2::zeros((n, head_dim))),
        };

        if let Some(bias) = bias {
            if bias.len() != out.ncols() {
                return Err(GatError::shape_mismatch(
                    &[out.ncols()],
                    bias.shape(),
                    format!("{self}模式下偏置宽度须与输出宽度一致"),
                ));
            }
            out += bias;
        }
        Ok(out)
    }
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Concat => "concat",
            Self::Average => "average",
        };
        write!(f, "{name}")
    }
}

impl FromStr for CombineMode {
    type Err = GatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "concat" => Ok(Self::Concat),
            "average" | "mean" => Ok(Self::Average),
            _ => Err(GatError::config(format!("不支持的多头合并方式：{s}"))),
        }
    }
}
