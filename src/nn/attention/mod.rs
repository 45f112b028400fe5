/*
 * @Description  : 注意力计算：同一个“计算注意力并聚合”能力的两种实现
 *                 - SegmentSoftmax：按目标节点分段 softmax（精确注意力）
 *                 - DenseNeighborhood：邻域内的缩放点积自注意力（“窗口”注意力）
 */

mod dense;
mod segment;

pub use dense::DenseNeighborhood;
pub use segment::SegmentSoftmax;

use std::fmt;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::errors::{GatError, Result};
use crate::graph::AugmentedGraph;
use crate::nn::ForwardContext;

/// 注意力策略的种类（构造层时选定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionKind {
    #[default]
    SegmentSoftmax,
    DenseNeighborhood,
}

impl fmt::Display for AttentionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SegmentSoftmax => "segment_softmax",
            Self::DenseNeighborhood => "dense_neighborhood",
        };
        write!(f, "{name}")
    }
}

impl FromStr for AttentionKind {
    type Err = GatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "segment_softmax" | "segment" => Ok(Self::SegmentSoftmax),
            "dense_neighborhood" | "dense" | "windowed" => Ok(Self::DenseNeighborhood),
            _ => Err(GatError::config(format!("不支持的注意力策略：{s}"))),
        }
    }
}

/// 一个邻域（目标节点的全部入边）上的稠密注意力矩阵
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodWeights {
    /// 目标节点
    pub node: usize,
    /// 各邻居槽位对应的源节点（含自环）
    pub sources: Vec<usize>,
    /// [heads, k, k]，每行和为1
    pub weights: Array3<f32>,
}

/// 供检查/可视化的注意力权重（dropout 之前）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttentionWeights {
    /// 每条增广边、每个头一个权重：`weights`形状为[num_edges, heads]
    PerEdge {
        edges: Vec<(usize, usize)>,
        weights: Array2<f32>,
    },
    /// 每个目标节点一个[heads, k, k]矩阵
    PerNeighborhood(Vec<NeighborhoodWeights>),
}

/// 一次注意力传播的结果
#[derive(Debug, Clone)]
pub struct Propagated {
    /// [num_nodes, heads, head_dim]
    pub aggregated: Array3<f32>,
    pub weights: AttentionWeights,
}

#[enum_dispatch]
#[derive(Debug, Clone)]
pub enum Attention {
    SegmentSoftmax(SegmentSoftmax),
    DenseNeighborhood(DenseNeighborhood),
}

#[enum_dispatch(Attention)]
pub trait ComputeAttention {
    fn kind(&self) -> AttentionKind;

    /// 在增广图上计算注意力权重并按目标节点聚合。
    ///
    /// `x`为投影后的节点特征 [num_nodes, heads, head_dim]；
    /// 返回聚合结果 [num_nodes, heads, head_dim] 及 dropout 之前的注意力权重。
    fn propagate(
        &self,
        x: &Array3<f32>,
        graph: &AugmentedGraph,
        dropout: f32,
        ctx: &mut ForwardContext<'_>,
    ) -> Result<Propagated>;
}

#[cfg(test)]
mod tests;
