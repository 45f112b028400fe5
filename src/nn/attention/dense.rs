use ndarray::{Array2, Array3, Axis, s};
use rayon::prelude::*;

use super::{AttentionKind, AttentionWeights, ComputeAttention, NeighborhoodWeights, Propagated};
use crate::errors::{GatError, Result};
use crate::graph::AugmentedGraph;
use crate::nn::ForwardContext;
use crate::nn::functional::softmax_lane;

/// 邻域稠密缩放点积注意力（“窗口”注意力），没有可学习的注意力参数。
///
/// 对每个目标节点`i`，设其入边（含自环）的源节点为`s_0..s_{k-1}`，对每个头：
/// 1. `Q = K = V = [x_{s_0}; …; x_{s_{k-1}}]`（k × head_dim）；
/// 2. `S = Q Kᵀ / sqrt(head_dim)`（k × k），按最后一维 softmax；
/// 3. dropout（仅 train 模式）；
/// 4. `O = S V`，再对 k 个邻居槽位取平均，得到该节点该头的输出。
///
/// 注意它与`SegmentSoftmax`并不等价：这里是邻域内部邻居与邻居之间的自注意力，
/// 并以平均而非求和进行归约。
#[derive(Debug, Clone)]
pub struct DenseNeighborhood {
    head_dim: usize,
}

impl DenseNeighborhood {
    pub fn new(head_dim: usize) -> Self {
        Self { head_dim }
    }

    fn scale(&self) -> f32 {
        1.0 / (self.head_dim as f32).sqrt()
    }

    /// 邻域内某个头的值矩阵 [k, head_dim]
    fn gather_block(x: &Array3<f32>, sources: &[usize], h: usize) -> Array2<f32> {
        let head_dim = x.len_of(Axis(2));
        let mut block = Array2::<f32>::zeros((sources.len(), head_dim));
        for (slot, &j) in sources.iter().enumerate() {
            block.row_mut(slot).assign(&x.slice(s![j, h, ..]));
        }
        block
    }
}

impl ComputeAttention for DenseNeighborhood {
    fn kind(&self) -> AttentionKind {
        AttentionKind::DenseNeighborhood
    }

    fn propagate(
        &self,
        x: &Array3<f32>,
        graph: &AugmentedGraph,
        dropout: f32,
        ctx: &mut ForwardContext<'_>,
    ) -> Result<Propagated> {
        let (n, heads, head_dim) = x.dim();
        if head_dim != self.head_dim || n != graph.num_nodes() {
            return Err(GatError::shape_mismatch(
                &[graph.num_nodes(), heads, self.head_dim],
                x.shape(),
                "投影后的节点特征与注意力配置不一致",
            ));
        }
        let scale = self.scale();

        // 1. 每个邻域先完整收集，再做 softmax
        let neighborhoods: Vec<NeighborhoodWeights> = (0..n)
            .into_par_iter()
            .map(|i| {
                let sources: Vec<usize> = graph.incoming(i).iter().map(|&e| graph.source(e)).collect();
                let k = sources.len();
                let mut weights = Array3::<f32>::zeros((heads, k, k));
                for h in 0..heads {
                    let block = Self::gather_block(x, &sources, h);
                    let mut scores = block.dot(&block.t()) * scale;
                    // head_dim == 1 时 dot 的结果是列优先的，行不连续
                    for mut row in scores.rows_mut() {
                        softmax_lane(&mut row);
                    }
                    weights.index_axis_mut(Axis(0), h).assign(&scores);
                }
                NeighborhoodWeights {
                    node: i,
                    sources,
                    weights,
                }
            })
            .collect();

        // 2. dropout 按节点顺序依次采样
        let mut dropped: Vec<Array3<f32>> = neighborhoods.iter().map(|nb| nb.weights.clone()).collect();
        for w in dropped.iter_mut() {
            ctx.dropout(w, dropout);
        }

        // 3. 加权求和后对邻居槽位取平均
        let rows: Vec<Vec<f32>> = neighborhoods
            .par_iter()
            .zip(dropped.par_iter())
            .map(|(nb, w)| {
                let mut out = Vec::with_capacity(heads * head_dim);
                for h in 0..heads {
                    let block = Self::gather_block(x, &nb.sources, h);
                    let attended = w.index_axis(Axis(0), h).dot(&block);
                    let pooled = attended
                        .mean_axis(Axis(0))
                        .unwrap_or_else(|| ndarray::Array1::zeros(head_dim));
                    out.extend(pooled.iter().copied());
                }
                out
            })
            .collect();

        let all_data: Vec<f32> = rows.into_iter().flatten().collect();
        let aggregated = Array3::from_shape_vec((n, heads, head_dim), all_data)
            .map_err(|e| GatError::shape_mismatch(&[n, heads, head_dim], &[], e.to_string()))?;

        Ok(Propagated {
            aggregated,
            weights: AttentionWeights::PerNeighborhood(neighborhoods),
        })
    }
}
