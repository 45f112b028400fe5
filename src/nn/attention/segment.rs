use ndarray::{Array2, Array3, Axis};
use rand::Rng;
use rayon::prelude::*;

use super::{AttentionKind, AttentionWeights, ComputeAttention, Propagated};
use crate::errors::{GatError, Result};
use crate::graph::AugmentedGraph;
use crate::nn::functional::{leaky_relu, softmax_in_place};
use crate::nn::init::xavier_bound;
use crate::nn::{ForwardContext, Init};

/// 分段 softmax 注意力
///
/// 对增广图中每条边`j -> i`、每个头`h`：
/// 1. `e = LeakyReLU(a_src[h]·x_i[h] + a_dst[h]·x_j[h])`（目标节点特征点乘`a_src`，源节点特征点乘`a_dst`）；
/// 2. 在所有目标为`i`的边上做 softmax（各头、各目标节点相互独立）；
/// 3. dropout（仅 train 模式）；
/// 4. 目标节点`i`的输出为`Σ weight × x_j[h]`。
#[derive(Debug, Clone)]
pub struct SegmentSoftmax {
    /// [heads, head_dim]
    att_src: Array2<f32>,
    /// [heads, head_dim]
    att_dst: Array2<f32>,
    negative_slope: f32,
}

impl SegmentSoftmax {
    pub fn new<R: Rng + ?Sized>(heads: usize, head_dim: usize, negative_slope: f32, rng: &mut R) -> Self {
        // 按[1, heads, head_dim]的张量计算扇入/扇出：fan_in = heads × head_dim，fan_out = head_dim
        let init = Init::Uniform {
            bound: xavier_bound(heads * head_dim, head_dim),
        };
        Self {
            att_src: init.matrix(heads, head_dim, rng),
            att_dst: init.matrix(heads, head_dim, rng),
            negative_slope,
        }
    }

    pub fn att_src(&self) -> &Array2<f32> {
        &self.att_src
    }

    pub fn att_dst(&self) -> &Array2<f32> {
        &self.att_dst
    }

    pub fn negative_slope(&self) -> f32 {
        self.negative_slope
    }

    /// 替换两个注意力向量，形状必须保持为[heads, head_dim]
    pub fn set_attention_vectors(&mut self, att_src: Array2<f32>, att_dst: Array2<f32>) -> Result<()> {
        for candidate in [&att_src, &att_dst] {
            if candidate.shape() != self.att_src.shape() {
                return Err(GatError::shape_mismatch(
                    self.att_src.shape(),
                    candidate.shape(),
                    "注意力向量的形状须为[heads, head_dim]",
                ));
            }
        }
        self.att_src = att_src;
        self.att_dst = att_dst;
        Ok(())
    }

    /// 每个节点、每个头与注意力向量的点积：[num_nodes, heads]
    fn node_scores(x: &Array3<f32>, att: &Array2<f32>) -> Array2<f32> {
        let (n, heads, _) = x.dim();
        Array2::from_shape_fn((n, heads), |(node, h)| {
            x.index_axis(Axis(0), node)
                .index_axis(Axis(0), h)
                .dot(&att.index_axis(Axis(0), h))
        })
    }
}

impl ComputeAttention for SegmentSoftmax {
    fn kind(&self) -> AttentionKind {
        AttentionKind::SegmentSoftmax
    }

    fn propagate(
        &self,
        x: &Array3<f32>,
        graph: &AugmentedGraph,
        dropout: f32,
        ctx: &mut ForwardContext<'_>,
    ) -> Result<Propagated> {
        let (n, heads, head_dim) = x.dim();
        if (heads, head_dim) != self.att_src.dim() || n != graph.num_nodes() {
            return Err(GatError::shape_mismatch(
                &[graph.num_nodes(), self.att_src.nrows(), self.att_src.ncols()],
                x.shape(),
                "投影后的节点特征与注意力参数不一致",
            ));
        }

        let score_dst = Self::node_scores(x, &self.att_src);
        let score_src = Self::node_scores(x, &self.att_dst);

        // 1. 各目标节点的分段 softmax，节点之间互不依赖
        let segments: Vec<Vec<f32>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let incoming = graph.incoming(i);
                let k = incoming.len();
                // 按[head, slot]排布，便于每个头单独做 softmax
                let mut alpha = vec![0.0f32; heads * k];
                for h in 0..heads {
                    let row = &mut alpha[h * k..(h + 1) * k];
                    for (slot, &edge_id) in incoming.iter().enumerate() {
                        let j = graph.source(edge_id);
                        row[slot] = leaky_relu(score_dst[[i, h]] + score_src[[j, h]], self.negative_slope);
                    }
                    softmax_in_place(row);
                }
                alpha
            })
            .collect();

        let mut alpha = Array2::<f32>::zeros((graph.num_edges(), heads));
        for (i, segment) in segments.iter().enumerate() {
            let incoming = graph.incoming(i);
            let k = incoming.len();
            for (slot, &edge_id) in incoming.iter().enumerate() {
                for h in 0..heads {
                    alpha[[edge_id, h]] = segment[h * k + slot];
                }
            }
        }

        // 2. dropout 在并行区之外按边的顺序依次采样
        let mut dropped = alpha.clone();
        ctx.dropout(&mut dropped, dropout);

        // 3. 按目标节点求和
        let rows: Vec<Vec<f32>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut out = vec![0.0f32; heads * head_dim];
                for &edge_id in graph.incoming(i) {
                    let j = graph.source(edge_id);
                    for h in 0..heads {
                        let w = dropped[[edge_id, h]];
                        for d in 0..head_dim {
                            out[h * head_dim + d] += w * x[[j, h, d]];
                        }
                    }
                }
                out
            })
            .collect();

        let all_data: Vec<f32> = rows.into_iter().flatten().collect();
        let aggregated = Array3::from_shape_vec((n, heads, head_dim), all_data)
            .map_err(|e| GatError::shape_mismatch(&[n, heads, head_dim], &[], e.to_string()))?;

        Ok(Propagated {
            aggregated,
            weights: AttentionWeights::PerEdge {
                edges: graph.edges(),
                weights: alpha,
            },
        })
    }
}
