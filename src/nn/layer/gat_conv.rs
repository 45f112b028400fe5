/*
 * @Description  : 多头图注意力层（GAT 卷积）
 *
 * 前向流程：投影 -> 注意力（两种策略之一）-> 按目标节点聚合 -> 合并多头 -> 偏置
 */

use log::trace;
use ndarray::{Array1, Array2};
use rand::Rng;

use crate::errors::{GatError, Result};
use crate::graph::{AugmentedGraph, Graph};
use crate::nn::{
    Attention, AttentionKind, AttentionWeights, CombineMode, ComputeAttention, DenseNeighborhood,
    ForwardContext, Init, Linear, SegmentSoftmax,
};

/// `GatConv`的构造选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatConvOptions {
    pub heads: usize,
    pub combine: CombineMode,
    pub attention: AttentionKind,
    /// LeakyReLU 负半轴斜率（仅 SegmentSoftmax 使用）
    pub negative_slope: f32,
    /// 注意力权重上的 dropout 概率
    pub dropout: f32,
    pub bias: bool,
}

impl Default for GatConvOptions {
    fn default() -> Self {
        Self {
            heads: 1,
            combine: CombineMode::Concat,
            attention: AttentionKind::SegmentSoftmax,
            negative_slope: 0.2,
            dropout: 0.0,
            bias: true,
        }
    }
}

/// 单层前向传播的输出
#[derive(Debug, Clone)]
pub struct LayerOutput {
    /// [num_nodes, out_width]
    pub features: Array2<f32>,
    /// dropout 之前的注意力权重
    pub attention: AttentionWeights,
}

/// 多头图注意力层
///
/// # 输入/输出形状
/// - 输入：[num_nodes, in_dim]
/// - 输出：concat 模式为[num_nodes, heads × head_dim]，average 模式为[num_nodes, head_dim]
///
/// # 使用示例
/// ```ignore
/// let layer = GatConv::new(16, 8, GatConvOptions { heads: 4, ..Default::default() }, "gat1", &mut rng)?;
/// let out = layer.forward(&x, &graph, &mut ForwardContext::eval())?;
/// ```
#[derive(Debug, Clone)]
pub struct GatConv {
    projection: Linear,
    attention: Attention,
    heads: usize,
    head_dim: usize,
    combine: CombineMode,
    dropout: f32,
    bias: Option<Array1<f32>>,
    name: String,
}

impl GatConv {
    pub fn new<R: Rng + ?Sized>(
        in_dim: usize,
        head_dim: usize,
        options: GatConvOptions,
        name: &str,
        rng: &mut R,
    ) -> Result<Self> {
        if options.heads == 0 {
            return Err(GatError::config(format!("{name}：heads须≥1")));
        }
        if in_dim == 0 {
            return Err(GatError::config(format!("{name}：in_dim须≥1")));
        }
        if head_dim == 0 {
            return Err(GatError::shape_mismatch(
                &[1],
                &[0],
                format!("{name}：每个头的维度须为正数"),
            ));
        }
        check_dropout(options.dropout)?;
        if !options.negative_slope.is_finite() {
            return Err(GatError::config(format!(
                "{name}：negative_slope须为有限值，实际为{}",
                options.negative_slope
            )));
        }

        let projection = Linear::new(
            in_dim,
            options.heads * head_dim,
            Init::XavierUniform,
            &format!("{name}_lin"),
            rng,
        );
        let attention: Attention = match options.attention {
            AttentionKind::SegmentSoftmax => {
                SegmentSoftmax::new(options.heads, head_dim, options.negative_slope, rng).into()
            }
            AttentionKind::DenseNeighborhood => DenseNeighborhood::new(head_dim).into(),
        };
        let bias = options
            .bias
            .then(|| Init::Zeros.vector(options.combine.output_width(options.heads, head_dim), rng));

        Ok(Self {
            projection,
            attention,
            heads: options.heads,
            head_dim,
            combine: options.combine,
            dropout: options.dropout,
            bias,
            name: name.to_string(),
        })
    }

    /// 前向传播：内部为`graph`添加自环（不修改调用方的图）
    pub fn forward(&self, x: &Array2<f32>, graph: &Graph, ctx: &mut ForwardContext<'_>) -> Result<LayerOutput> {
        let augmented = graph.add_self_loops()?;
        self.forward_augmented(x, &augmented, ctx)
    }

    /// 在已添加自环的图上做前向传播
    pub fn forward_augmented(
        &self,
        x: &Array2<f32>,
        graph: &AugmentedGraph,
        ctx: &mut ForwardContext<'_>,
    ) -> Result<LayerOutput> {
        if x.nrows() != graph.num_nodes() {
            return Err(GatError::shape_mismatch(
                &[graph.num_nodes(), self.in_dim()],
                x.shape(),
                format!("{}：特征矩阵的行数须等于节点数", self.name),
            ));
        }

        let n = x.nrows();
        let projected = self
            .projection
            .forward(x)?
            .into_shape((n, self.heads, self.head_dim))
            .map_err(|e| GatError::shape_mismatch(&[n, self.heads, self.head_dim], &[n], e.to_string()))?;

        let propagated = self.attention.propagate(&projected, graph, self.dropout, ctx)?;
        let features = self.combine.combine(propagated.aggregated, self.bias.as_ref())?;

        trace!(
            "{}：{:?} -> {:?}（{}，{}）",
            self.name,
            x.shape(),
            features.shape(),
            self.attention.kind(),
            self.combine
        );

        Ok(LayerOutput {
            features,
            attention: propagated.weights,
        })
    }

    pub fn in_dim(&self) -> usize {
        self.projection.in_features()
    }

    pub fn out_dim(&self) -> usize {
        self.combine.output_width(self.heads, self.head_dim)
    }

    pub fn heads(&self) -> usize {
        self.heads
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    pub fn combine_mode(&self) -> CombineMode {
        self.combine
    }

    pub fn attention_kind(&self) -> AttentionKind {
        self.attention.kind()
    }

    pub fn dropout(&self) -> f32 {
        self.dropout
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn projection(&self) -> &Linear {
        &self.projection
    }

    pub fn bias(&self) -> Option<&Array1<f32>> {
        self.bias.as_ref()
    }

    // ========== 供外部训练框架替换参数 ==========

    pub fn set_projection_weights(&mut self, weights: Array2<f32>) -> Result<()> {
        self.projection.set_weights(weights)
    }

    pub fn set_attention_vectors(&mut self, att_src: Array2<f32>, att_dst: Array2<f32>) -> Result<()> {
        match &mut self.attention {
            Attention::SegmentSoftmax(attention) => attention.set_attention_vectors(att_src, att_dst),
            Attention::DenseNeighborhood(_) => Err(GatError::config(format!(
                "{}：dense_neighborhood策略没有可学习的注意力向量",
                self.name
            ))),
        }
    }

    pub fn set_bias(&mut self, bias: Array1<f32>) -> Result<()> {
        match &self.bias {
            Some(current) if current.len() == bias.len() => {
                self.bias = Some(bias);
                Ok(())
            }
            Some(current) => Err(GatError::shape_mismatch(
                current.shape(),
                bias.shape(),
                format!("{}：偏置宽度不可改变", self.name),
            )),
            None => Err(GatError::config(format!("{}：该层构造时未启用偏置", self.name))),
        }
    }
}

pub(crate) fn check_dropout(p: f32) -> Result<()> {
    if (0.0..1.0).contains(&p) {
        Ok(())
    } else {
        Err(GatError::config(format!("dropout须在[0, 1)范围内，实际为{p}")))
    }
}
