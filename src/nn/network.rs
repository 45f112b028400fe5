/*
 * @Description  : 多层 GAT 网络
 *
 * 第 1..L-1 层：GatConv(concat) -> ELU -> dropout
 * 第 L 层：GatConv(1个头, average)，不做激活
 * 输出：按行 log_softmax
 */

use log::{debug, trace, warn};
use ndarray::Array2;
use rand::Rng;

use crate::errors::{GatError, Result};
use crate::graph::Graph;
use crate::nn::functional::{elu, log_softmax_rows};
use crate::nn::layer::gat_conv::check_dropout;
use crate::nn::{AttentionWeights, CombineMode, ForwardContext, GatConfig, GatConv, GatConvOptions};

/// 多层图注意力网络，层与层之间严格串行
#[derive(Debug, Clone)]
pub struct GatNetwork {
    layers: Vec<GatConv>,
    /// 隐藏层输出上的 dropout 概率
    dropout: f32,
}

impl GatNetwork {
    /// 按配置构造网络，参数从`rng`中初始化
    pub fn new<R: Rng + ?Sized>(config: &GatConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let hidden_options = GatConvOptions {
            heads: config.heads,
            combine: CombineMode::Concat,
            attention: config.strategy,
            negative_slope: config.negative_slope,
            dropout: config.dropout,
            bias: config.bias,
        };
        let output_options = GatConvOptions {
            heads: 1,
            combine: CombineMode::Average,
            ..hidden_options
        };

        let mut layers = Vec::with_capacity(config.num_layers);
        let mut in_dim = config.in_dim;
        for index in 0..config.num_layers - 1 {
            let layer = GatConv::new(in_dim, config.hidden_dim, hidden_options, &format!("gat{}", index + 1), rng)?;
            in_dim = layer.out_dim();
            layers.push(layer);
        }
        layers.push(GatConv::new(
            in_dim,
            config.num_classes,
            output_options,
            &format!("gat{}", config.num_layers),
            rng,
        )?);

        Self::from_layers(layers, config.dropout)
    }

    /// 由已构造好的层组成网络：相邻两层的宽度必须衔接，
    /// 隐藏层须为 concat，输出层须为1个头的 average
    pub fn from_layers(layers: Vec<GatConv>, dropout: f32) -> Result<Self> {
        check_dropout(dropout)?;
        for pair in layers.windows(2) {
            if pair[0].out_dim() != pair[1].in_dim() {
                return Err(GatError::shape_mismatch(
                    &[pair[1].in_dim()],
                    &[pair[0].out_dim()],
                    format!("{}的输出宽度与{}的输入宽度不一致", pair[0].name(), pair[1].name()),
                ));
            }
        }
        let (last, hidden) = layers
            .split_last()
            .ok_or_else(|| GatError::config("网络至少需要1层"))?;
        if let Some(layer) = hidden.iter().find(|l| l.combine_mode() != CombineMode::Concat) {
            return Err(GatError::config(format!(
                "{}：隐藏层须使用concat合并，实际为{}",
                layer.name(),
                layer.combine_mode()
            )));
        }
        if last.heads() != 1 || last.combine_mode() != CombineMode::Average {
            return Err(GatError::config(format!(
                "{}：输出层须为1个头且使用average合并，实际为{}个头、{}",
                last.name(),
                last.heads(),
                last.combine_mode()
            )));
        }
        for layer in &layers {
            debug!(
                "{}：{} -> {}，{}个头，{}，{}",
                layer.name(),
                layer.in_dim(),
                layer.out_dim(),
                layer.heads(),
                layer.attention_kind(),
                layer.combine_mode()
            );
        }
        Ok(Self { layers, dropout })
    }

    /// 前向传播，返回[num_nodes, num_classes]的对数概率
    pub fn forward(&self, x: &Array2<f32>, graph: &Graph, ctx: &mut ForwardContext<'_>) -> Result<Array2<f32>> {
        self.run(x, graph, ctx, None)
    }

    /// 前向传播，同时返回每一层（dropout 之前）的注意力权重
    pub fn forward_with_attention(
        &self,
        x: &Array2<f32>,
        graph: &Graph,
        ctx: &mut ForwardContext<'_>,
    ) -> Result<(Array2<f32>, Vec<AttentionWeights>)> {
        let mut attention = Vec::with_capacity(self.layers.len());
        let log_probs = self.run(x, graph, ctx, Some(&mut attention))?;
        Ok((log_probs, attention))
    }

    fn run(
        &self,
        x: &Array2<f32>,
        graph: &Graph,
        ctx: &mut ForwardContext<'_>,
        mut attention: Option<&mut Vec<AttentionWeights>>,
    ) -> Result<Array2<f32>> {
        // 每次前向传播只增广一次，所有层共用
        let augmented = graph.add_self_loops()?;
        let (last, hidden) = self
            .layers
            .split_last()
            .ok_or_else(|| GatError::config("网络至少需要1层"))?;

        let mut h = x.to_owned();
        for layer in hidden {
            let output = layer.forward_augmented(&h, &augmented, ctx)?;
            if let Some(collected) = attention.as_mut() {
                collected.push(output.attention);
            }
            h = output.features.mapv(|v| elu(v, 1.0));
            ctx.dropout(&mut h, self.dropout);
        }

        let output = last.forward_augmented(&h, &augmented, ctx)?;
        if let Some(collected) = attention.as_mut() {
            collected.push(output.attention);
        }
        let log_probs = log_softmax_rows(&output.features);

        let non_finite = log_probs.rows().into_iter().filter(|row| row.iter().any(|v| !v.is_finite())).count();
        if non_finite > 0 {
            warn!("输出中有{non_finite}行包含非有限值");
        }
        trace!("GAT 输出形状：{:?}，training={}", log_probs.shape(), ctx.is_training());
        Ok(log_probs)
    }

    pub fn layers(&self) -> &[GatConv] {
        &self.layers
    }

    /// 供外部训练框架替换各层参数
    pub fn layers_mut(&mut self) -> &mut [GatConv] {
        &mut self.layers
    }

    pub fn num_classes(&self) -> usize {
        self.layers.last().map_or(0, GatConv::out_dim)
    }

    pub fn dropout(&self) -> f32 {
        self.dropout
    }
}
