/*
 * @Description  : 普通图卷积层（GCN）及两层 GCN 网络
 *                 out = Â (x W) + b，其中 Â = D^{-1/2} (A + I) D^{-1/2}
 */

use log::debug;
use ndarray::{Array1, Array2};
use rand::Rng;
use rayon::prelude::*;

use crate::errors::{GatError, Result};
use crate::graph::{AugmentedGraph, Graph};
use crate::nn::functional::{log_softmax_rows, relu};
use crate::nn::layer::gat_conv::check_dropout;
use crate::nn::{ForwardContext, Init, Linear};

/// 图卷积层，权重与偏置均以`U(-1/sqrt(out), 1/sqrt(out))`初始化
#[derive(Debug, Clone)]
pub struct GcnConv {
    linear: Linear,
    bias: Option<Array1<f32>>,
}

impl GcnConv {
    pub fn new<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, use_bias: bool, name: &str, rng: &mut R) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(GatError::config(format!(
                "{name}：输入输出维度须为正数，实际为{in_dim}->{out_dim}"
            )));
        }
        let init = Init::Uniform {
            bound: 1.0 / (out_dim as f32).sqrt(),
        };
        let linear = Linear::new(in_dim, out_dim, init, name, rng);
        let bias = use_bias.then(|| init.vector(out_dim, rng));
        Ok(Self { linear, bias })
    }

    pub fn in_dim(&self) -> usize {
        self.linear.in_features()
    }

    pub fn out_dim(&self) -> usize {
        self.linear.out_features()
    }

    pub fn set_weights(&mut self, weights: Array2<f32>) -> Result<()> {
        self.linear.set_weights(weights)
    }

    pub fn bias(&self) -> Option<&Array1<f32>> {
        self.bias.as_ref()
    }

    pub fn forward_augmented(&self, x: &Array2<f32>, graph: &AugmentedGraph) -> Result<Array2<f32>> {
        if x.nrows() != graph.num_nodes() {
            return Err(GatError::shape_mismatch(
                &[graph.num_nodes(), self.in_dim()],
                x.shape(),
                "特征矩阵的行数须等于节点数",
            ));
        }
        let support = self.linear.forward(x)?;
        let norm = graph.symmetric_norm_weights();
        let out_dim = self.out_dim();

        let rows: Vec<Vec<f32>> = (0..graph.num_nodes())
            .into_par_iter()
            .map(|i| {
                let mut out = match &self.bias {
                    Some(b) => b.to_vec(),
                    None => vec![0.0f32; out_dim],
                };
                for &edge_id in graph.incoming(i) {
                    let j = graph.source(edge_id);
                    for (o, &s) in out.iter_mut().zip(support.row(j).iter()) {
                        *o += norm[edge_id] * s;
                    }
                }
                out
            })
            .collect();

        let all_data: Vec<f32> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((graph.num_nodes(), out_dim), all_data)
            .map_err(|e| GatError::shape_mismatch(&[graph.num_nodes(), out_dim], &[], e.to_string()))
    }
}

/// 两层 GCN：gc1 -> ReLU -> dropout -> gc2 -> log_softmax
#[derive(Debug, Clone)]
pub struct GcnNetwork {
    gc1: GcnConv,
    gc2: GcnConv,
    dropout: f32,
}

impl GcnNetwork {
    pub fn new<R: Rng + ?Sized>(
        num_features: usize,
        hidden: usize,
        num_classes: usize,
        dropout: f32,
        rng: &mut R,
    ) -> Result<Self> {
        check_dropout(dropout)?;
        let gc1 = GcnConv::new(num_features, hidden, true, "gc1", rng)?;
        let gc2 = GcnConv::new(hidden, num_classes, true, "gc2", rng)?;
        debug!("GCN：{num_features} -> {hidden} -> {num_classes}，dropout={dropout}");
        Ok(Self { gc1, gc2, dropout })
    }

    /// 返回[num_nodes, num_classes]的对数概率
    pub fn forward(&self, x: &Array2<f32>, graph: &Graph, ctx: &mut ForwardContext<'_>) -> Result<Array2<f32>> {
        let augmented = graph.add_self_loops()?;
        let mut h = self.gc1.forward_augmented(x, &augmented)?.mapv(relu);
        ctx.dropout(&mut h, self.dropout);
        let logits = self.gc2.forward_augmented(&h, &augmented)?;
        Ok(log_softmax_rows(&logits))
    }
}
