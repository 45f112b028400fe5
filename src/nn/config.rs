/*
 * @Description  : GAT 网络的结构配置（可从 JSON 读取）
 */

use serde::{Deserialize, Serialize};

use crate::errors::{GatError, Result};
use crate::nn::AttentionKind;
use crate::nn::layer::gat_conv::check_dropout;

/// 多层 GAT 的结构配置。
///
/// 未给出的字段取默认值：`num_layers = 2`、`heads = 8`、`hidden_dim = 8`、
/// `dropout = 0.6`、`negative_slope = 0.2`、`strategy = "segment_softmax"`、`bias = true`。
/// `in_dim`与`num_classes`没有合理的默认值，必须显式给出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatConfig {
    pub in_dim: usize,
    /// 隐藏层每个头的维度
    pub hidden_dim: usize,
    pub num_classes: usize,
    /// 总层数（含输出层），至少为1
    pub num_layers: usize,
    /// 隐藏层的头数（输出层恒为1个头）
    pub heads: usize,
    /// 注意力权重与层间特征上的 dropout 概率
    pub dropout: f32,
    pub negative_slope: f32,
    pub strategy: AttentionKind,
    pub bias: bool,
}

impl Default for GatConfig {
    fn default() -> Self {
        Self {
            in_dim: 0,
            hidden_dim: 8,
            num_classes: 0,
            num_layers: 2,
            heads: 8,
            dropout: 0.6,
            negative_slope: 0.2,
            strategy: AttentionKind::SegmentSoftmax,
            bias: true,
        }
    }
}

impl GatConfig {
    pub fn new(in_dim: usize, hidden_dim: usize, num_classes: usize) -> Self {
        Self {
            in_dim,
            hidden_dim,
            num_classes,
            ..Default::default()
        }
    }

    pub fn with_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_heads(mut self, heads: usize) -> Self {
        self.heads = heads;
        self
    }

    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_strategy(mut self, strategy: AttentionKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.in_dim == 0 {
            return Err(GatError::config("in_dim须≥1"));
        }
        if self.num_layers == 0 {
            return Err(GatError::config("num_layers须≥1"));
        }
        if self.heads == 0 {
            return Err(GatError::config("heads须≥1"));
        }
        if self.num_classes == 0 {
            return Err(GatError::shape_mismatch(&[1], &[0], "num_classes（输出层每个头的维度）须为正数"));
        }
        if self.hidden_dim == 0 && self.num_layers > 1 {
            return Err(GatError::shape_mismatch(&[1], &[0], "hidden_dim（每个头的维度）须为正数"));
        }
        check_dropout(self.dropout)?;
        if !self.negative_slope.is_finite() {
            return Err(GatError::config(format!(
                "negative_slope须为有限值，实际为{}",
                self.negative_slope
            )));
        }
        Ok(())
    }

    /// 解析 JSON 并校验
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
