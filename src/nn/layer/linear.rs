/*
 * @Description  : Linear 投影层（无偏置）
 */

use ndarray::Array2;
use rand::Rng;

use crate::errors::{GatError, Result};
use crate::nn::Init;

/// 无偏置的线性投影：`output = x @ W`
///
/// # 输入/输出形状
/// - 输入：[num_nodes, in_features]
/// - 输出：[num_nodes, out_features]
#[derive(Debug, Clone)]
pub struct Linear {
    /// 权重参数 [in_features, out_features]
    weights: Array2<f32>,
    /// 层名称（用于日志和错误信息）
    name: String,
}

impl Linear {
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        init: Init,
        name: &str,
        rng: &mut R,
    ) -> Self {
        Self {
            weights: init.matrix(in_features, out_features, rng),
            name: name.to_string(),
        }
    }

    /// 前向传播，计算 `x @ W`
    pub fn forward(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.in_features() {
            return Err(GatError::shape_mismatch(
                &[x.nrows(), self.in_features()],
                x.shape(),
                format!("{}的输入特征维度不匹配", self.name),
            ));
        }
        Ok(x.dot(&self.weights))
    }

    pub fn in_features(&self) -> usize {
        self.weights.nrows()
    }

    pub fn out_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    /// 替换权重（供外部训练框架使用），形状必须保持不变
    pub fn set_weights(&mut self, weights: Array2<f32>) -> Result<()> {
        if weights.shape() != self.weights.shape() {
            return Err(GatError::shape_mismatch(
                self.weights.shape(),
                weights.shape(),
                format!("{}的权重形状不可改变", self.name),
            ));
        }
        self.weights = weights;
        Ok(())
    }
}
