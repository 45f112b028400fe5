/*
 * @Description  : 逐元素激活函数与按行 softmax / log_softmax
 */

use ndarray::{Array2, ArrayBase, Axis, DataMut, Ix1};
use rayon::prelude::*;

/// Leaky ReLU：x ≥ 0 时为 x，否则为 negative_slope * x
#[inline]
pub fn leaky_relu(x: f32, negative_slope: f32) -> f32 {
    if x >= 0.0 { x } else { negative_slope * x }
}

/// ELU：x > 0 时为 x，否则为 alpha * (exp(x) - 1)
#[inline]
pub fn elu(x: f32, alpha: f32) -> f32 {
    if x > 0.0 { x } else { alpha * x.exp_m1() }
}

#[inline]
pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

/// 原地计算数值稳定的 softmax（先减去最大值再取指数），空切片不做处理
pub fn softmax_in_place(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum_exp = 0.0f32;
    for v in values.iter_mut() {
        *v = (*v - max_val).exp();
        sum_exp += *v;
    }
    for v in values.iter_mut() {
        *v /= sum_exp;
    }
}

/// 与`softmax_in_place`相同，但适用于任意内存布局的一维视图（如列优先矩阵的一行）
pub fn softmax_lane<S: DataMut<Elem = f32>>(values: &mut ArrayBase<S, Ix1>) {
    if values.is_empty() {
        return;
    }
    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    values.mapv_inplace(|v| (v - max_val).exp());
    let sum_exp = values.sum();
    values.mapv_inplace(|v| v / sum_exp);
}

/// 按行计算 log_softmax：x - max - ln(Σ exp(x - max))（Rayon 并行处理每一行）
pub fn log_softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let (rows, cols) = logits.dim();
    let row_results: Vec<Vec<f32>> = (0..rows)
        .into_par_iter()
        .map(|r| {
            let row = logits.index_axis(Axis(0), r);
            let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let log_sum_exp = row.iter().map(|&x| (x - max_val).exp()).sum::<f32>().ln();
            row.iter().map(|&x| x - max_val - log_sum_exp).collect()
        })
        .collect();

    let all_data: Vec<f32> = row_results.into_iter().flatten().collect();
    Array2::from_shape_vec((rows, cols), all_data).expect("元素个数与形状一致")
}
