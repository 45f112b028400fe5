/*
 * @Description  : 参数初始化方案
 */

use ndarray::{Array1, Array2};
use rand::Rng;
use rand::distributions::{Distribution, Uniform};

/// 参数初始化方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    /// 常数初始化
    Constant(f32),
    /// 全零
    Zeros,
    /// [-bound, bound]上的均匀分布
    Uniform { bound: f32 },
    /// Xavier/Glorot 均匀分布：bound = sqrt(6 / (fan_in + fan_out))
    XavierUniform,
}

impl Init {
    /// 按`[rows, cols]`生成参数矩阵（使用调用方提供的 RNG）
    pub fn matrix<R: Rng + ?Sized>(&self, rows: usize, cols: usize, rng: &mut R) -> Array2<f32> {
        match self {
            Self::Constant(v) => Array2::from_elem((rows, cols), *v),
            Self::Zeros => Array2::zeros((rows, cols)),
            Self::Uniform { bound } => sample_uniform(*bound, rows * cols, rng)
                .into_shape((rows, cols))
                .expect("元素个数与形状一致"),
            Self::XavierUniform => {
                let bound = xavier_bound(rows, cols);
                sample_uniform(bound, rows * cols, rng)
                    .into_shape((rows, cols))
                    .expect("元素个数与形状一致")
            }
        }
    }

    /// 生成一维参数（如偏置）
    pub fn vector<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Array1<f32> {
        match self {
            Self::Constant(v) => Array1::from_elem(len, *v),
            Self::Zeros => Array1::zeros(len),
            Self::Uniform { bound } => sample_uniform(*bound, len, rng),
            Self::XavierUniform => {
                let bound = xavier_bound(len, 1);
                sample_uniform(bound, len, rng)
            }
        }
    }
}

/// Xavier/Glorot 均匀分布的边界：sqrt(6 / (fan_in + fan_out))
pub(crate) fn xavier_bound(fan_in: usize, fan_out: usize) -> f32 {
    (6.0 / (fan_in + fan_out).max(1) as f32).sqrt()
}

fn sample_uniform<R: Rng + ?Sized>(bound: f32, len: usize, rng: &mut R) -> Array1<f32> {
    if bound <= 0.0 {
        return Array1::zeros(len);
    }
    let uniform = Uniform::new_inclusive(-bound, bound);
    (0..len).map(|_| uniform.sample(rng)).collect()
}
