/*
 * @Description  : 前向传播上下文：train/eval 模式 + 调用方提供的随机数发生器（仅供 dropout 使用）
 */

use ndarray::{ArrayBase, DataMut, Dimension};
use rand::{Rng, RngCore};

/// 单次前向传播的上下文。
///
/// eval 模式下 dropout 为恒等映射，不需要随机数发生器；
/// train 模式下所有 dropout 掩码都按固定顺序从同一个发生器中依次采样，
/// 因此相同种子下结果可复现。
pub struct ForwardContext<'a> {
    rng: Option<&'a mut dyn RngCore>,
}

impl<'a> ForwardContext<'a> {
    pub fn eval() -> Self {
        Self { rng: None }
    }

    pub fn train(rng: &'a mut dyn RngCore) -> Self {
        Self { rng: Some(rng) }
    }

    pub fn is_training(&self) -> bool {
        self.rng.is_some()
    }

    /// inverted dropout：以概率`p`置零，其余元素乘以`1 / (1 - p)`。
    /// 按逻辑（行优先）顺序遍历元素；eval 模式或`p == 0`时不做任何事。
    pub fn dropout<S, D>(&mut self, values: &mut ArrayBase<S, D>, p: f32)
    where
        S: DataMut<Elem = f32>,
        D: Dimension,
    {
        let Some(rng) = self.rng.as_deref_mut() else {
            return;
        };
        if p <= 0.0 {
            return;
        }
        if p >= 1.0 {
            values.fill(0.0);
            return;
        }
        let scale = 1.0 / (1.0 - p);
        for v in values.iter_mut() {
            if rng.r#gen::<f32>() < p {
                *v = 0.0;
            } else {
                *v *= scale;
            }
        }
    }
}
