/*
 * @Description  : 网络层：线性投影、图注意力层、图卷积层
 */

pub(crate) mod gat_conv;
mod gcn;
mod linear;

pub use gat_conv::{GatConv, GatConvOptions, LayerOutput};
pub use gcn::{GcnConv, GcnNetwork};
pub use linear::Linear;
