/*
 * @Description  : 负责图神经网络层（GAT / GCN）的前向计算
 */

mod attention;
mod combine;
mod config;
mod context;
pub mod functional;
mod init;
pub mod layer;
mod network;

pub use attention::{
    Attention, AttentionKind, AttentionWeights, ComputeAttention, DenseNeighborhood, NeighborhoodWeights,
    Propagated, SegmentSoftmax,
};
pub use combine::CombineMode;
pub use config::GatConfig;
pub use context::ForwardContext;
pub use init::Init;
pub use layer::{GatConv, GatConvOptions, GcnConv, GcnNetwork, LayerOutput, Linear};
pub use network::GatNetwork;

#[cfg(test)]
mod tests;
