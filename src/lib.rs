//! # Only GAT
//!
//! `only_gat`用纯rust实现图注意力网络（GAT）的前向计算：
//! 在任意有向图上做基于注意力的消息传递，支持两种注意力策略（按目标节点分段 softmax、
//! 邻域内稠密缩放点积），多头拼接/平均，以及多层堆叠后输出按行 log_softmax 的分类概率。
//!
//! 梯度计算与参数优化不在本crate范围内：参数由外部训练框架通过各层的`set_*`方法替换。
//!
//! ```ignore
//! use only_gat::graph::Graph;
//! use only_gat::nn::{ForwardContext, GatConfig, GatNetwork};
//!
//! let graph = Graph::new(3, vec![(0, 1), (1, 2)])?;
//! let network = GatNetwork::new(&GatConfig::new(4, 3, 2).with_heads(2), &mut rng)?;
//! let log_probs = network.forward(&features, &graph, &mut ForwardContext::eval())?;
//! ```

pub mod errors;
pub mod graph;
pub mod nn;
pub mod utils;
