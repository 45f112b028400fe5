/*
 * @Description  : 图结构：节点数 + 有向边列表，以及添加自环后按目标节点分组的CSR视图
 */

use log::trace;
use serde::{Deserialize, Serialize};

use crate::errors::{GatError, Result};


/// 有向图（允许重边）。边为`(source, destination)`，索引从0开始。
/// 通过`Graph::new`创建的图保证所有索引都在`[0, num_nodes)`范围内。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    num_nodes: usize,
    edges: Vec<(usize, usize)>,
}

impl Graph {
    /// 创建图并校验边索引，越界时返回`GatError::InvalidGraph`
    pub fn new(num_nodes: usize, edges: Vec<(usize, usize)>) -> Result<Self> {
        let graph = Self { num_nodes, edges };
        graph.validate()?;
        Ok(graph)
    }

    /// 仅含孤立节点的图
    pub fn empty(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            edges: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (edge_index, &(src, dst)) in self.edges.iter().enumerate() {
            if src >= self.num_nodes || dst >= self.num_nodes {
                return Err(GatError::InvalidGraph {
                    edge_index,
                    src_node: src,
                    dst_node: dst,
                    num_nodes: self.num_nodes,
                });
            }
        }
        Ok(())
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// 为每个节点追加一条自环`(i, i)`，返回新的增广图，`self`保持不变。
    ///
    /// 增广边的顺序：先是全部原始边（顺序不变），再是节点`0..n`的自环。
    /// 反序列化得到的图未经校验，故这里会重新校验一次。
    pub fn add_self_loops(&self) -> Result<AugmentedGraph> {
        self.validate()?;
        let n = self.num_nodes;
        let num_edges = self.edges.len() + n;

        let mut sources = Vec::with_capacity(num_edges);
        let mut destinations = Vec::with_capacity(num_edges);
        for &(src, dst) in &self.edges {
            sources.push(src);
            destinations.push(dst);
        }
        sources.extend(0..n);
        destinations.extend(0..n);

        // 按目标节点做稳定的计数排序，得到CSR的offsets
        let mut offsets = vec![0usize; n + 1];
        for &dst in &destinations {
            offsets[dst + 1] += 1;
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }
        let mut cursor = offsets[..n].to_vec();
        let mut order = vec![0usize; num_edges];
        for (edge_id, &dst) in destinations.iter().enumerate() {
            order[cursor[dst]] = edge_id;
            cursor[dst] += 1;
        }

        trace!(
            "图增广：{}个节点，{}条原始边 -> {}条边（含自环）",
            n,
            self.edges.len(),
            num_edges
        );

        Ok(AugmentedGraph {
            num_nodes: n,
            num_original_edges: self.edges.len(),
            sources,
            destinations,
            offsets,
            order,
        })
    }
}

/// 添加自环后的图。
///
/// 除了原始顺序的边列表外，还保存按目标节点分组的CSR布局：
/// `order[offsets[i]..offsets[i + 1]]`即为所有目标为`i`的边id（组内保持增广边原有顺序）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedGraph {
    num_nodes: usize,
    num_original_edges: usize,
    sources: Vec<usize>,
    destinations: Vec<usize>,
    offsets: Vec<usize>,
    order: Vec<usize>,
}

impl AugmentedGraph {
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// 增广后的边数（原始边数 + 节点数）
    pub fn num_edges(&self) -> usize {
        self.sources.len()
    }

    pub fn num_original_edges(&self) -> usize {
        self.num_original_edges
    }

    pub fn source(&self, edge_id: usize) -> usize {
        self.sources[edge_id]
    }

    pub fn destination(&self, edge_id: usize) -> usize {
        self.destinations[edge_id]
    }

    pub fn is_self_loop(&self, edge_id: usize) -> bool {
        edge_id >= self.num_original_edges
    }

    /// 按增广顺序返回全部边
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.sources
            .iter()
            .copied()
            .zip(self.destinations.iter().copied())
            .collect()
    }

    /// 目标为`node`的所有入边id
    pub fn incoming(&self, node: usize) -> &[usize] {
        &self.order[self.offsets[node]..self.offsets[node + 1]]
    }

    /// 含自环的入度，恒≥1
    pub fn in_degree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// 对称归一化邻接`D^{-1/2} (A + I) D^{-1/2}`在每条增广边上的取值，
    /// 其中度数按目标节点（即邻接矩阵的行）统计，重边会累加。
    pub fn symmetric_norm_weights(&self) -> Vec<f32> {
        let inv_sqrt_degree: Vec<f32> = (0..self.num_nodes)
            .map(|i| {
                let degree = self.in_degree(i) as f32;
                if degree > 0.0 { degree.powf(-0.5) } else { 0.0 }
            })
            .collect();
        self.sources
            .iter()
            .zip(&self.destinations)
            .map(|(&src, &dst)| inv_sqrt_degree[dst] * inv_sqrt_degree[src])
            .collect()
    }
}
