//! 模块依赖图
//!
//! 记录模块之间"A 依赖 B"的关系，用于注册时的循环检测、
//! 查找依赖方以及计算启用顺序。
//!
//! 节点按名称排序存储，所有输出顺序都是确定的。
//!
//! # 示例
//!
//! ```rust
//! use chips_modules::module::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_dependency("Reports", "Core");
//!
//! assert_eq!(graph.dependents_of("Core"), vec!["Reports".to_string()]);
//! assert_eq!(graph.load_order().unwrap(), vec!["Core".to_string(), "Reports".to_string()]);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::utils::{CoreError, Result};

/// 模块依赖图
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// 模块 -> 它依赖的模块
    edges: BTreeMap<String, BTreeSet<String>>,
    /// 模块 -> 依赖它的模块
    reverse_edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// 创建空图
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加节点，已存在时不变
    pub fn add_module(&mut self, name: &str) {
        self.edges.entry(name.to_string()).or_default();
        self.reverse_edges.entry(name.to_string()).or_default();
    }

    /// 添加依赖边：`name` 依赖 `dependency`
    pub fn add_dependency(&mut self, name: &str, dependency: &str) {
        self.add_module(name);
        self.add_module(dependency);
        self.edges
            .entry(name.to_string())
            .or_default()
            .insert(dependency.to_string());
        self.reverse_edges
            .entry(dependency.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// 删除节点的所有出边，节点本身和入边保留
    ///
    /// 模块重新注册（依赖列表可能变化）前调用。
    pub fn clear_dependencies(&mut self, name: &str) {
        if let Some(deps) = self.edges.get_mut(name) {
            for dep in std::mem::take(deps) {
                if let Some(rev) = self.reverse_edges.get_mut(&dep) {
                    rev.remove(name);
                }
            }
        }
    }

    /// 直接依赖
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.edges
            .get(name)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 直接依赖方
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.reverse_edges
            .get(name)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 是否包含节点
    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// 节点数量
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 是否存在环
    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// 查找一个环，返回首尾相同的路径，例如 `[A, B, A]`
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for node in self.edges.keys() {
            if let Some(cycle) = self.visit(node, &mut visited, &mut on_stack, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        on_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if on_stack.contains(node) {
            let start = path.iter().position(|n| n == node).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if !visited.insert(node.to_string()) {
            return None;
        }

        on_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if let Some(cycle) = self.visit(dep, visited, on_stack, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        on_stack.remove(node);
        None
    }

    /// 如果 `name` 的依赖改为 `dependencies`，是否会形成环
    pub fn cycle_with(&self, name: &str, dependencies: &[String]) -> Option<Vec<String>> {
        let mut candidate = self.clone();
        candidate.clear_dependencies(name);
        candidate.add_module(name);
        for dep in dependencies {
            candidate.add_dependency(name, dep);
        }
        candidate.find_cycle()
    }

    /// 启用顺序（Kahn 算法）：依赖在前，同层按名称排序
    pub fn load_order(&self) -> Result<Vec<String>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(CoreError::CircularDependency(cycle.join(" -> ")));
        }

        let mut pending: BTreeMap<&str, usize> = self
            .edges
            .iter()
            .map(|(node, deps)| (node.as_str(), deps.len()))
            .collect();
        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut order = Vec::with_capacity(self.edges.len());
        while let Some(node) = ready.pop_first() {
            order.push(node.to_string());
            if let Some(dependents) = self.reverse_edges.get(node) {
                for dependent in dependents {
                    if let Some(count) = pending.get_mut(dependent.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            ready.insert(dependent.as_str());
                        }
                    }
                }
            }
        }

        if order.len() != self.edges.len() {
            return Err(CoreError::CircularDependency("无法完成拓扑排序".to_string()));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_dependency_links_both_directions() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("Reports", "Core");
        graph.add_dependency("Reports", "Core");

        assert_eq!(graph.dependencies_of("Reports"), names(&["Core"]));
        assert_eq!(graph.dependents_of("Core"), names(&["Reports"]));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_find_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A", "B");
        graph.add_dependency("B", "C");
        assert!(!graph.has_cycle());

        graph.add_dependency("C", "A");
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A", "A");
        assert_eq!(graph.find_cycle(), Some(names(&["A", "A"])));
    }

    #[test]
    fn test_cycle_with_candidate() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("Blog", "Core");

        assert!(graph.cycle_with("Core", &names(&["Blog"])).is_some());
        assert!(graph.cycle_with("Core", &names(&["Base"])).is_none());
        // 候选检查不修改原图
        assert!(graph.dependencies_of("Core").is_empty());
    }

    #[test]
    fn test_load_order_is_deterministic() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("Reports", "Core");
        graph.add_dependency("Blog", "Core");
        graph.add_module("Analytics");

        let order = graph.load_order().unwrap();
        assert_eq!(order, names(&["Analytics", "Core", "Blog", "Reports"]));
    }

    #[test]
    fn test_load_order_rejects_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A", "B");
        graph.add_dependency("B", "A");
        assert!(matches!(graph.load_order(), Err(CoreError::CircularDependency(_))));
    }
}
