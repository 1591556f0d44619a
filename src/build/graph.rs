use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("未注册的任务：{0}")]
    UnknownTask(String),

    #[error("任务 {task} 依赖未注册的任务 {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("任务依赖存在循环：{}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// 任务依赖图：节点为任务，边表示“必须先于”
#[derive(Debug, Default)]
pub struct TaskGraph {
    deps: BTreeMap<String, Vec<String>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加任务及其上游依赖
    pub fn add(&mut self, task: &str, dependencies: &[&str]) {
        self.deps.insert(
            task.to_owned(),
            dependencies.iter().map(|d| (*d).to_owned()).collect(),
        );
    }

    /// Kahn 算法分层拓扑排序：每层内的任务互不依赖，可并发执行；层内按名称排序
    pub fn levels(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();

        for name in self.deps.keys() {
            in_degree.entry(name.as_str()).or_insert(0);
            adj.entry(name.as_str()).or_default();
        }

        for (name, deps) in &self.deps {
            for dep in deps {
                if !self.deps.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                }
                // dep 应该在 name 之前执行，即 dep -> name 的边
                adj.entry(dep.as_str()).or_default().push(name.as_str());
                *in_degree.entry(name.as_str()).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut levels = Vec::new();
        let mut visited = 0;
        while !queue.is_empty() {
            let mut batch: Vec<&str> = queue.drain(..).collect();
            batch.sort();
            for node in &batch {
                visited += 1;
                if let Some(neighbors) = adj.get(node) {
                    for &next in neighbors {
                        if let Some(deg) = in_degree.get_mut(next) {
                            *deg -= 1;
                            if *deg == 0 {
                                queue.push_back(next);
                            }
                        }
                    }
                }
            }
            levels.push(batch.into_iter().map(str::to_owned).collect());
        }

        if visited != self.deps.len() {
            let mut stuck: Vec<String> = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(name, _)| name.to_owned())
                .collect();
            stuck.sort();
            return Err(GraphError::Cycle(stuck));
        }

        Ok(levels)
    }
}
