//! Координатор обнаружения взаимоблокировок для RustKV
//!
//! Строит граф ожидания по таблице блокировок и ищет в нем циклы.
//! Координатор только называет транзакцию-жертву; саму отмену выполняет
//! внешний драйвер, после чего вызывает обнаружение повторно, пока оно
//! не вернет None. Каждый вызов разрывает ровно один цикл.

use crate::common::{Error, Result};
use crate::core::lock::LockTable;
use crate::core::transaction::TransactionId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Граф ожидания для обнаружения взаимоблокировок
///
/// Ребро A -> B означает, что транзакция A ожидает блокировку,
/// удерживаемую транзакцией B.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    /// Рёбра графа: транзакция -> множество транзакций, которых она ждет
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    /// Добавляет ребро в граф (waiter ждет holder)
    pub fn add_edge(&mut self, waiter: TransactionId, holder: TransactionId) {
        self.edges.entry(waiter).or_default().insert(holder);
    }

    /// Удаляет все рёбра, связанные с транзакцией
    pub fn remove_transaction(&mut self, transaction_id: TransactionId) {
        self.edges.remove(&transaction_id);
        for targets in self.edges.values_mut() {
            targets.remove(&transaction_id);
        }
    }

    /// Проверяет, пуст ли граф
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Обнаруживает цикл в графе
    ///
    /// Вершины и соседи обходятся в порядке возрастания идентификаторов:
    /// одно и то же состояние графа всегда дает один и тот же цикл.
    pub fn detect_cycle(&self) -> Option<Vec<TransactionId>> {
        let mut nodes: Vec<TransactionId> = self.edges.keys().copied().collect();
        nodes.sort();

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for transaction_id in nodes {
            if !visited.contains(&transaction_id) {
                if let Some(cycle) =
                    self.dfs_detect_cycle(transaction_id, &mut visited, &mut rec_stack, &mut path)
                {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Поиск в глубину для обнаружения циклов
    fn dfs_detect_cycle(
        &self,
        transaction_id: TransactionId,
        visited: &mut HashSet<TransactionId>,
        rec_stack: &mut HashSet<TransactionId>,
        path: &mut Vec<TransactionId>,
    ) -> Option<Vec<TransactionId>> {
        visited.insert(transaction_id);
        rec_stack.insert(transaction_id);
        path.push(transaction_id);

        if let Some(neighbors) = self.edges.get(&transaction_id) {
            let mut neighbors: Vec<TransactionId> = neighbors.iter().copied().collect();
            neighbors.sort();

            for neighbor in neighbors {
                if !visited.contains(&neighbor) {
                    if let Some(cycle) = self.dfs_detect_cycle(neighbor, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(&neighbor) {
                    // Найден цикл
                    let cycle_start = path.iter().position(|&t| t == neighbor).unwrap();
                    return Some(path[cycle_start..].to_vec());
                }
            }
        }

        path.pop();
        rec_stack.remove(&transaction_id);
        None
    }
}

/// Координатор транзакций, обнаруживающий взаимоблокировки
pub struct DeadlockCoordinator {
    /// Общая таблица блокировок
    lock_table: Arc<LockTable>,
}

impl DeadlockCoordinator {
    /// Создает координатор над таблицей блокировок
    pub fn new(lock_table: Arc<LockTable>) -> Self {
        Self { lock_table }
    }

    /// Обнаруживает взаимоблокировку и называет транзакцию для отмены
    ///
    /// Возвращает None, если циклов в графе ожидания нет. Иначе возвращает
    /// минимальный идентификатор транзакции внутри найденного цикла;
    /// повторные вызовы на том же состоянии таблицы возвращают тот же
    /// идентификатор, пока транзакция не будет отменена.
    pub fn detect_deadlocks(&self) -> Result<Option<TransactionId>> {
        let graph = self.build_wait_for_graph()?;

        match graph.detect_cycle() {
            Some(cycle) => {
                // Детерминированный выбор жертвы: минимальный xid цикла
                let victim = cycle.iter().copied().min();
                if let Some(victim) = victim {
                    log::warn!(
                        "Deadlock detected involving transactions {:?}, victim {}",
                        cycle,
                        victim
                    );
                }
                Ok(victim)
            }
            None => Ok(None),
        }
    }

    /// Строит граф ожидания по текущему состоянию таблицы блокировок
    ///
    /// Каждый ожидающий запрос на ключ ждет каждого текущего владельца
    /// этого ключа.
    fn build_wait_for_graph(&self) -> Result<WaitForGraph> {
        let mut graph = WaitForGraph::default();

        let mut keys = self.lock_table.keys()?;
        keys.sort();

        for key in keys {
            let lock = match self.lock_table.get(&key)? {
                Some(lock) => lock,
                None => continue,
            };
            let lock = lock
                .lock()
                .map_err(|_| Error::internal("Failed to acquire lock mutex".to_string()))?;

            for request in lock.requests() {
                for &holder in lock.holders() {
                    if holder != request.transaction_id {
                        graph.add_edge(request.transaction_id, holder);
                    }
                }
            }
        }

        Ok(graph)
    }
}
