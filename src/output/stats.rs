//! Statistics about the shared frontier
//!
//! This module provides functionality for extracting and displaying
//! task and document counts from the storage layer.

use crate::state::TaskStatus;
use crate::storage::{FrontierStore, StorageResult};
use std::collections::BTreeMap;

/// Frontier statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontierStatistics {
    /// Total number of tasks ever added or discovered
    pub total_tasks: u64,

    /// Count of tasks by status; statuses with no tasks are absent
    pub tasks_by_status: BTreeMap<TaskStatus, u64>,

    /// Total number of stored documents
    pub total_documents: u64,

    /// Count of documents by scope
    pub documents_by_scope: BTreeMap<String, u64>,
}

impl FrontierStatistics {
    pub fn count(&self, status: TaskStatus) -> u64 {
        self.tasks_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Tasks that will never be claimed again
    pub fn finished_tasks(&self) -> u64 {
        self.tasks_by_status
            .iter()
            .filter(|(status, _)| status.is_terminal())
            .map(|(_, count)| count)
            .sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(FrontierStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn FrontierStore) -> StorageResult<FrontierStatistics> {
    let tasks_by_status = storage.count_tasks_by_status()?;
    let documents_by_scope = storage.count_documents_by_scope()?;

    Ok(FrontierStatistics {
        total_tasks: tasks_by_status.values().sum(),
        tasks_by_status,
        total_documents: documents_by_scope.values().sum(),
        documents_by_scope,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &FrontierStatistics) {
    println!("=== Frontier Statistics ===\n");

    println!("Overview:");
    println!("  Total tasks: {}", stats.total_tasks);
    println!("  Stored documents: {}", stats.total_documents);
    println!();

    println!("Tasks by Status:");
    for status in TaskStatus::all_statuses() {
        let count = stats.count(status);
        let percentage = if stats.total_tasks > 0 {
            (count as f64 / stats.total_tasks as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.documents_by_scope.is_empty() {
        println!("Documents by Scope ({}):", stats.documents_by_scope.len());
        let mut scope_counts: Vec<_> = stats.documents_by_scope.iter().collect();
        scope_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (scope, count) in scope_counts {
            println!("  {}: {}", scope, count);
        }
        println!();
    }

    println!(
        "Finished: {} / {} tasks ({} done, {} failed, {} ignored)",
        stats.finished_tasks(),
        stats.total_tasks,
        stats.count(TaskStatus::Done),
        stats.count(TaskStatus::Failed),
        stats.count(TaskStatus::Ignored)
    );
}
