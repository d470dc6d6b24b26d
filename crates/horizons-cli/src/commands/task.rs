//! Task command handlers

use anyhow::{bail, Result};

use horizons_core::{Horizon, Priority, Task, TaskStore};

use crate::output::Output;

/// Fields for a new task
pub struct NewTask {
    pub title: String,
    pub horizon: Horizon,
    pub priority: Priority,
    pub description: Option<String>,
    pub cascade: Vec<Horizon>,
}

/// Create a task
pub fn add(store: &mut TaskStore, new: NewTask, output: &Output) -> Result<()> {
    let title = new.title.trim();
    if title.is_empty() {
        bail!("Task title cannot be empty");
    }

    let cascades_to = cascade_targets(&new.horizon, new.cascade);
    let mut task = Task::new(title, new.horizon);
    task.priority = new.priority;
    task.description = new.description.unwrap_or_default();
    task.cascades_to = cascades_to;

    store.add_task(task.clone())?;
    output.task_changed("Added", &task);
    Ok(())
}

/// List tasks, open ones only unless `all`
pub fn list(store: &TaskStore, horizon: Option<Horizon>, all: bool, output: &Output) -> Result<()> {
    let tasks: Vec<&Task> = match horizon {
        Some(horizon) => store.tasks_in(horizon),
        None => store.tasks().iter().collect(),
    };
    let tasks: Vec<&Task> = tasks.into_iter().filter(|t| all || !t.completed).collect();

    output.print_tasks(&tasks);
    Ok(())
}

/// Show one task
pub fn show(store: &TaskStore, id: &str, output: &Output) -> Result<()> {
    let task = store.find_task(id)?;
    output.print_task(task);
    Ok(())
}

pub fn done(store: &mut TaskStore, id: &str, output: &Output) -> Result<()> {
    let task = store.complete_task(id)?;
    output.task_changed("Completed", &task);
    Ok(())
}

pub fn reopen(store: &mut TaskStore, id: &str, output: &Output) -> Result<()> {
    let task = store.reopen_task(id)?;
    output.task_changed("Reopened", &task);
    Ok(())
}

pub fn remove(store: &mut TaskStore, id: &str, output: &Output) -> Result<()> {
    let task = store.delete_task(id)?;
    output.task_changed("Deleted", &task);
    Ok(())
}

/// Cascade horizons, without the home horizon and without repeats
fn cascade_targets(home: &Horizon, requested: Vec<Horizon>) -> Vec<Horizon> {
    let mut targets = Vec::new();
    for horizon in requested {
        if horizon != *home && !targets.contains(&horizon) {
            targets.push(horizon);
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use horizons_core::MemoryStore;

    use crate::output::OutputFormat;

    fn store() -> TaskStore {
        TaskStore::open(Arc::new(MemoryStore::new())).unwrap()
    }

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_cascade_targets() {
        let targets = cascade_targets(
            &Horizon::Years,
            vec![Horizon::Months, Horizon::Years, Horizon::Months, Horizon::Weeks],
        );
        assert_eq!(targets, vec![Horizon::Months, Horizon::Weeks]);
    }

    #[test]
    fn test_add_rejects_blank_title() {
        let mut store = store();
        let new = NewTask {
            title: "   ".to_string(),
            horizon: Horizon::Days,
            priority: Priority::Medium,
            description: None,
            cascade: vec![],
        };
        assert!(add(&mut store, new, &quiet()).is_err());
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn test_add_then_done_then_remove() {
        let mut store = store();
        let new = NewTask {
            title: " Plan the quarter ".to_string(),
            horizon: Horizon::Months,
            priority: Priority::High,
            description: Some("roadmap".to_string()),
            cascade: vec![Horizon::Weeks],
        };
        add(&mut store, new, &quiet()).unwrap();

        let task = store.tasks()[0].clone();
        assert_eq!(task.title, "Plan the quarter");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.cascades_to, vec![Horizon::Weeks]);

        done(&mut store, &task.id[..8], &quiet()).unwrap();
        assert!(store.tasks()[0].completed);

        reopen(&mut store, &task.id, &quiet()).unwrap();
        assert!(!store.tasks()[0].completed);

        remove(&mut store, &task.id, &quiet()).unwrap();
        assert!(store.tasks().is_empty());
    }
}
