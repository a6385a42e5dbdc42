//! Scheduler, set, and runner behavior tests

use std::path::PathBuf;
use std::sync::Arc;

use convoy_core::{EventBus, RunTally};

use crate::manager::TaskManager;
use crate::runner::Runner;
use crate::set::TaskSet;
use crate::spawn::{ScriptedSpawner, Spawner};
use crate::task::{ExecSpec, GroupKind, TaskArena, TaskContext, TaskId, TaskStatus};

fn exec(arena: &mut TaskArena, name: &str, deps: Vec<TaskId>) -> TaskId {
    arena.new_exec(
        ExecSpec {
            command: name.to_string(),
            args: Vec::new(),
            cwd: PathBuf::from("."),
        },
        TaskContext::Command {
            command: name.to_string(),
            args: Vec::new(),
        },
        deps,
    )
}

#[test]
fn test_add_orders_by_complexity() {
    // Diamond: a -> [b, c], b -> [c]
    let mut arena = TaskArena::new();
    let c = exec(&mut arena, "c", vec![]);
    let b = exec(&mut arena, "b", vec![c]);
    let a = exec(&mut arena, "a", vec![b, c]);

    let mut manager = TaskManager::new(0);
    manager.add(&mut arena, a).unwrap();

    assert_eq!(manager.order(), &[c, b, a]);
    assert_eq!(arena.get(c).complexity(), Some(0));
    assert_eq!(arena.get(b).complexity(), Some(1));
    assert_eq!(arena.get(a).complexity(), Some(2));
}

#[test]
fn test_add_is_stable_for_equal_complexity() {
    let mut arena = TaskArena::new();
    let first = exec(&mut arena, "first", vec![]);
    let second = exec(&mut arena, "second", vec![]);
    let third = exec(&mut arena, "third", vec![]);

    let mut manager = TaskManager::new(0);
    for id in [first, second, third] {
        manager.add(&mut arena, id).unwrap();
    }

    assert_eq!(manager.order(), &[first, second, third]);
}

#[test]
fn test_add_detects_cycles() {
    let mut arena = TaskArena::new();
    let a = exec(&mut arena, "a", vec![]);
    let b = exec(&mut arena, "b", vec![a]);
    arena.add_dependency(a, b);

    let mut manager = TaskManager::new(0);
    let err = manager.add(&mut arena, a).unwrap_err();
    assert!(err.to_string().contains("circular dependency"));
}

#[test]
fn test_chain_schedules_one_step_at_a_time() {
    // a depends on b depends on c, jobs = 1
    let mut arena = TaskArena::new();
    let c = exec(&mut arena, "c", vec![]);
    let b = exec(&mut arena, "b", vec![c]);
    let a = exec(&mut arena, "a", vec![b]);

    let mut manager = TaskManager::new(1);
    manager.add(&mut arena, a).unwrap();

    let effects = manager.start(&mut arena);
    assert_eq!(effects.started, vec![c]);
    assert_eq!(arena.status(c), TaskStatus::Starting);
    assert_eq!(arena.status(b), TaskStatus::Ready);

    let effects = manager.on_completed(&mut arena, c, false);
    assert_eq!(effects.completed, vec![c]);
    assert_eq!(effects.started, vec![b]);

    let effects = manager.on_completed(&mut arena, b, false);
    assert_eq!(effects.started, vec![a]);

    let effects = manager.on_completed(&mut arena, a, false);
    assert!(effects.started.is_empty());
    assert_eq!(arena.status(a), TaskStatus::Done);
}

#[test]
fn test_failed_dependency_blocks_dependents() {
    let mut arena = TaskArena::new();
    let b = exec(&mut arena, "b", vec![]);
    let c = exec(&mut arena, "c", vec![]);
    let a = exec(&mut arena, "a", vec![b, c]);

    let mut manager = TaskManager::new(0);
    let mut set = TaskSet::new();
    set.add(&mut manager, &mut arena, a).unwrap();

    let effects = set.start(&mut manager, &mut arena).unwrap();
    assert_eq!(effects.started, vec![b, c]);

    let effects = manager.on_completed(&mut arena, b, true);
    for id in effects.completed {
        set.on_completed(&arena, id);
    }
    assert!(!set.is_finished());

    let effects = manager.on_completed(&mut arena, c, false);
    assert!(effects.started.is_empty());
    for id in effects.completed {
        set.on_completed(&arena, id);
    }

    // a never starts and is not counted; the set still finishes
    assert_eq!(arena.status(a), TaskStatus::Ready);
    assert!(set.is_finished());
    assert_eq!(set.results(), RunTally { success: 1, failed: 1 });
}

#[test]
fn test_completion_is_idempotent() {
    let mut arena = TaskArena::new();
    let a = exec(&mut arena, "a", vec![]);
    let mut manager = TaskManager::new(0);
    manager.add(&mut arena, a).unwrap();
    manager.start(&mut arena);

    let first = manager.on_completed(&mut arena, a, false);
    assert_eq!(first.completed, vec![a]);
    let second = manager.on_completed(&mut arena, a, true);
    assert!(second.is_empty());
    assert_eq!(arena.status(a), TaskStatus::Done);
}

#[test]
fn test_sequence_group_fails_fast() {
    let mut arena = TaskArena::new();
    let group = arena.new_group(GroupKind::Sequence, vec![]);
    let c1 = exec(&mut arena, "c1", vec![]);
    let c2 = exec(&mut arena, "c2", vec![]);
    arena.push_child(group, c1).unwrap();
    arena.push_child(group, c2).unwrap();

    let mut manager = TaskManager::new(0);
    manager.add(&mut arena, group).unwrap();
    let effects = manager.start(&mut arena);
    assert!(effects.started.contains(&c1));
    assert!(effects.started.contains(&group));
    assert!(!effects.started.contains(&c2));

    manager.on_spawned(&mut arena, c1);
    manager.on_spawned(&mut arena, group);

    let effects = manager.on_completed(&mut arena, c1, true);
    // The group fails as soon as its first child does; the second child
    // never starts.
    assert_eq!(effects.completed, vec![c1, group]);
    assert_eq!(arena.status(group), TaskStatus::Failed);
    assert_eq!(arena.status(c2), TaskStatus::Ready);
}

#[test]
fn test_parallel_group_children_share_one_slot_pool() {
    let mut arena = TaskArena::new();
    let group = arena.new_group(GroupKind::Parallel, vec![]);
    let c1 = exec(&mut arena, "c1", vec![]);
    let c2 = exec(&mut arena, "c2", vec![]);
    arena.push_child(group, c1).unwrap();
    arena.push_child(group, c2).unwrap();

    let mut manager = TaskManager::new(1);
    manager.add(&mut arena, group).unwrap();
    let effects = manager.start(&mut arena);

    // One slot: the first child takes it; the group itself never occupies
    // a slot, so it starts alongside.
    assert_eq!(effects.started, vec![c1, group]);
    assert_eq!(manager.active(), 1);

    let effects = manager.on_completed(&mut arena, c1, false);
    assert_eq!(effects.started, vec![c2]);

    let effects = manager.on_completed(&mut arena, c2, false);
    assert_eq!(effects.completed, vec![c2, group]);
    assert_eq!(arena.status(group), TaskStatus::Done);
}

#[test]
fn test_group_with_blocked_child_settles_as_failure() {
    // The group's own dependencies are fine, but one child waits on an
    // unrelated task that fails: the group must not hang.
    let mut arena = TaskArena::new();
    let upstream = exec(&mut arena, "upstream", vec![]);
    let group = arena.new_group(GroupKind::Parallel, vec![]);
    let c1 = exec(&mut arena, "c1", vec![]);
    let c2 = exec(&mut arena, "c2", vec![]);
    arena.push_child(group, c1).unwrap();
    arena.push_child(group, c2).unwrap();
    arena.add_dependency(c2, upstream);

    let mut manager = TaskManager::new(0);
    manager.add(&mut arena, group).unwrap();
    manager.start(&mut arena);
    manager.on_spawned(&mut arena, group);

    manager.on_completed(&mut arena, c1, false);
    let effects = manager.on_completed(&mut arena, upstream, true);
    assert!(effects.completed.contains(&group));
    assert_eq!(arena.status(group), TaskStatus::Failed);
    assert_eq!(arena.status(c2), TaskStatus::Ready);
}

#[test]
fn test_set_lifecycle_guards() {
    let mut arena = TaskArena::new();
    let mut manager = TaskManager::new(0);

    let mut set = TaskSet::new();
    let effects = set.start(&mut manager, &mut arena).unwrap();
    assert!(effects.is_empty());
    assert!(set.is_finished());
    assert_eq!(set.results(), RunTally::default());

    let a = exec(&mut arena, "a", vec![]);
    let err = set.add(&mut manager, &mut arena, a).unwrap_err();
    assert!(err.to_string().contains("cannot add tasks"));
    let err = set.start(&mut manager, &mut arena).unwrap_err();
    assert!(err.to_string().contains("already been started"));
}

#[test]
fn test_set_counts_weight_units() {
    let mut arena = TaskArena::new();
    let a = exec(&mut arena, "a", vec![]);
    arena.set_weight(a, 5);

    let mut manager = TaskManager::new(0);
    let mut set = TaskSet::new();
    set.add(&mut manager, &mut arena, a).unwrap();
    set.start(&mut manager, &mut arena).unwrap();

    let effects = manager.on_completed(&mut arena, a, false);
    for id in effects.completed {
        set.on_completed(&arena, id);
    }
    assert!(set.is_finished());
    assert_eq!(set.results(), RunTally { success: 5, failed: 0 });
}

#[test]
fn test_set_tracks_group_children() {
    let mut arena = TaskArena::new();
    let group = arena.new_group(GroupKind::Sequence, vec![]);
    let c1 = exec(&mut arena, "c1", vec![]);
    arena.push_child(group, c1).unwrap();

    let mut manager = TaskManager::new(0);
    let mut set = TaskSet::new();
    set.add(&mut manager, &mut arena, group).unwrap();
    assert_eq!(set.len(), 2);

    let ordered = set.tasks(&manager);
    assert_eq!(ordered, vec![c1, group]);
}

#[tokio::test]
async fn test_runner_finishes_empty_set_immediately() {
    let arena = TaskArena::new();
    let manager = TaskManager::new(0);
    let set = TaskSet::new();

    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let runner = Runner::new(arena, manager, set, bus, Arc::new(ScriptedSpawner::new()));
    let tally = runner.run().await.unwrap();
    assert_eq!(tally, RunTally::default());

    // RunStarted then RunFinished with the zero tally, nothing in between
    let mut finished = None;
    while let Ok(event) = rx.try_recv() {
        if let convoy_core::Event::Run(convoy_core::RunEvent::RunFinished { tally }) = event {
            finished = Some(tally);
        }
    }
    assert_eq!(finished, Some(RunTally::default()));
}

#[tokio::test]
async fn test_runner_executes_chain() {
    let mut arena = TaskArena::new();
    let c = exec(&mut arena, "c", vec![]);
    let b = exec(&mut arena, "b", vec![c]);
    let a = exec(&mut arena, "a", vec![b]);

    let mut manager = TaskManager::new(1);
    let mut set = TaskSet::new();
    set.add(&mut manager, &mut arena, a).unwrap();

    let spawner = Arc::new(ScriptedSpawner::new());
    let runner = Runner::new(
        arena,
        manager,
        set,
        EventBus::default(),
        Arc::clone(&spawner) as Arc<dyn Spawner>,
    );
    let tally = runner.run().await.unwrap();

    assert_eq!(tally, RunTally { success: 3, failed: 0 });
    assert_eq!(spawner.launched(), vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_runner_isolates_failures() {
    let mut arena = TaskArena::new();
    let b = exec(&mut arena, "b", vec![]);
    let c = exec(&mut arena, "c", vec![]);
    let a = exec(&mut arena, "a", vec![b, c]);

    let mut manager = TaskManager::new(0);
    let mut set = TaskSet::new();
    set.add(&mut manager, &mut arena, a).unwrap();

    let spawner = Arc::new(ScriptedSpawner::new().exit_with("b", 1));
    let runner = Runner::new(
        arena,
        manager,
        set,
        EventBus::default(),
        Arc::clone(&spawner) as Arc<dyn Spawner>,
    );
    let tally = runner.run().await.unwrap();

    assert_eq!(tally, RunTally { success: 1, failed: 1 });
    assert!(!spawner.launched().contains(&"a".to_string()));
}

#[tokio::test]
async fn test_runner_executes_sequence_group() {
    let mut arena = TaskArena::new();
    let group = arena.new_group(GroupKind::Sequence, vec![]);
    let first = exec(&mut arena, "first", vec![]);
    let second = exec(&mut arena, "second", vec![]);
    arena.push_child(group, first).unwrap();
    arena.push_child(group, second).unwrap();

    let mut manager = TaskManager::new(0);
    let mut set = TaskSet::new();
    set.add(&mut manager, &mut arena, group).unwrap();

    let spawner = Arc::new(ScriptedSpawner::new());
    let runner = Runner::new(
        arena,
        manager,
        set,
        EventBus::default(),
        Arc::clone(&spawner) as Arc<dyn Spawner>,
    );
    let tally = runner.run().await.unwrap();

    // Two children plus the group itself
    assert_eq!(tally, RunTally { success: 3, failed: 0 });
    assert_eq!(spawner.launched(), vec!["first", "second"]);
}
