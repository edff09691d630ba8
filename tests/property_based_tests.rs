use evidence_acquisition::constants::PROGRESS_MAX;
use evidence_acquisition::events::{ProgressMeter, ProgressSink};
use evidence_acquisition::i18n::Translations;
use evidence_acquisition::registry::ClassNameTable;
use proptest::prelude::*;

proptest! {
    #[test]
    fn progress_stays_within_bounds_and_never_decreases(
        deltas in prop::collection::vec(-50.0f64..150.0, 0..64)
    ) {
        let meter = ProgressMeter::new();
        let mut previous = meter.value();
        for delta in deltas {
            meter.advance(delta);
            let value = meter.value();
            prop_assert!((0.0..=PROGRESS_MAX).contains(&value));
            prop_assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn per_task_increments_fill_the_meter(task_count in 1usize..200) {
        let meter = ProgressMeter::new();
        let increment = PROGRESS_MAX / task_count as f64;
        for _ in 0..task_count {
            meter.advance(increment);
        }
        prop_assert!((meter.value() - PROGRESS_MAX).abs() < 1e-6);
    }

    #[test]
    fn unknown_names_resolve_to_themselves(name in "[a-z][a-z0-9_]{0,24}") {
        // built-in identifiers are upper case
        let table = ClassNameTable::new();
        prop_assert_eq!(table.resolve(&name), name);
    }

    #[test]
    fn format_consumes_at_most_the_given_arguments(
        args in prop::collection::vec("[a-zA-Z0-9 ]{0,12}", 0..4)
    ) {
        let translations = Translations::english();
        let display: Vec<&dyn std::fmt::Display> =
            args.iter().map(|a| a as &dyn std::fmt::Display).collect();
        let text = translations.format("TASK_TIMEOUT", &display);
        let placeholders_left = text.matches("{}").count();
        prop_assert_eq!(placeholders_left, 2usize.saturating_sub(args.len()));
    }
}

mod fan_in {
    use async_trait::async_trait;
    use evidence_acquisition::config::ExecutionConfig;
    use evidence_acquisition::events::{ProgressMeter, StatusLine};
    use evidence_acquisition::i18n::Translations;
    use evidence_acquisition::state_machine::TaskState;
    use evidence_acquisition::task::{
        Task, TaskHandler, TaskProfile, TaskSinks, TaskWorker, WorkerContext, WorkerFailure,
        WorkerOutcome,
    };
    use proptest::prelude::*;
    use std::sync::Arc;

    struct Idle;

    #[async_trait]
    impl TaskWorker for Idle {
        async fn run(&self, _ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
            Ok(WorkerOutcome::success())
        }
    }

    /// One task per flag; `true` tasks are closed before they start (COMPLETED)
    fn handler_with(completed: &[bool]) -> (TaskHandler, Vec<String>) {
        let handler = TaskHandler::new();
        let sinks = TaskSinks::new(Arc::new(ProgressMeter::new()), Arc::new(StatusLine::new()));
        let translations = Arc::new(Translations::english());
        let mut names = Vec::new();
        for (i, done) in completed.iter().enumerate() {
            let name = format!("Task{i}");
            let task = Task::new(
                TaskProfile::new(name.clone(), name.clone()),
                Arc::new(Idle),
                Arc::clone(&translations),
                sinks.clone(),
                ExecutionConfig::default(),
                &handler,
            );
            if *done {
                task.stop_task("").unwrap();
            }
            names.push(name);
        }
        (handler, names)
    }

    proptest! {
        #[test]
        fn same_state_holds_only_when_every_task_agrees(
            completed in prop::collection::vec(any::<bool>(), 0..12)
        ) {
            let (handler, names) = handler_with(&completed);
            let all_done = !completed.is_empty() && completed.iter().all(|c| *c);
            let none_done = !completed.is_empty() && completed.iter().all(|c| !*c);

            prop_assert_eq!(
                handler.are_task_names_in_the_same_state(&names, TaskState::Completed),
                all_done
            );
            prop_assert_eq!(
                handler.are_task_names_in_the_same_state(&names, TaskState::Initialized),
                none_done
            );
        }

        #[test]
        fn unknown_names_never_change_the_verdict(
            completed in prop::collection::vec(any::<bool>(), 1..8),
            unknown in prop::collection::vec("Missing[A-Z]{1,6}", 0..4)
        ) {
            let (handler, names) = handler_with(&completed);
            let mut with_unknown = names.clone();
            with_unknown.extend(unknown);

            prop_assert_eq!(
                handler.are_task_names_in_the_same_state(&with_unknown, TaskState::Completed),
                handler.are_task_names_in_the_same_state(&names, TaskState::Completed)
            );
            prop_assert!(!handler.are_task_names_in_the_same_state(
                &with_unknown[names.len()..],
                TaskState::Completed
            ));
        }
    }
}
