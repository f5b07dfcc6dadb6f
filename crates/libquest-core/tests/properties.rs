//! Property tests for the ledger invariants.

use std::rc::Rc;

use proptest::prelude::*;

use libquest_core::consistency::check_hydrate_agreement;
use libquest_core::hash::resolve_started_at;
use libquest_core::{
    project_quest_state, BatchUpdate, ManualClock, MemoryKv, QuestEvent, QuestLedger,
    QuestSnapshot,
};

#[derive(Debug, Clone)]
enum Action {
    Start(String, String),
    Advance(String, String),
    Complete(String),
    Batch(Vec<BatchUpdate>),
    Hydrate(Vec<QuestSnapshot>),
    Track(Option<String>),
}

fn quest_id_strategy() -> impl Strategy<Value = String> {
    (0u8..6).prop_map(|n| format!("q{}", n))
}

fn step_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("not_started".to_string()),
        Just("started".to_string()),
        Just("exploration".to_string()),
        Just("research".to_string()),
        Just("completed".to_string()),
        "[a-z]{1,6}",
    ]
}

fn batch_update_strategy() -> impl Strategy<Value = BatchUpdate> {
    prop_oneof![
        (quest_id_strategy(), step_strategy()).prop_map(|(id, step)| BatchUpdate::step(id, step)),
        (quest_id_strategy(), 0u64..10_000).prop_map(|(id, at)| BatchUpdate::completion(id, at)),
    ]
}

fn snapshot_strategy() -> impl Strategy<Value = QuestSnapshot> {
    prop_oneof![
        (quest_id_strategy(), step_strategy()).prop_map(|(id, step)| QuestSnapshot::new(id, step)),
        (quest_id_strategy(), step_strategy(), 0u64..10_000)
            .prop_map(|(id, step, at)| QuestSnapshot::completed(id, step, at)),
    ]
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (quest_id_strategy(), step_strategy()).prop_map(|(id, step)| Action::Start(id, step)),
        (quest_id_strategy(), step_strategy()).prop_map(|(id, step)| Action::Advance(id, step)),
        quest_id_strategy().prop_map(Action::Complete),
        prop::collection::vec(batch_update_strategy(), 0..6).prop_map(Action::Batch),
        prop::collection::vec(snapshot_strategy(), 0..6).prop_map(Action::Hydrate),
        prop::option::of(quest_id_strategy()).prop_map(Action::Track),
    ]
}

fn event_strategy() -> impl Strategy<Value = QuestEvent> {
    let timestamp = prop::option::of(0u64..5_000);
    prop_oneof![
        (quest_id_strategy(), step_strategy(), timestamp.clone()).prop_map(|(id, step, ts)| {
            let event = QuestEvent::started(id, step);
            match ts {
                Some(ts) => event.with_timestamp(ts),
                None => event,
            }
        }),
        (quest_id_strategy(), step_strategy(), step_strategy(), timestamp.clone()).prop_map(
            |(id, from, to, ts)| {
                let event = QuestEvent::advanced(id, from, to);
                match ts {
                    Some(ts) => event.with_timestamp(ts),
                    None => event,
                }
            }
        ),
        (quest_id_strategy(), step_strategy(), timestamp).prop_map(|(id, step, ts)| {
            let event = QuestEvent::completed(id, step);
            match ts {
                Some(ts) => event.with_timestamp(ts),
                None => event,
            }
        }),
    ]
}

fn fresh_ledger() -> QuestLedger {
    QuestLedger::with_parts(Rc::new(MemoryKv::new()), Rc::new(ManualClock::new(1_000)), 1000)
}

fn run(ledger: &QuestLedger, action: &Action) {
    let store = ledger.store();
    match action {
        Action::Start(id, step) => {
            store.start_quest(id, step);
        }
        Action::Advance(id, step) => {
            store.advance_quest(id, step);
        }
        Action::Complete(id) => {
            store.complete_quest(id);
        }
        Action::Batch(updates) => {
            store.apply_batch(updates);
        }
        Action::Hydrate(snapshots) => {
            store.hydrate(snapshots);
        }
        Action::Track(id) => store.set_tracked_quest(id.as_deref()),
    }
}

proptest! {
    /// Property: no quest is ever both active and completed
    #[test]
    fn prop_active_and_completed_are_disjoint(
        actions in prop::collection::vec(action_strategy(), 0..40)
    ) {
        let ledger = fresh_ledger();
        for action in &actions {
            run(&ledger, action);
            let state = ledger.store().state();
            prop_assert!(state.overlapping_ids().is_empty(), "overlap after {:?}", action);

            let mut completed = state.completed_quests.clone();
            completed.sort();
            completed.dedup();
            prop_assert_eq!(completed.len(), state.completed_quests.len());
        }
    }

    /// Property: a repeated advance publishes exactly once
    #[test]
    fn prop_duplicate_advance_publishes_once(
        id in quest_id_strategy(),
        start in step_strategy(),
        next in step_strategy()
    ) {
        prop_assume!(start != next);
        let ledger = fresh_ledger();
        ledger.store().start_quest(&id, &start);
        let before = ledger.bus().events_published();

        ledger.store().advance_quest(&id, &next);
        ledger.store().advance_quest(&id, &next);
        prop_assert_eq!(ledger.bus().events_published(), before + 1);
    }

    /// Property: re-applying a batch against its own result is a no-op
    #[test]
    fn prop_apply_batch_is_idempotent(
        setup in prop::collection::vec(action_strategy(), 0..10),
        batch in prop::collection::vec(batch_update_strategy(), 0..8)
    ) {
        let ledger = fresh_ledger();
        for action in &setup {
            run(&ledger, action);
        }

        ledger.store().apply_batch(&batch);
        let once = ledger.store().state();
        let logged = ledger.log().len();

        let events = ledger.store().apply_batch(&batch);
        prop_assert!(events.is_empty());
        prop_assert_eq!(ledger.store().state(), once);
        prop_assert_eq!(ledger.log().len(), logged);
    }

    /// Property: projection is a pure function of its input
    #[test]
    fn prop_projection_is_deterministic(
        events in prop::collection::vec(event_strategy(), 0..30)
    ) {
        let first = serde_json::to_vec(&project_quest_state(&events)).unwrap();
        let second = serde_json::to_vec(&project_quest_state(&events.clone())).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: identical untimed events resolve to the same start time
    #[test]
    fn prop_resolve_started_at_is_deterministic(event in event_strategy()) {
        let mut event = event;
        event.timestamp = None;
        let copy = event.clone();
        prop_assert_eq!(resolve_started_at(&event), resolve_started_at(&copy));
    }

    /// Property: the log never exceeds its capacity
    #[test]
    fn prop_log_is_capped(
        capacity in 1usize..20,
        appends in 0usize..60
    ) {
        let ledger = QuestLedger::with_parts(
            Rc::new(MemoryKv::new()),
            Rc::new(ManualClock::new(0)),
            capacity,
        );
        for i in 0..appends {
            ledger.store().start_quest(&format!("q{}", i), "started");
            prop_assert!(ledger.log().len() <= capacity);
        }
        prop_assert_eq!(ledger.log().len(), appends.min(capacity));
    }

    /// Property: hydrate's snapshot walk and the projection of the
    /// hydrated log agree, including lists that repeat an id
    #[test]
    fn prop_hydrate_agrees_with_projection(
        snapshots in prop::collection::vec(snapshot_strategy(), 0..12)
    ) {
        let report = check_hydrate_agreement(&snapshots);
        prop_assert!(report.is_consistent(), "{:?}", report.drift);

        let ledger = fresh_ledger();
        ledger.store().hydrate(&snapshots);
        let report = ledger.check_consistency();
        prop_assert!(report.is_consistent(), "{:?}", report.drift);
    }

    /// Property: tracking is empty or points at an active quest unless
    /// set by hand
    #[test]
    fn prop_tracking_points_at_active_quest(
        actions in prop::collection::vec(action_strategy(), 0..40)
    ) {
        let ledger = fresh_ledger();
        for action in actions.iter().filter(|a| !matches!(a, Action::Track(_))) {
            run(&ledger, action);
            let state = ledger.store().state();
            if let Some(tracked) = &state.tracked_quest_id {
                prop_assert!(state.is_active(tracked), "tracked {} inactive after {:?}", tracked, action);
            }
        }
    }
}
