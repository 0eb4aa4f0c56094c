//! Property-based tests for PendingQueue using proptest-state-machine
//!
//! Random sequences of append / remove / remove_synced / clear / corrupt are
//! applied both to a `PendingQueue` over `MemoryKeyValueStore` and to a plain
//! `Vec` reference model. After every step the queue's listing must equal the
//! model.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest};

use super::pending_queue::PendingQueue;
use crate::storage::{KeyValueStore, MemoryKeyValueStore};
use offsync_api::{PendingRecord, RecordPayload};

const QUEUE_KEY: &str = "pbt_queue";

#[derive(Debug, Clone)]
pub enum QueueTransition {
    Append { client_id: String, weeks: u32 },
    Remove { client_id: String },
    RemoveSynced { client_ids: Vec<String> },
    Clear,
    /// Overwrite the persisted value with garbage; the queue must read as empty.
    Corrupt,
}

/// Reference model: client ids newest first, plus the weeks field so payloads
/// are compared too.
#[derive(Debug, Clone, Default)]
pub struct QueueModel {
    pub items: Vec<(String, u32)>,
}

fn payload(weeks: u32) -> RecordPayload {
    RecordPayload {
        lmp_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        cycle_length: 28,
        gest_age_days: weeks * 7,
        weeks,
        days: 0,
        trimester: 1,
        edd_date: NaiveDate::from_ymd_opt(2024, 10, 7).unwrap(),
        recommendation_text: None,
    }
}

fn client_id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]).prop_map(String::from)
}

impl ReferenceStateMachine for QueueModel {
    type State = Self;
    type Transition = QueueTransition;

    fn init_state() -> BoxedStrategy<Self::State> {
        Just(QueueModel::default()).boxed()
    }

    fn transitions(_state: &Self::State) -> BoxedStrategy<Self::Transition> {
        prop_oneof![
            4 => (client_id_strategy(), 0u32..42)
                .prop_map(|(client_id, weeks)| QueueTransition::Append { client_id, weeks }),
            2 => client_id_strategy().prop_map(|client_id| QueueTransition::Remove { client_id }),
            2 => prop::collection::vec(client_id_strategy(), 0..4)
                .prop_map(|client_ids| QueueTransition::RemoveSynced { client_ids }),
            1 => Just(QueueTransition::Clear),
            1 => Just(QueueTransition::Corrupt),
        ]
        .boxed()
    }

    fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
        match transition {
            QueueTransition::Append { client_id, weeks } => {
                state.items.insert(0, (client_id.clone(), *weeks));
            }
            QueueTransition::Remove { client_id } => {
                if let Some(pos) = state.items.iter().position(|(id, _)| id == client_id) {
                    state.items.remove(pos);
                }
            }
            QueueTransition::RemoveSynced { client_ids } => {
                for client_id in client_ids {
                    if let Some(pos) = state.items.iter().rposition(|(id, _)| id == client_id) {
                        state.items.remove(pos);
                    }
                }
            }
            QueueTransition::Clear | QueueTransition::Corrupt => state.items.clear(),
        }
        state
    }
}

pub struct QueueTest {
    runtime: tokio::runtime::Runtime,
    store: Arc<MemoryKeyValueStore>,
    queue: PendingQueue,
}

impl StateMachineTest for QueueTest {
    type SystemUnderTest = Self;
    type Reference = QueueModel;

    fn init_test(
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build test runtime");
        let store = Arc::new(MemoryKeyValueStore::new());
        let queue = PendingQueue::new(store.clone(), QUEUE_KEY);
        QueueTest {
            runtime,
            store,
            queue,
        }
    }

    fn apply(
        state: Self::SystemUnderTest,
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        state.runtime.block_on(async {
            match &transition {
                QueueTransition::Append { client_id, weeks } => state
                    .queue
                    .append(PendingRecord::with_client_id(client_id.clone(), payload(*weeks)))
                    .await
                    .expect("append should succeed"),
                QueueTransition::Remove { client_id } => state
                    .queue
                    .remove_by_client_id(client_id)
                    .await
                    .expect("remove should succeed"),
                QueueTransition::RemoveSynced { client_ids } => {
                    state
                        .queue
                        .remove_synced(client_ids)
                        .await
                        .expect("remove_synced should succeed");
                }
                QueueTransition::Clear => state.queue.clear().await.expect("clear should succeed"),
                QueueTransition::Corrupt => state
                    .store
                    .set(QUEUE_KEY, "[{\"client_id\":".to_string())
                    .await
                    .expect("raw write should succeed"),
            }
        });
        state
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        let listed = state
            .runtime
            .block_on(state.queue.list())
            .expect("list should succeed");
        let actual: Vec<(String, u32)> = listed
            .into_iter()
            .map(|r| (r.client_id, r.payload.weeks))
            .collect();
        assert_eq!(actual, ref_state.items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest_state_machine::prop_state_machine! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            failure_persistence: None,
            verbose: 0,
            .. ProptestConfig::default()
        })]

        #[test]
        fn test_pending_queue_state_machine(sequential 1..40 => QueueTest);
    }
}
