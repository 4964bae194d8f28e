use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use attachment_monitor::{
    FetchError, PollCallbacks, PollOptions, PollRegistry, PollState, StatusReport,
};

fn counting_callbacks(updates: &Arc<AtomicUsize>) -> PollCallbacks {
    let updates = Arc::clone(updates);
    PollCallbacks::new().on_update(move |_, _| {
        updates.fetch_add(1, Ordering::SeqCst);
    })
}

async fn always_partial(_id: String) -> Result<StatusReport, FetchError> {
    Ok(StatusReport::new("PARTIAL"))
}

async fn always_finish(_id: String) -> Result<StatusReport, FetchError> {
    Ok(StatusReport::new("FINISH"))
}

#[tokio::test(start_paused = true)]
async fn start_replaces_existing_session_for_same_attachment() {
    let registry = PollRegistry::new();
    let options = PollOptions::from_millis(1_000, 60_000);

    let first_updates = Arc::new(AtomicUsize::new(0));
    let first = registry.start(
        "att-1",
        always_partial,
        options,
        counting_callbacks(&first_updates),
    );
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(first_updates.load(Ordering::SeqCst), 3);

    let second_updates = Arc::new(AtomicUsize::new(0));
    let second = registry.start(
        "att-1",
        always_partial,
        options,
        counting_callbacks(&second_updates),
    );
    assert_ne!(first.session_id, second.session_id);

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(first_updates.load(Ordering::SeqCst), 3);
    assert_eq!(second_updates.load(Ordering::SeqCst), 3);
    assert_eq!(registry.active_ids(), vec!["att-1".to_string()]);
    assert_eq!(
        registry.session("att-1").map(|s| s.session_id),
        Some(second.session_id)
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_and_prune_sessions() {
    let registry = PollRegistry::new();
    let options = PollOptions::from_millis(1_000, 60_000);

    registry.start("b", always_partial, options, PollCallbacks::new());
    registry.start("a", always_partial, options, PollCallbacks::new());
    registry.start("done", always_finish, options, PollCallbacks::new());

    let snapshot = registry.session("a").expect("session for a");
    assert_eq!(snapshot.state, PollState::Polling);

    // Let the finishing session settle so it gets pruned.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(registry.active_ids(), vec!["a".to_string(), "b".to_string()]);

    assert!(registry.cancel("b"));
    assert!(!registry.cancel("b"));
    assert!(!registry.cancel("missing"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(registry.active_ids(), vec!["a".to_string()]);

    assert_eq!(registry.cancel_all(), 1);
    assert!(registry.active_ids().is_empty());
}
