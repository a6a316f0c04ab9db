//! End-to-end session flows against the simulated ledger

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use treasure_tiles::{
    FailureReason, GameConfig, GameError, LedgerServices, OutcomeEvent, OutcomeEventSource, RevealState,
    SelectionState, SessionController, SessionNonce, SimulatedLedger, StatusUpdate, TileOutcome, TxStatus,
};

fn setup(config: GameConfig) -> (SessionController, Arc<SimulatedLedger>) {
    let ledger = Arc::new(SimulatedLedger::new(config.simulation.clone()));
    let controller = SessionController::new(config, LedgerServices::from_client(ledger.clone()));
    (controller, ledger)
}

async fn select(controller: &SessionController, tiles: &[usize]) {
    for &index in tiles {
        controller.toggle_selection(index).await.unwrap();
    }
}

/// Statuses published for `nonce` until it turned terminal
async fn collect_statuses(rx: &mut broadcast::Receiver<StatusUpdate>, nonce: SessionNonce) -> Vec<TxStatus> {
    let mut seen = Vec::new();
    loop {
        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("session did not settle")
            .expect("status channel closed");
        if update.nonce != nonce {
            continue;
        }
        let terminal = update.status.is_terminal();
        seen.push(update.status);
        if terminal {
            return seen;
        }
    }
}

#[tokio::test]
async fn test_round_reveals_selected_tiles() {
    let (controller, ledger) = setup(GameConfig::testing());
    ledger
        .script_outcome(vec![TileOutcome::Gem, TileOutcome::Mine, TileOutcome::Gem])
        .await;
    let mut rx = controller.subscribe();

    select(&controller, &[9, 2, 7]).await;
    let nonce = controller.start_session(0.01).await.unwrap();

    assert_eq!(
        collect_statuses(&mut rx, nonce).await,
        vec![
            TxStatus::Built,
            TxStatus::Submitted,
            TxStatus::Pending,
            TxStatus::Confirmed,
            TxStatus::AwaitingOutcome,
            TxStatus::Finalized,
        ]
    );

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.grid.cell(2).unwrap().reveal, RevealState::Gem);
    assert_eq!(snapshot.grid.cell(7).unwrap().reveal, RevealState::Mine);
    assert_eq!(snapshot.grid.cell(9).unwrap().reveal, RevealState::Gem);
    assert_eq!(snapshot.grid.count(RevealState::Hidden), 22);

    let session = snapshot.session.unwrap();
    assert_eq!(session.selection, vec![2, 7, 9]);
    assert_eq!(session.wager_wei, "10000000000000000");
    assert!(session.block_number.is_some());

    let request = ledger.submitted(&session.tx_hash.unwrap()).unwrap();
    assert_eq!(request.nonce, nonce);
    assert_eq!(request.selected_count, 3);
    assert_eq!(request.wager_wei, 10_000_000_000_000_000);
    assert_eq!(request.value_wei, request.wager_wei);
    assert_eq!(request.contract, controller.config().contract.address);

    let metrics = controller.metrics();
    assert_eq!(metrics.sessions_finalized, 1);
    assert_eq!(metrics.gems_revealed, 2);
    assert_eq!(metrics.mines_revealed, 1);
}

#[tokio::test]
async fn test_rejected_submission_allows_retry() {
    let (controller, ledger) = setup(GameConfig::testing());
    ledger.reject_submissions("user declined").await;
    let mut rx = controller.subscribe();

    select(&controller, &[0, 1]).await;
    let first = controller.start_session(0.01).await.unwrap();

    assert_eq!(
        collect_statuses(&mut rx, first).await,
        vec![
            TxStatus::Built,
            TxStatus::Submitted,
            TxStatus::Failed(FailureReason::SubmissionRejected("user declined".to_string())),
        ]
    );

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.grid.count(RevealState::Hidden), 25);
    assert!(!snapshot.grid.frozen);
    assert_eq!(ledger.submission_count(), 0);

    // Same selection, new nonce
    ledger.clear_faults().await;
    let second = controller.start_session(0.01).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(controller.wait_until_settled(second).await, Some(TxStatus::Finalized));
    assert_eq!(controller.metrics().sessions_failed, 1);
}

#[tokio::test]
async fn test_reverted_confirmation_fails_session() {
    let (controller, ledger) = setup(GameConfig::testing());
    ledger.revert_confirmations("execution reverted").await;

    select(&controller, &[12]).await;
    let nonce = controller.start_session(0.01).await.unwrap();

    assert_eq!(
        controller.wait_until_settled(nonce).await,
        Some(TxStatus::Failed(FailureReason::ConfirmationFailed(
            "execution reverted".to_string()
        )))
    );
    assert_eq!(controller.snapshot().await.grid.count(RevealState::Hidden), 25);
    assert!(!controller.correlator().is_listening(&nonce));
}

#[tokio::test]
async fn test_foreign_outcome_is_ignored() {
    let (controller, ledger) = setup(GameConfig::testing());
    ledger.withhold_outcomes(true).await;
    let mut rx = controller.subscribe();

    select(&controller, &[3, 4]).await;
    let nonce = controller.start_session(0.01).await.unwrap();

    // Wait until the session listens for its outcome
    loop {
        let update = rx.recv().await.unwrap();
        if update.status == TxStatus::AwaitingOutcome {
            break;
        }
    }

    ledger.emit(OutcomeEvent::new(
        SessionNonce::generate(),
        vec![TileOutcome::Mine, TileOutcome::Mine],
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(controller.status().await, TxStatus::AwaitingOutcome);
    assert_eq!(controller.snapshot().await.grid.count(RevealState::Hidden), 25);
    assert_eq!(controller.metrics().discarded_events, 1);

    ledger.emit(OutcomeEvent::new(nonce, vec![TileOutcome::Gem, TileOutcome::Mine]));
    assert_eq!(controller.wait_until_settled(nonce).await, Some(TxStatus::Finalized));

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.grid.cell(3).unwrap().reveal, RevealState::Gem);
    assert_eq!(snapshot.grid.cell(4).unwrap().reveal, RevealState::Mine);
}

#[tokio::test]
async fn test_second_start_leaves_first_session_alone() {
    let (controller, ledger) = setup(GameConfig::testing());
    ledger.withhold_outcomes(true).await;

    select(&controller, &[5]).await;
    let nonce = controller.start_session(0.01).await.unwrap();

    assert_eq!(controller.start_session(0.02).await, Err(GameError::SessionActive(nonce)));

    let session = controller.snapshot().await.session.unwrap();
    assert_eq!(session.nonce, nonce);
    assert_eq!(session.wager, 0.01);
    assert_eq!(controller.metrics().sessions_started, 1);
}

#[tokio::test]
async fn test_preconditions_publish_nothing() {
    let (controller, _ledger) = setup(GameConfig::testing());
    let mut rx = controller.subscribe();

    assert_eq!(controller.start_session(0.01).await, Err(GameError::NoSelection));

    select(&controller, &[1]).await;
    assert_eq!(controller.start_session(0.0).await, Err(GameError::InvalidWager(0.0)));
    assert_eq!(controller.start_session(-1.0).await, Err(GameError::InvalidWager(-1.0)));
    assert_eq!(
        controller.toggle_selection(25).await,
        Err(GameError::InvalidIndex { index: 25, size: 25 })
    );

    assert!(rx.try_recv().is_err());
    assert_eq!(controller.status().await, TxStatus::Idle);
    assert_eq!(controller.selected_indices().await, vec![1]);
}

#[tokio::test]
async fn test_outcome_length_mismatch_fails_session() {
    let (controller, ledger) = setup(GameConfig::testing());
    ledger
        .script_outcome(vec![TileOutcome::Gem, TileOutcome::Gem])
        .await;

    select(&controller, &[2, 7, 9]).await;
    let nonce = controller.start_session(0.01).await.unwrap();

    assert_eq!(
        controller.wait_until_settled(nonce).await,
        Some(TxStatus::Failed(FailureReason::OutcomeMismatch { expected: 3, actual: 2 }))
    );
    assert_eq!(controller.snapshot().await.grid.count(RevealState::Hidden), 25);
}

#[tokio::test]
async fn test_outcome_timeout_stops_listening() {
    let mut config = GameConfig::testing();
    config.session.outcome_timeout_ms = Some(50);
    let (controller, ledger) = setup(config);
    ledger.withhold_outcomes(true).await;

    select(&controller, &[0]).await;
    let nonce = controller.start_session(0.01).await.unwrap();

    assert_eq!(
        controller.wait_until_settled(nonce).await,
        Some(TxStatus::Failed(FailureReason::OutcomeTimeout { timeout_ms: 50 }))
    );
    assert!(!controller.correlator().is_listening(&nonce));
    assert_eq!(controller.correlator().pending_count(), 0);

    // A late event for the timed-out session changes nothing
    ledger.emit(OutcomeEvent::new(nonce, vec![TileOutcome::Gem]));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(matches!(controller.status().await, TxStatus::Failed(_)));
    assert_eq!(controller.snapshot().await.grid.count(RevealState::Hidden), 25);
}

#[tokio::test]
async fn test_reset_clears_finished_board() {
    let (controller, _ledger) = setup(GameConfig::testing());

    select(&controller, &[10, 11]).await;
    let nonce = controller.start_session(0.01).await.unwrap();
    assert_eq!(controller.wait_until_settled(nonce).await, Some(TxStatus::Finalized));
    assert_eq!(controller.snapshot().await.grid.count(RevealState::Hidden), 23);

    controller.reset().await.unwrap();
    let snapshot = controller.snapshot().await;
    assert!(snapshot.session.is_none());
    assert!(!snapshot.grid.frozen);
    assert_eq!(snapshot.grid.count(RevealState::Hidden), 25);
    assert!(controller.selected_indices().await.is_empty());
}

#[tokio::test]
async fn test_reset_after_rejected_submission() {
    let (controller, ledger) = setup(GameConfig::testing());
    ledger.reject_submissions("insufficient funds").await;

    select(&controller, &[0, 1]).await;
    let nonce = controller.start_session(0.01).await.unwrap();
    assert_eq!(
        controller.wait_until_settled(nonce).await,
        Some(TxStatus::Failed(FailureReason::SubmissionRejected(
            "insufficient funds".to_string()
        )))
    );

    assert_eq!(controller.reset().await, Ok(()));

    let snapshot = controller.snapshot().await;
    assert!(snapshot.session.is_none());
    assert!(!snapshot.grid.frozen);
    assert!(snapshot
        .grid
        .cells
        .iter()
        .all(|c| c.selection == SelectionState::Unselected && c.reveal == RevealState::Hidden));
    assert!(!snapshot.grid.cell(0).unwrap().is_selected());
    assert!(!snapshot.grid.cell(1).unwrap().is_selected());
    assert_eq!(controller.status().await, TxStatus::Idle);
}

/// Event feed that has already ended
struct EndedFeed;

impl OutcomeEventSource for EndedFeed {
    fn subscribe(&self) -> broadcast::Receiver<OutcomeEvent> {
        let (_tx, rx) = broadcast::channel(1);
        rx
    }
}

#[tokio::test]
async fn test_session_after_stream_end_fails_and_resets() {
    let config = GameConfig::testing();
    let ledger = Arc::new(SimulatedLedger::new(config.simulation.clone()));
    let services = LedgerServices::new(ledger.clone(), ledger, Arc::new(EndedFeed));
    let controller = SessionController::new(config, services);

    // Let the correlator observe the end of the stream
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(controller.correlator().is_closed());

    select(&controller, &[1]).await;
    let nonce = controller.start_session(0.01).await.unwrap();

    let settled = tokio::time::timeout(Duration::from_secs(1), controller.wait_until_settled(nonce))
        .await
        .expect("session did not settle");
    assert_eq!(settled, Some(TxStatus::Failed(FailureReason::OutcomeStreamClosed)));
    assert_eq!(controller.correlator().pending_count(), 0);

    assert_eq!(controller.reset().await, Ok(()));
    assert_eq!(controller.snapshot().await.grid.count(RevealState::Hidden), 25);
}
