//! Relay driving a real session controller on a restricted platform.

use std::sync::Arc;
use std::time::Duration;

use voxdrop_core::config::RelayConfig;
use voxdrop_queue::PendingQueue;
use voxdrop_relay::{
    ExecutionContext, PermissivePolicy, RelayError, RelayOutcome, SimulatedPolicy, TriggerRelay,
    TriggerSignal,
};
use voxdrop_session::{
    ControllerSettings, MockRecognizer, NoopHost, RecognizerEvent, SessionController,
    SessionState, StatusPublisher,
};

fn controller(mock: &MockRecognizer, queue: &PendingQueue) -> SessionController {
    SessionController::spawn(
        ControllerSettings::default(),
        Arc::new(mock.clone()),
        queue.clone(),
        Arc::new(StatusPublisher::in_memory()),
        Arc::new(NoopHost),
    )
}

#[tokio::test(start_paused = true)]
async fn test_background_tap_captures_through_intermediary() {
    let queue = PendingQueue::in_memory().unwrap();
    let mock = MockRecognizer::manual();
    let controller = controller(&mock, &queue);
    let policy = Arc::new(SimulatedPolicy::restricted());
    let relay = TriggerRelay::from_config(
        &RelayConfig::default(),
        policy.clone(),
        Arc::new(controller.clone()),
    );

    let handle = match relay
        .relay(TriggerSignal::Start, ExecutionContext::Background)
        .await
        .unwrap()
    {
        RelayOutcome::Deferred(handle) => handle,
        RelayOutcome::Delivered => panic!("Background start must be escalated"),
    };
    let report = handle.wait().await.unwrap();
    assert!(report.visible_for >= Duration::from_millis(1000));
    assert!(!policy.is_visible());

    // The intermediary is gone but the session keeps running.
    assert!(controller.state().is_active());
    assert!(mock.device_in_use());

    mock.emit(RecognizerEvent::Final("water the plants".to_string()))
        .await;
    controller.wait_idle().await.unwrap();

    let pending = queue.read_all().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].text, "water the plants");
}

#[tokio::test]
async fn test_stop_from_background_reaches_controller() {
    let queue = PendingQueue::in_memory().unwrap();
    let mock = MockRecognizer::manual();
    let controller = controller(&mock, &queue);
    let policy = Arc::new(SimulatedPolicy::restricted());
    let relay = TriggerRelay::new(policy.clone(), Arc::new(controller.clone()), Duration::ZERO);

    relay
        .relay(TriggerSignal::Start, ExecutionContext::Foreground)
        .await
        .unwrap();
    mock.emit(RecognizerEvent::Partial("quick thought".to_string()))
        .await;

    let outcome = relay
        .relay_tap(true, ExecutionContext::Background)
        .await
        .unwrap();
    assert!(matches!(outcome, RelayOutcome::Delivered));
    controller.wait_idle().await.unwrap();

    assert_eq!(queue.read_all().unwrap()[0].text, "quick thought");
    assert!(policy.visible_spans().is_empty());
}

#[tokio::test]
async fn test_rejected_escalation_creates_no_record() {
    let queue = PendingQueue::in_memory().unwrap();
    let mock = MockRecognizer::manual();
    let controller = controller(&mock, &queue);
    let relay = TriggerRelay::new(
        Arc::new(SimulatedPolicy::rejecting()),
        Arc::new(controller.clone()),
        Duration::from_millis(1000),
    );

    let RelayOutcome::Deferred(handle) = relay
        .relay(TriggerSignal::Start, ExecutionContext::Background)
        .await
        .unwrap()
    else {
        panic!("Expected Deferred");
    };
    assert!(matches!(
        handle.wait().await,
        Err(RelayError::CaptureRejected(_))
    ));

    assert_eq!(controller.state(), SessionState::Idle);
    assert_eq!(mock.begin_count(), 0);
    assert!(queue.is_empty().unwrap());
}

#[tokio::test]
async fn test_repeated_taps_keep_one_session() {
    let queue = PendingQueue::in_memory().unwrap();
    let mock = MockRecognizer::manual();
    let controller = controller(&mock, &queue);
    let relay = TriggerRelay::new(
        Arc::new(PermissivePolicy),
        Arc::new(controller.clone()),
        Duration::ZERO,
    );

    for _ in 0..3 {
        relay
            .relay(TriggerSignal::Start, ExecutionContext::Background)
            .await
            .unwrap();
    }
    assert_eq!(mock.begin_count(), 1);

    relay
        .relay(TriggerSignal::Stop, ExecutionContext::Background)
        .await
        .unwrap();
    controller.wait_idle().await.unwrap();
    assert!(queue.is_empty().unwrap());
}

#[tokio::test]
async fn test_delivery_to_stopped_controller_fails() {
    let queue = PendingQueue::in_memory().unwrap();
    let mock = MockRecognizer::manual();
    let controller = controller(&mock, &queue);
    controller.shutdown().await.unwrap();

    let relay = TriggerRelay::new(
        Arc::new(PermissivePolicy),
        Arc::new(controller),
        Duration::ZERO,
    );
    let result = relay
        .relay(TriggerSignal::Start, ExecutionContext::Foreground)
        .await;
    assert!(matches!(result, Err(RelayError::Delivery(_))));
}
