//! Backend replacement while frames keep arriving

mod mocks;

use mocks::{init_tracing, test_frame, MockCamera, MockLoader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use visionbridge_core::{ModelDescriptor, ModelTask};
use visionbridge_dispatch::{
    BackendSlot, DispatchConfig, DispatchOutcome, EventStreams, FrameDispatcher, ModelLifecycleManager,
    VisionBridge,
};

fn manager(loader: MockLoader) -> (Arc<BackendSlot>, Arc<MockLoader>, Arc<ModelLifecycleManager>) {
    init_tracing();
    let slot = Arc::new(BackendSlot::new());
    let loader = Arc::new(loader);
    let manager = Arc::new(ModelLifecycleManager::new(
        Arc::clone(&slot),
        Arc::clone(&loader) as _,
        Arc::new(DispatchConfig::default()),
    ));
    (slot, loader, manager)
}

#[tokio::test]
async fn test_overlapping_loads_install_in_issue_order() {
    let loader = MockLoader::new().with_delay("/slow.model", Duration::from_millis(50));
    let (slot, _loader, manager) = manager(loader);

    let (slow, fast) = tokio::join!(
        manager.load_model(ModelDescriptor::local("/slow.model", ModelTask::Detect)),
        manager.load_model(ModelDescriptor::local("/fast.model", ModelTask::Classify)),
    );

    assert!(slow.is_ok());
    assert!(fast.is_ok());
    let active = slot.load().unwrap();
    assert_eq!(active.name(), "fast");
    assert_eq!(active.task(), ModelTask::Classify);
}

#[tokio::test]
async fn test_spawned_load_resolves_after_install() {
    let loader = MockLoader::new().with_delay("/big.model", Duration::from_millis(20));
    let (slot, _loader, manager) = manager(loader);

    let handle = manager.spawn_load(ModelDescriptor::local("/big.model", ModelTask::Detect));
    handle.await.unwrap().unwrap();

    assert_eq!(slot.load().unwrap().name(), "big");
}

#[tokio::test]
async fn test_replaced_backend_sees_no_more_frames() {
    let (slot, loader, manager) = manager(MockLoader::new());
    let streams = Arc::new(EventStreams::new(8));
    let dispatcher = FrameDispatcher::new(Arc::clone(&slot), streams, &DispatchConfig::default());

    manager
        .load_model(ModelDescriptor::local("/a.model", ModelTask::Detect))
        .await
        .unwrap();
    for i in 0..2 {
        dispatcher.dispatch(&test_frame(i));
    }

    manager
        .load_model(ModelDescriptor::local("/b.model", ModelTask::Detect))
        .await
        .unwrap();
    for i in 2..5 {
        dispatcher.dispatch(&test_frame(i));
    }

    assert_eq!(loader.infer_calls("a"), 2);
    assert_eq!(loader.infer_calls("b"), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_swaps_during_capture_never_tear() {
    let (bridge_loader, camera) = (Arc::new(MockLoader::new()), Arc::new(MockCamera::new()));
    let bridge = VisionBridge::new(
        DispatchConfig::default(),
        Arc::clone(&bridge_loader) as _,
        Arc::clone(&camera) as _,
    )
    .unwrap();
    let mut predictions = bridge.streams().predictions.attach();

    let running = Arc::new(AtomicBool::new(true));
    let capture = {
        let dispatcher = Arc::clone(bridge.dispatcher());
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            let mut outcomes = Vec::new();
            let mut seq = 0;
            while running.load(Ordering::SeqCst) {
                outcomes.push(dispatcher.dispatch(&test_frame(seq)));
                seq += 1;
                std::thread::sleep(Duration::from_micros(200));
            }
            outcomes
        })
    };

    for i in 0..20 {
        let path = if i % 2 == 0 { "/alpha.model" } else { "/beta.model" };
        let args = serde_json::json!({"model": {"type": "local", "task": "detect", "modelPath": path}});
        let response = bridge.router().handle("loadModel", &args).await.unwrap();
        assert!(response.is_ok());
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    running.store(false, Ordering::SeqCst);
    let outcomes = capture.join().unwrap();

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, DispatchOutcome::Dispatched | DispatchOutcome::NoBackend)));
    while let Some(detections) = predictions.try_recv() {
        assert_eq!(detections.len(), 3);
        let label = detections[0].label.as_str();
        assert!(label == "alpha" || label == "beta");
        assert!(detections.iter().all(|d| d.label == label));
    }
}

#[test]
fn test_slow_inference_drops_overlapping_frames() {
    init_tracing();
    let slot = Arc::new(BackendSlot::new());
    let streams = Arc::new(EventStreams::new(8));
    let dispatcher = Arc::new(FrameDispatcher::new(
        Arc::clone(&slot),
        streams,
        &DispatchConfig::default(),
    ));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let loader = MockLoader::new().with_model_latency(Duration::from_millis(100));
    let manager = ModelLifecycleManager::new(
        Arc::clone(&slot),
        Arc::new(loader),
        Arc::new(DispatchConfig::default()),
    );
    runtime
        .block_on(manager.load_model(ModelDescriptor::local("/slow.model", ModelTask::Detect)))
        .unwrap();

    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        std::thread::spawn(move || dispatcher.dispatch(&test_frame(0)))
    };
    std::thread::sleep(Duration::from_millis(30));
    let second = dispatcher.dispatch(&test_frame(1));

    assert_eq!(second, DispatchOutcome::Busy);
    assert_eq!(first.join().unwrap(), DispatchOutcome::Dispatched);
}
