mod common;

use common::*;
use std::{
    thread,
    time::{Duration, Instant},
};
use timesync_core::{Config, StrategyKind, now_micros};

#[test]
fn test_first_match_bundles_latest_messages() {
    let channels = ["/primary", "/left", "/right"];
    let (strategy, collector) = create_strategy(&Config::first_match(), &channels);
    assert_eq!(strategy.key(), "firstmatch");

    ScenarioBuilder::new()
        .add_messages("/left", &[100, 200, 300])
        .add_message("/primary", 50)
        .add_message("/right", 10)
        .add_message("/right", 20)
        .add_message("/primary", 60)
        .add_message("/left", 70)
        .replay(strategy.as_ref());

    let events = collector.events();
    assert_eq!(events.len(), 2);
    assert_bundles_valid(&events, &channels);

    // No timestamp comparison: the latched messages are published as is.
    let first = bundle_timestamps(&events[0]);
    assert_eq!(first["/left/"], 300);
    assert_eq!(first["/primary/"], 50);
    assert_eq!(first["/right/"], 10);

    let stats = strategy.stats();
    assert_eq!(stats.published, 2);
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.depths.values().sum::<usize>(), 0);
}

#[test]
fn test_time_frame_bundles_around_primary() {
    let config = Config::time_frame(Duration::from_millis(5), Duration::from_millis(30))
        .with_sweep_interval(Duration::from_secs(3600));
    let (strategy, collector) = create_strategy(&config, &["/trigger", "/camera", "/lidar"]);
    assert_eq!(strategy.key(), StrategyKind::TimeFrame.key());

    let base = now_micros();
    ScenarioBuilder::new()
        .add_message("/camera", base - 4_000)
        .add_message("/lidar", base + 1_000)
        .add_message("/lidar", base + 9_000)
        .add_message("/trigger", base)
        .add_message("/camera", base + 2_000)
        .replay(strategy.as_ref());

    let start = Instant::now();
    while collector.is_empty() {
        assert!(start.elapsed() < Duration::from_secs(5), "no bundle published");
        thread::sleep(Duration::from_millis(1));
    }

    let events = collector.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.events[&channel("/camera")].len(), 2);
    assert_eq!(event.events[&channel("/lidar")].len(), 1);
    assert_eq!(event.first(&channel("/trigger")).unwrap().timestamps().create, base);
    assert_eq!(event.causes.len(), 4);

    strategy.shutdown();
}

#[test]
fn test_time_frame_primary_without_subsidiaries() {
    let config = Config::time_frame(Duration::from_millis(5), Duration::from_secs(3600))
        .with_sweep_interval(Duration::from_secs(3600));
    let (strategy, collector) = create_strategy(&config, &["/trigger", "/camera"]);

    for i in 0..3 {
        strategy
            .handle(create_message("/trigger", i, now_micros()))
            .unwrap();
    }
    assert!(collector.is_empty());
    assert_eq!(strategy.stats().depths[&channel("/trigger")], 3);

    strategy.shutdown();
    let events = collector.events();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.len() == 1));
}

#[test]
fn test_time_frame_periodic_sweep_evicts_old_messages() {
    let config = Config::time_frame(Duration::from_millis(5), Duration::from_millis(10))
        .with_sweep_interval(Duration::from_millis(5));
    let (strategy, _collector) = create_strategy(&config, &["/trigger", "/camera"]);

    let base = now_micros();
    strategy
        .handle(create_message("/camera", 0, base - 1_000_000))
        .unwrap();

    let start = Instant::now();
    while strategy.stats().dropped == 0 {
        assert!(start.elapsed() < Duration::from_secs(5), "sweep never ran");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(strategy.stats().depths[&channel("/camera")], 0);
}
