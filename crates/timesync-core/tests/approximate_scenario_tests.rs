mod common;

use common::*;
use timesync_core::{Config, SyncError};

#[test]
fn test_equal_frequency_sync() {
    // Channels /a, /b, /c deliver one message per round, 10us apart.
    // Round i: a = i*1000, b = i*1000+10, c = i*1000+20
    // The bundle of round i is complete once a message of round i+1
    // shows up, so 5 rounds yield 4 bundles.
    let channels = ["/a", "/b", "/c"];
    let (strategy, collector) = create_strategy(&Config::approximate(2), &channels);

    let mut scenario = ScenarioBuilder::new();
    for round in 0..5 {
        for (offset, name) in channels.iter().enumerate() {
            scenario = scenario.add_message(name, round * 1000 + offset as u64 * 10);
        }
    }
    scenario.replay(strategy.as_ref());

    let events = collector.events();
    assert_eq!(events.len(), 4);
    assert_bundles_valid(&events, &channels);
    assert_contiguous(&events);

    for (round, event) in events.iter().enumerate() {
        let timestamps = bundle_timestamps(event);
        let base = round as u64 * 1000;
        assert_eq!(timestamps["/a/"], base);
        assert_eq!(timestamps["/b/"], base + 10);
        assert_eq!(timestamps["/c/"], base + 20);
    }

    let stats = strategy.stats();
    assert_eq!(stats.published, 4);
    assert_eq!(stats.dropped, 0);
}

#[test]
fn test_double_frequency_sync() {
    // /fast delivers every iteration, /slow1 and /slow2 only on odd
    // iterations. Bundles follow the slow channels.
    let channels = ["/fast", "/slow1", "/slow2"];
    let (strategy, collector) = create_strategy(&Config::approximate(3), &channels);

    let iterations = 10u64;
    let mut scenario = ScenarioBuilder::new();
    for i in 0..iterations {
        scenario = scenario.add_message("/fast", i * 100);
        if i % 2 == 1 {
            scenario = scenario
                .add_message("/slow1", i * 100 + 1)
                .add_message("/slow2", i * 100 + 2);
        }
    }
    scenario.replay(strategy.as_ref());

    let events = collector.events();
    assert_eq!(events.len() as u64, iterations / 2 - 1);
    assert_bundles_valid(&events, &channels);
    assert_contiguous(&events);

    for (index, event) in events.iter().enumerate() {
        let i = 2 * index as u64 + 1;
        let timestamps = bundle_timestamps(event);
        assert_eq!(timestamps["/fast/"], i * 100);
        assert_eq!(timestamps["/slow1/"], i * 100 + 1);
        assert_eq!(timestamps["/slow2/"], i * 100 + 2);
    }
}

#[test]
fn test_drop_then_recover() {
    // /a and /b overflow with messages nobody wants before /c delivers
    // anything. The wanted messages must still be bundled together once
    // the search can prove the bundle optimal.
    let channels = ["/a", "/b", "/c"];
    let (strategy, collector) = create_strategy(&Config::approximate(2), &channels);

    let ignored = ScenarioBuilder::new()
        .add_message("/a", 100)
        .add_message("/b", 110)
        .add_message("/a", 200)
        .add_message("/b", 210)
        .add_message("/a", 300)
        .add_message("/b", 310);
    let ignored_count = ignored.len() as u64;
    ignored.replay(strategy.as_ref());

    let stats = strategy.stats();
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.drop_flagged, vec![channel("/a"), channel("/b")]);

    let wanted = [
        create_message("/a", ignored_count, 1000),
        create_message("/b", ignored_count + 1, 1001),
        create_message("/c", ignored_count + 2, 1002),
    ];
    for message in wanted.iter().cloned() {
        strategy.handle(message).unwrap();
    }
    assert!(collector.is_empty());

    strategy
        .handle(create_message("/a", ignored_count + 3, 2000))
        .unwrap();
    strategy
        .handle(create_message("/b", ignored_count + 4, 2001))
        .unwrap();

    let events = collector.events();
    assert_eq!(events.len(), 1);
    assert_bundles_valid(&events, &channels);

    let mut members: Vec<_> = events[0].messages().map(|msg| msg.id()).collect();
    let mut expected: Vec<_> = wanted.iter().map(|msg| msg.id()).collect();
    members.sort();
    expected.sort();
    assert_eq!(members, expected);
    assert!(
        events[0]
            .messages()
            .all(|msg| msg.id().sequence >= ignored_count)
    );
}

#[test]
fn test_recover_after_early_drop() {
    // /a overflows once before /b starts. Afterwards both channels
    // deliver in lockstep and nothing may be discarded.
    let (strategy, collector) = create_strategy(&Config::approximate(2), &["/a", "/b"]);

    let mut scenario = ScenarioBuilder::new()
        .add_messages("/a", &[100, 200, 300])
        .add_message("/b", 210);
    for round in 3..23u64 {
        scenario = scenario
            .add_message("/b", round * 100 + 90)
            .add_message("/a", round * 100 + 100);
    }
    scenario.replay(strategy.as_ref());

    let stats = strategy.stats();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.discarded, 0);
    assert!(stats.drop_flagged.is_empty());
    assert_eq!(stats.published, 20);

    let events = collector.events();
    assert_eq!(events.len(), 20);
    assert_bundles_valid(&events, &["/a", "/b"]);
    assert_contiguous(&events);

    let first = bundle_timestamps(&events[0]);
    assert_eq!((first["/a/"], first["/b/"]), (200, 210));
    for event in &events[1..] {
        let timestamps = bundle_timestamps(event);
        assert_eq!(timestamps["/a/"], timestamps["/b/"] + 10);
    }
}

#[test]
fn test_queue_bound_holds_for_silent_channel() {
    // /b never delivers, so /a keeps only the newest messages.
    let (strategy, collector) = create_strategy(&Config::approximate(3), &["/a", "/b"]);
    ScenarioBuilder::new()
        .add_messages("/a", &[100, 200, 300, 400, 500, 600])
        .replay(strategy.as_ref());

    let stats = strategy.stats();
    assert_eq!(stats.depths[&channel("/a")], 3);
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.drop_flagged, vec![channel("/a")]);
    assert!(collector.is_empty());

    // /a lost messages, so it cannot provide the pivot and the older /b
    // message is discarded instead.
    strategy.handle(create_message("/b", 100, 390)).unwrap();
    let stats = strategy.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.depths[&channel("/b")], 0);

    // A younger /b message seeds the search, which only completes once
    // /a catches up with it.
    strategy.handle(create_message("/b", 101, 1000)).unwrap();
    assert!(collector.is_empty());
    strategy.handle(create_message("/a", 102, 1100)).unwrap();

    let events = collector.events();
    assert_eq!(events.len(), 1);
    let timestamps = bundle_timestamps(&events[0]);
    assert_eq!(timestamps["/a/"], 1100);
    assert_eq!(timestamps["/b/"], 1000);
}

#[test]
fn test_tie_does_not_replace_candidate() {
    // {a100, b150} and {a200, b150} have the same spread, the first one
    // stays active and is published.
    let (strategy, collector) = create_strategy(&Config::approximate(4), &["/a", "/b"]);
    ScenarioBuilder::new()
        .add_messages("/a", &[100, 200])
        .add_message("/b", 150)
        .add_message("/b", 1000)
        .replay(strategy.as_ref());

    let events = collector.events();
    assert_eq!(events.len(), 1);
    assert_eq!(bundle_timestamps(&events[0])["/a/"], 100);
}

#[test]
fn test_unknown_channel_is_not_fatal() {
    let (strategy, collector) = create_strategy(&Config::approximate(2), &["/a", "/b"]);

    let result = strategy.handle(create_message("/z", 0, 100));
    assert_eq!(
        result,
        Err(SyncError::UnknownChannel {
            channel: channel("/z")
        })
    );

    ScenarioBuilder::new()
        .add_messages("/a", &[100, 200])
        .add_message("/b", 105)
        .replay(strategy.as_ref());
    assert_eq!(collector.len(), 1);
}
