use parking_lot::Mutex;
use std::sync::Arc;
use timesync_core::{
    ChannelPath, Config, Message, MessageId, StrategyRegistry, SyncDataHandler, SyncEvent,
};
use uuid::Uuid;

// Print every bundle as soon as it is published
#[derive(Default)]
struct Printer(Mutex<usize>);

impl SyncDataHandler for Printer {
    fn handle(&self, event: SyncEvent) {
        let mut count = self.0.lock();
        *count += 1;
        let members: Vec<String> = event
            .messages()
            .map(|msg| format!("{} @ {}", msg.channel(), msg.timestamps().create))
            .collect();
        println!("bundle {}: {}", *count, members.join(", "));
    }
}

fn main() -> eyre::Result<()> {
    let x_seq = [1_001_000, 1_999_000, 3_000_000, 4_001_000];
    let y_seq = [998_000, 2_003_000, 3_002_000, 3_999_000];

    let x: ChannelPath = "/x".parse()?;
    let y: ChannelPath = "/y".parse()?;

    // Create the strategy
    let registry = StrategyRegistry::with_defaults();
    let strategy = registry.create(&Config::approximate(16))?;
    strategy.initialize_channels(x.clone(), &[y.clone()])?;
    strategy.set_sync_data_handler(Arc::new(Printer::default()));

    // Interleave the two channels
    let origin = Uuid::new_v4();
    let deliveries = x_seq
        .iter()
        .zip(&y_seq)
        .flat_map(|(&tx, &ty)| [(&x, tx), (&y, ty)]);
    for (sequence, (channel, ts)) in deliveries.enumerate() {
        let message = Message::builder(MessageId::new(origin, sequence as u64), channel.clone())
            .create_time(ts)
            .build_ref();
        strategy.handle(message)?;
    }

    println!("{:#?}", strategy.stats());
    Ok(())
}
