//! # Cross-thread publishing
//!
//! Worker threads publish score events while the home thread runs the pump.
//! A type-wide gate mutes negative scores, and a subscriber that is dropped
//! midway simply stops receiving.
//!
//! ## Run
//! ```bash
//! RUST_LOG=weakbus=debug cargo run --example cross_thread
//! ```

use std::{
    sync::atomic::{AtomicI64, AtomicU32, Ordering},
    sync::Arc,
    thread,
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use weakbus::{Callback, Config, Messenger, Predicate};

#[derive(Debug, Clone, Copy)]
struct Scored {
    player: u32,
    points: i64,
}

#[derive(Default)]
struct Board {
    total: AtomicI64,
    events: AtomicU32,
}

impl Board {
    fn on_scored(&self, ev: &Scored) {
        tracing::debug!(player = ev.player, points = ev.points, "scored");
        self.total.fetch_add(ev.points, Ordering::Relaxed);
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    fn print(&self, name: &str) {
        println!(
            " ├─► {name}: {} events, {} points",
            self.events.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed)
        );
    }
}

fn non_negative(ev: &Scored) -> bool {
    ev.points >= 0
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus = Messenger::with_config(Config {
        tick: Duration::from_millis(5),
        ..Config::default()
    });

    let board = Arc::new(Board::default());
    let spectator = Arc::new(Board::default());
    bus.subscribe(Callback::bound(&board, Board::on_scored), None)?
        .subscribe(Callback::bound(&spectator, Board::on_scored), None)?
        .subscribe_predicate(Predicate::new(non_negative))?;

    let token = CancellationToken::new();
    let workers: Vec<_> = (0..3_u32)
        .map(|player| {
            let bus = bus.clone();
            thread::spawn(move || {
                for round in 0..10_i64 {
                    let points = if round % 4 == 3 { -5 } else { round };
                    bus.publish(Scored { player, points });
                    thread::sleep(Duration::from_millis(2));
                }
            })
        })
        .collect();

    let stopper = {
        let token = token.clone();
        let spectator = Arc::clone(&spectator);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            // the spectator leaves; its subscription is swept on the next publish
            drop(spectator);
            for worker in workers {
                let _ = worker.join();
            }
            token.cancel();
        })
    };
    drop(spectator);

    bus.run(token).await?;
    let _ = stopper.join();

    println!();
    println!("Results:");
    board.print("board");
    println!(" └─► stats: {}", bus.stats());
    Ok(())
}
