//! Chat dispatch example: serializing per-conversation delivery.
//!
//! Demonstrates enqueueing events for several conversations, watching the
//! queue keep each conversation strictly ordered while different ones
//! interleave, and the retry-then-abandon path for a failing payload.

use std::sync::Arc;
use std::time::Duration;

use convoy::{ConsumerFn, MemoryQueue, Queue, QueueEventPayload, QueueOptions, Routable};
use convoy_testkit::ChatEvent;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("convoy=debug")
        .init();

    println!("=== Convoy Chat Dispatch Example ===\n");

    let queue = MemoryQueue::new(
        "incoming",
        QueueOptions::default()
            .with_retries(1)
            .with_drain_interval(Duration::from_millis(500)),
    );
    let mut events = queue.events();

    queue.subscribe(Arc::new(ConsumerFn::new(|event: ChatEvent| async move {
        if event.preview.contains("boom") {
            anyhow::bail!("handler cannot process {}", event.preview);
        }
        println!("[HANDLER] {} -> {}", event.routing_key(), event.preview);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    })));

    println!("1. Enqueueing three conversations...\n");
    for (user, text) in [
        ("alice", "hello"),
        ("bob", "hi there"),
        ("alice", "how are you?"),
        ("carol", "boom"),
        ("bob", "bye"),
    ] {
        queue
            .enqueue(
                ChatEvent::new("bot1", "web", user).with_preview(text),
                0,
                false,
            )
            .await?;
    }

    println!("2. Watching lifecycle events...\n");
    let mut settled = 0;
    while settled < 5 {
        let event = events.recv().await?;
        match event.payload {
            QueueEventPayload::Completed { key, .. } => {
                println!("   completed: {key}");
                settled += 1;
            }
            QueueEventPayload::Retried { key, attempt, .. } => {
                println!("   retry #{attempt}: {key}");
            }
            QueueEventPayload::Abandoned { key, error, .. } => {
                println!("   abandoned: {key} ({error})");
                settled += 1;
            }
            _ => {}
        }
    }

    queue.dispose();
    println!("\n=== Example Complete ===");
    Ok(())
}
