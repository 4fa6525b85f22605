//! Connection pooling with metrics example.
//!
//! This example drives a pool over the in-memory mock driver and prints
//! pool status and metrics as connections are acquired, returned and
//! released.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=mongo_pool=debug cargo run -p mongo-pool-testing --example connection_pool
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use mongo_pool::{Pool, PoolConfig, PoolError, Typed};
use mongo_pool_testing::{MockDriver, init_tracing};
use tokio::time::Instant;

struct Recipe;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    println!("=== Connection Pool with Metrics Example ===\n");

    let driver = MockDriver::new();
    let pool_config = PoolConfig::new()
        .uri("mock://localhost:27017")
        .database("foodblog")
        .max_connections(4)
        .timeout(Duration::from_secs(5));

    println!("Pool configuration:");
    println!("  Max connections: {}", pool_config.max_connections);
    println!("  Timeout: {:?}", pool_config.timeout);
    println!();

    let pool = Pool::builder()
        .name("foodblog")
        .config(pool_config)
        .driver(driver.clone())
        .build()?;

    // Example 1: Basic pool usage
    println!("1. Basic pool usage:");
    {
        let recipes = pool.get_collection(Typed::<Recipe>::new()).await?;
        println!("  Resolved collection: {}", recipes.namespace());
        pool.return_connection(recipes.connection().clone()).await;
    }
    print_pool_status(&pool);

    // Example 2: Concurrent usage
    println!("\n2. Concurrent pool usage (6 parallel callers):");
    let start = Instant::now();
    let mut handles = vec![];

    for i in 0..6 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let conn = pool.acquire_connection().await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            pool.return_connection(conn).await;
            Ok::<_, PoolError>(i)
        }));
    }

    let mut completed = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            completed += 1;
        }
    }
    println!("  Completed {} callers in {:?}", completed, start.elapsed());
    print_pool_metrics(&pool);

    // Example 3: Liveness
    println!("\n3. Liveness probing:");
    let open = pool.open_connections().await;
    if let Some(first) = open.first() {
        driver.kill(first.session());
    }
    let liveness = pool.liveness().await;
    println!("  Open: {}, busy: {}", liveness.open, liveness.busy);

    // Example 4: Fail fast when busy
    println!("\n4. Busy-error policy:");
    pool.set_error_on_busy();
    let mut held = vec![];
    loop {
        match pool.acquire_connection().await {
            Ok(conn) => held.push(conn),
            Err(e) => {
                println!("  Rejected after {} acquires: {}", held.len(), e);
                break;
            }
        }
    }
    for conn in held {
        pool.release_connection(conn).await;
    }
    print_pool_status(&pool);

    // Graceful shutdown
    println!("\n5. Graceful shutdown:");
    pool.close().await;
    println!("  Pool closed: {}", pool.is_closed());
    print_pool_metrics(&pool);

    Ok(())
}

fn print_pool_status(pool: &Pool<MockDriver>) {
    let status = pool.status();
    println!(
        "  Status: {}/{} connections leased, {} idle, capacity {} ({:.1}% utilization)",
        status.leased,
        status.max,
        status.idle,
        status.capacity,
        status.utilization()
    );
}

fn print_pool_metrics(pool: &Pool<MockDriver>) {
    let metrics = pool.metrics();
    println!("  Metrics:");
    println!("    Connections created: {}", metrics.connections_created);
    println!("    Connections closed: {}", metrics.connections_closed);
    println!("    Overflow connections: {}", metrics.overflow_connections);
    println!("    Reuse rate: {:.2}%", metrics.reuse_rate() * 100.0);
    println!(
        "    Probes: {} performed, {} failed",
        metrics.probes_performed, metrics.probes_failed
    );
}
