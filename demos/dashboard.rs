//! # Shop Dashboard Walkthrough
//!
//! This example demonstrates the cache session as a dashboard would use it:
//! - Registering cached stores over an in-memory stand-in for the hosted store
//! - Cache hits vs fetches, observed through the session stats
//! - Watching a bound query's loading state
//! - Invalidation from local writes and from another client's notifications
//!
//! Run with `RUST_LOG=shopcache=debug,cache_system=debug` for the cache logs.

use shopcache::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Hosted-store stand-in holding records in memory
struct InMemory<T> {
    records: Mutex<Vec<T>>,
}

impl<T> InMemory<T> {
    fn new(records: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
        })
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl<T: Entity> DataSource<T> for InMemory<T> {
    async fn fetch_all(&self) -> anyhow::Result<Vec<T>> {
        // pretend the round trip costs something
        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        Ok(self.rows().clone())
    }

    async fn fetch_by_id(&self, id: &str) -> anyhow::Result<Option<T>> {
        Ok(self.rows().iter().find(|r| r.id() == id).cloned())
    }

    async fn fetch_where(&self, filter: &StoreFilter) -> anyhow::Result<Vec<T>> {
        let mut matching = Vec::new();
        for record in self.rows().iter() {
            if filter.matches(&serde_json::to_value(record)?) {
                matching.push(record.clone());
            }
        }
        Ok(matching)
    }

    async fn insert(&self, record: T) -> anyhow::Result<T> {
        self.rows().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, record: T) -> anyhow::Result<Option<T>> {
        let mut rows = self.rows();
        match rows.iter_mut().find(|r| r.id() == id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let mut rows = self.rows();
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        Ok(rows.len() != before)
    }
}

fn product(id: &str, brand_id: &str, name: &str, price_cents: i64) -> Product {
    Product {
        id: id.to_string(),
        sku: format!("SKU-{}", id),
        name: name.to_string(),
        brand_id: brand_id.to_string(),
        supplier_id: "S1".to_string(),
        colour: None,
        size_ml: 2500,
        price_cents,
        discontinued: false,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    println!("🎨 Shop Dashboard Cache Walkthrough");
    println!("===================================");

    // 1. Session Setup
    let config = AppConfig::load().unwrap_or_else(|err| {
        println!("ℹ️  Using default configuration ({})", err);
        AppConfig::default()
    });
    let mut session = ShopCache::new(config)?;
    session.start();
    println!("✅ Session started");

    let brands = session.register_store::<Brand>(InMemory::new(vec![Brand {
        id: "B1".to_string(),
        name: "Dulux".to_string(),
        supplier_id: "S1".to_string(),
    }]))?;
    session.register_store::<Product>(InMemory::new(vec![
        product("P1", "B1", "Satin White 2.5L", 3499),
        product("P2", "B1", "Gloss Black 1L", 1899),
    ]))?;

    // 2. Cache hits vs fetches
    println!("\n📦 Product list");
    println!("---------------");
    let products = session.get_store::<Product>()?;

    let started = Instant::now();
    let listed = products.list_all().await?;
    println!("First load: {} products in {:?} (fetched)", listed.len(), started.elapsed());

    let started = Instant::now();
    products.list_all().await?;
    println!("Second load in {:?} (cache hit)", started.elapsed());

    let stats = session.stats();
    println!("Stats: {} hit(s), {} miss(es), {} entries", stats.hits, stats.misses, stats.entries);

    // 3. Bound query with loading state
    println!("\n🔄 Explicit refresh");
    println!("-------------------");
    let view = products.list_query();
    let mut changes = view.subscribe();
    let watcher = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().clone();
            println!(
                "  view state: loading={} rows={}",
                state.loading,
                state.data.map(|rows| rows.len()).unwrap_or(0)
            );
        }
    });
    view.refetch().await?;

    // 4. Local write invalidates dependent classes
    println!("\n✏️  Local write");
    println!("--------------");
    brands
        .update(
            "B1",
            Brand {
                id: "B1".to_string(),
                name: "Dulux Trade".to_string(),
                supplier_id: "S1".to_string(),
            },
        )
        .await?;
    println!(
        "Brand renamed; product list cached: {}",
        session.cache().contains(&CacheKey::list(EntityClass::Products))
    );

    // 5. Notification from another client
    println!("\n📡 Remote change");
    println!("----------------");
    products.list_all().await?;
    let outcome = session.notify(
        ChangeEvent::new("products", Operation::Insert).with_record_id("P3"),
    );
    println!("Remote insert handled: {:?}", outcome);

    // 6. Sign out
    session.sign_out();
    println!("\n👋 Signed out, {} entries left", session.cache().len());

    session.shutdown();
    drop(view);
    let _ = watcher.await;
    Ok(())
}
