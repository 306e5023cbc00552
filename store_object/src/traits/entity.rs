use cache_system::EntityClass;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A record type held in the hosted store and cached per [`EntityClass`]
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Class whose TTL and cache keys this type uses
    const CLASS: EntityClass;

    /// Primary key as stored in the hosted store
    fn id(&self) -> &str;
}
