//! Cache contract backing the election and overview stores (spec.md section
//! 6). Grounded on `original_source/app/backend/cache_service.py`'s
//! `CacheInterface` / `InMemoryCache` / `MemcacheCache` trio, translated into
//! an async Rust trait with two concrete implementations behind it. The
//! memcache client speaks the plain text protocol directly over a
//! `tokio::net::TcpStream`, in the same raw-socket idiom the teacher uses in
//! `engine/src/health.rs` rather than pulling in an unvetted memcache crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[async_trait]
pub trait Cache: Send + Sync {
	async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
	async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> anyhow::Result<()>;
	async fn drop_key(&self, key: &str) -> anyhow::Result<()>;

	async fn get_multi(&self, keys: &[String]) -> anyhow::Result<HashMap<String, Vec<u8>>> {
		let mut out = HashMap::with_capacity(keys.len());
		for key in keys {
			if let Some(value) = self.get(key).await? {
				out.insert(key.clone(), value);
			}
		}
		Ok(out)
	}

	async fn set_multi(&self, entries: HashMap<String, Vec<u8>>, ttl: Option<Duration>) -> anyhow::Result<()> {
		for (key, value) in entries {
			self.set(&key, value, ttl).await?;
		}
		Ok(())
	}

	async fn drop_multi(&self, keys: &[String]) -> anyhow::Result<()> {
		for key in keys {
			self.drop_key(key).await?;
		}
		Ok(())
	}
}

/// Default backend: an in-process map guarded by a std mutex, matching the
/// original's `InMemoryCache`.
#[derive(Default)]
pub struct InMemoryCache {
	store: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryCache {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl Cache for InMemoryCache {
	async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
		Ok(self.store.lock().unwrap().get(key).cloned())
	}

	async fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) -> anyhow::Result<()> {
		self.store.lock().unwrap().insert(key.to_string(), value);
		Ok(())
	}

	async fn drop_key(&self, key: &str) -> anyhow::Result<()> {
		self.store.lock().unwrap().remove(key);
		Ok(())
	}

	async fn get_multi(&self, keys: &[String]) -> anyhow::Result<HashMap<String, Vec<u8>>> {
		let store = self.store.lock().unwrap();
		Ok(keys.iter().filter_map(|k| store.get(k).map(|v| (k.clone(), v.clone()))).collect())
	}

	async fn set_multi(&self, entries: HashMap<String, Vec<u8>>, _ttl: Option<Duration>) -> anyhow::Result<()> {
		self.store.lock().unwrap().extend(entries);
		Ok(())
	}

	async fn drop_multi(&self, keys: &[String]) -> anyhow::Result<()> {
		let mut store = self.store.lock().unwrap();
		for key in keys {
			store.remove(key);
		}
		Ok(())
	}
}

/// Memcache-backed implementation, active when `MEMCACHE_HOST` is set.
/// Opens a fresh connection per operation - acceptable here since the
/// aggregator batches via `get_multi`/`set_multi` rather than issuing one
/// round trip per key on the hot path.
pub struct MemcacheCache {
	host: String,
	port: u16,
}

impl MemcacheCache {
	pub fn new(host: String, port: u16) -> Self {
		Self { host, port }
	}

	async fn connect(&self) -> anyhow::Result<TcpStream> {
		Ok(TcpStream::connect((self.host.as_str(), self.port)).await?)
	}

	async fn command(&self, request: &str) -> anyhow::Result<String> {
		let mut stream = self.connect().await?;
		stream.write_all(request.as_bytes()).await?;
		stream.flush().await?;

		let mut buf = Vec::new();
		let mut chunk = [0u8; 4096];
		loop {
			let n = stream.read(&mut chunk).await?;
			if n == 0 {
				break;
			}
			buf.extend_from_slice(&chunk[..n]);
			if buf.ends_with(b"END\r\n") || buf.ends_with(b"STORED\r\n") || buf.ends_with(b"DELETED\r\n") || buf.ends_with(b"NOT_FOUND\r\n") {
				break;
			}
		}
		Ok(String::from_utf8_lossy(&buf).into_owned())
	}
}

#[async_trait]
impl Cache for MemcacheCache {
	async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
		let response = self.command(&format!("get {key}\r\n")).await?;
		if let Some(rest) = response.strip_prefix("VALUE ") {
			let mut lines = rest.splitn(2, "\r\n");
			let header = lines.next().unwrap_or_default();
			let body = lines.next().unwrap_or_default();
			let len: usize = header.split_whitespace().nth(2).and_then(|s| s.parse().ok()).unwrap_or(0);
			Ok(Some(body.as_bytes()[..len.min(body.len())].to_vec()))
		} else {
			Ok(None)
		}
	}

	async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> anyhow::Result<()> {
		let exptime = ttl.map(|d| d.as_secs()).unwrap_or(0);
		let mut request = format!("set {key} 0 {exptime} {}\r\n", value.len()).into_bytes();
		request.extend_from_slice(&value);
		request.extend_from_slice(b"\r\n");
		let request = String::from_utf8_lossy(&request).into_owned();
		self.command(&request).await?;
		Ok(())
	}

	async fn drop_key(&self, key: &str) -> anyhow::Result<()> {
		self.command(&format!("delete {key}\r\n")).await?;
		Ok(())
	}
}

/// Namespaced view over a shared cache backend - the election and overview
/// stores each get their own [`NamespacedCache`] with disjoint key prefixes
/// (`el_`/`ov_`) over the same or different backends (spec.md section 6).
pub struct NamespacedCache {
	backend: std::sync::Arc<dyn Cache>,
	prefix: &'static str,
}

impl NamespacedCache {
	pub fn new(backend: std::sync::Arc<dyn Cache>, prefix: &'static str) -> Self {
		Self { backend, prefix }
	}

	fn key(&self, k: &str) -> String {
		format!("{}{}", self.prefix, k)
	}

	pub async fn get_json<T: serde::de::DeserializeOwned>(&self, k: &str) -> anyhow::Result<Option<T>> {
		match self.backend.get(&self.key(k)).await? {
			Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
			None => Ok(None),
		}
	}

	pub async fn set_json<T: serde::Serialize>(&self, k: &str, value: &T) -> anyhow::Result<()> {
		self.backend.set(&self.key(k), serde_json::to_vec(value)?, None).await
	}

	pub async fn get_multi_json<T: serde::de::DeserializeOwned>(&self, keys: &[String]) -> anyhow::Result<HashMap<String, T>> {
		let prefixed: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
		let raw = self.backend.get_multi(&prefixed).await?;
		let mut out = HashMap::with_capacity(raw.len());
		for (prefixed_key, bytes) in raw {
			let original = prefixed_key.strip_prefix(self.prefix).unwrap_or(&prefixed_key).to_string();
			out.insert(original, serde_json::from_slice(&bytes)?);
		}
		Ok(out)
	}

	pub async fn set_multi_json<T: serde::Serialize>(&self, entries: &HashMap<String, T>) -> anyhow::Result<()> {
		let mut prefixed = HashMap::with_capacity(entries.len());
		for (k, v) in entries {
			prefixed.insert(self.key(k), serde_json::to_vec(v)?);
		}
		self.backend.set_multi(prefixed, None).await
	}

	pub async fn drop_multi(&self, keys: &[String]) -> anyhow::Result<()> {
		let prefixed: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
		self.backend.drop_multi(&prefixed).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn in_memory_cache_round_trips_multi() {
		let cache = InMemoryCache::new();
		let mut entries = HashMap::new();
		entries.insert("a".to_string(), b"1".to_vec());
		entries.insert("b".to_string(), b"2".to_vec());
		cache.set_multi(entries, None).await.unwrap();

		let got = cache.get_multi(&["a".to_string(), "missing".to_string()]).await.unwrap();
		assert_eq!(got.get("a"), Some(&b"1".to_vec()));
		assert!(!got.contains_key("missing"));

		cache.drop_multi(&["a".to_string()]).await.unwrap();
		assert!(cache.get("a").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn namespaced_cache_round_trips_json() {
		let backend: std::sync::Arc<dyn Cache> = std::sync::Arc::new(InMemoryCache::new());
		let ns = NamespacedCache::new(backend, "el_");
		ns.set_json("hash1", &42u32).await.unwrap();
		let value: Option<u32> = ns.get_json("hash1").await.unwrap();
		assert_eq!(value, Some(42));
	}
}
