//! Content-addressed code store and compiled module cache.
//!
//! Raw bytecode is persisted as `<cache_dir>/wasm/<hex checksum>.wasm` and is
//! the source of truth. Compiled modules live in two in-memory tiers:
//!
//! - **pinned**: kept until explicitly unpinned, not counted against the
//!   memory budget
//! - **memory**: bounded by `memory_cache_size_bytes`, least recently used
//!   modules are evicted first
//!
//! Lookups only take read locks and bump an atomic recency tick. Compilation
//! on a miss happens outside any lock. Locks are taken memory before pinned.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use wasmtime::{Engine, Module};

use contractvm_primitives::Checksum;

use crate::error::VmError;

const WASM_DIR: &str = "wasm";

/// A compiled module shared by every call running the same code.
pub struct CachedModule {
    pub module: Module,
    /// Estimated resident size in bytes.
    pub size: usize,
    last_used: AtomicU64,
}

impl CachedModule {
    fn new(module: Module, size: usize, tick: u64) -> Self {
        Self {
            module,
            size,
            last_used: AtomicU64::new(tick),
        }
    }

    fn touch(&self, tick: u64) {
        self.last_used.store(tick, Ordering::Relaxed);
    }

    fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }
}

/// Cache counters and sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub hits_pinned_memory_cache: u64,
    pub hits_memory_cache: u64,
    /// Lookups that had to compile from disk.
    pub misses: u64,
    pub elements_pinned: usize,
    pub elements_memory: usize,
    pub size_pinned: usize,
    pub size_memory: usize,
}

#[derive(Default)]
struct MemoryCache {
    modules: BTreeMap<Checksum, Arc<CachedModule>>,
    size: usize,
}

impl MemoryCache {
    fn remove(&mut self, checksum: &Checksum) -> Option<Arc<CachedModule>> {
        let removed = self.modules.remove(checksum)?;
        self.size -= removed.size;
        Some(removed)
    }
}

#[derive(Default)]
struct Stats {
    hits_pinned: AtomicU64,
    hits_memory: AtomicU64,
    misses: AtomicU64,
}

pub struct CodeCache {
    engine: Engine,
    wasm_dir: PathBuf,
    memory_limit: usize,
    memory: RwLock<MemoryCache>,
    pinned: RwLock<BTreeMap<Checksum, Arc<CachedModule>>>,
    tick: AtomicU64,
    stats: Stats,
    write_lock: Mutex<()>,
}

fn poisoned<T>(_: T) -> VmError {
    VmError::Cache("cache lock poisoned".into())
}

fn io_error(path: &Path, err: std::io::Error) -> VmError {
    VmError::Cache(format!("{}: {err}", path.display()))
}

/// Resident size of a compiled module: its code image plus the bytecode it
/// was compiled from.
fn estimate_size(module: &Module, wasm_len: usize) -> usize {
    let image = module.image_range();
    (image.end as usize).saturating_sub(image.start as usize) + wasm_len
}

impl CodeCache {
    /// Open (or create) the code store under `cache_dir`.
    pub fn new(engine: Engine, cache_dir: &Path, memory_limit: usize) -> Result<Self, VmError> {
        let wasm_dir = cache_dir.join(WASM_DIR);
        fs::create_dir_all(&wasm_dir).map_err(|e| io_error(&wasm_dir, e))?;
        Ok(Self {
            engine,
            wasm_dir,
            memory_limit,
            memory: RwLock::new(MemoryCache::default()),
            pinned: RwLock::new(BTreeMap::new()),
            tick: AtomicU64::new(0),
            stats: Stats::default(),
            write_lock: Mutex::new(()),
        })
    }

    fn wasm_path(&self, checksum: &Checksum) -> PathBuf {
        self.wasm_dir.join(format!("{}.wasm", checksum.to_hex()))
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ── Persisted bytecode ──

    /// Persist bytecode. Existing files are left alone since the name is
    /// the content hash.
    pub fn save_wasm(&self, checksum: &Checksum, wasm: &[u8]) -> Result<(), VmError> {
        let path = self.wasm_path(checksum);
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        if path.exists() {
            return Ok(());
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, wasm).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))?;
        tracing::debug!(target: "contractvm::cache", %checksum, size = wasm.len(), "saved wasm");
        Ok(())
    }

    /// Read persisted bytecode, verifying it still hashes to `checksum`.
    pub fn load_wasm(&self, checksum: &Checksum) -> Result<Vec<u8>, VmError> {
        let path = self.wasm_path(checksum);
        let wasm = match fs::read(&path) {
            Ok(wasm) => wasm,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(VmError::not_found(*checksum)),
            Err(e) => return Err(io_error(&path, e)),
        };
        let actual = Checksum::generate(&wasm);
        if actual != *checksum {
            return Err(VmError::Cache(format!(
                "integrity check failed for {checksum}: file hashes to {actual}"
            )));
        }
        Ok(wasm)
    }

    /// Delete persisted bytecode and drop every compiled copy.
    ///
    /// The memory cache write lock is held across the delete so that a
    /// module compiled concurrently cannot be cached after its file is gone.
    pub fn remove_wasm(&self, checksum: &Checksum) -> Result<(), VmError> {
        let path = self.wasm_path(checksum);
        let mut memory = self.memory.write().map_err(poisoned)?;
        {
            let _guard = self.write_lock.lock().map_err(poisoned)?;
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Err(VmError::not_found(*checksum)),
                Err(e) => return Err(io_error(&path, e)),
            }
        }
        memory.remove(checksum);
        self.pinned.write().map_err(poisoned)?.remove(checksum);
        tracing::debug!(target: "contractvm::cache", %checksum, "removed wasm");
        Ok(())
    }

    /// Whether bytecode for `checksum` is persisted. Callers hold the memory
    /// cache write lock so the answer cannot race with `remove_wasm`.
    fn is_stored(&self, checksum: &Checksum) -> bool {
        self.wasm_path(checksum).is_file()
    }

    // ── Compiled modules ──

    /// Resolve a compiled module: pinned, then memory, then compile from
    /// disk and insert into the memory cache.
    pub fn get(&self, checksum: &Checksum) -> Result<Arc<CachedModule>, VmError> {
        if let Some(cached) = self.pinned.read().map_err(poisoned)?.get(checksum).cloned() {
            self.stats.hits_pinned.fetch_add(1, Ordering::Relaxed);
            cached.touch(self.next_tick());
            return Ok(cached);
        }
        if let Some(cached) = self.memory.read().map_err(poisoned)?.modules.get(checksum).cloned() {
            self.stats.hits_memory.fetch_add(1, Ordering::Relaxed);
            cached.touch(self.next_tick());
            return Ok(cached);
        }

        let (module, wasm_len) = self.compile_from_disk(checksum)?;
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.insert(*checksum, module, wasm_len)
    }

    fn compile_from_disk(&self, checksum: &Checksum) -> Result<(Module, usize), VmError> {
        let wasm = self.load_wasm(checksum)?;
        let module = Module::new(&self.engine, &wasm)
            .map_err(|e| VmError::Engine(format!("compiling {checksum}: {e}")))?;
        tracing::debug!(target: "contractvm::cache", %checksum, "compiled from disk");
        Ok((module, wasm.len()))
    }

    /// Add a compiled module to the memory cache, evicting least recently
    /// used entries until the budget holds. A module larger than the whole
    /// budget, or one whose bytecode was removed meanwhile, is returned
    /// without being cached.
    pub fn insert(&self, checksum: Checksum, module: Module, wasm_len: usize) -> Result<Arc<CachedModule>, VmError> {
        let size = estimate_size(&module, wasm_len);
        let cached = Arc::new(CachedModule::new(module, size, self.next_tick()));
        if size > self.memory_limit {
            tracing::debug!(target: "contractvm::cache", %checksum, size, limit = self.memory_limit, "module exceeds memory cache budget");
            return Ok(cached);
        }

        let mut memory = self.memory.write().map_err(poisoned)?;
        if !self.is_stored(&checksum) {
            tracing::debug!(target: "contractvm::cache", %checksum, "code removed during compile, not caching");
            return Ok(cached);
        }
        memory.remove(&checksum);
        memory.modules.insert(checksum, Arc::clone(&cached));
        memory.size += size;
        while memory.size > self.memory_limit {
            let Some(oldest) = memory
                .modules
                .iter()
                .filter(|(key, _)| **key != checksum)
                .min_by_key(|(_, m)| m.last_used())
                .map(|(key, _)| *key)
            else {
                break;
            };
            memory.remove(&oldest);
            tracing::debug!(target: "contractvm::cache", checksum = %oldest, "evicted from memory cache");
        }
        Ok(cached)
    }

    /// Keep a module resident outside the memory budget.
    pub fn pin(&self, checksum: &Checksum) -> Result<(), VmError> {
        if self.pinned.read().map_err(poisoned)?.contains_key(checksum) {
            return Ok(());
        }
        let from_memory = self.memory.read().map_err(poisoned)?.modules.get(checksum).cloned();
        let cached = match from_memory {
            Some(cached) => cached,
            None => {
                let (module, wasm_len) = self.compile_from_disk(checksum)?;
                let size = estimate_size(&module, wasm_len);
                Arc::new(CachedModule::new(module, size, self.next_tick()))
            }
        };

        let mut memory = self.memory.write().map_err(poisoned)?;
        if !self.is_stored(checksum) {
            return Err(VmError::not_found(*checksum));
        }
        memory.remove(checksum);
        self.pinned.write().map_err(poisoned)?.insert(*checksum, cached);
        tracing::debug!(target: "contractvm::cache", %checksum, "pinned");
        Ok(())
    }

    /// Release a pinned module. Unknown checksums are ignored.
    pub fn unpin(&self, checksum: &Checksum) -> Result<(), VmError> {
        if self.pinned.write().map_err(poisoned)?.remove(checksum).is_some() {
            tracing::debug!(target: "contractvm::cache", %checksum, "unpinned");
        }
        Ok(())
    }

    pub fn metrics(&self) -> Result<Metrics, VmError> {
        let memory = self.memory.read().map_err(poisoned)?;
        let pinned = self.pinned.read().map_err(poisoned)?;
        Ok(Metrics {
            hits_pinned_memory_cache: self.stats.hits_pinned.load(Ordering::Relaxed),
            hits_memory_cache: self.stats.hits_memory.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            elements_pinned: pinned.len(),
            elements_memory: memory.modules.len(),
            size_pinned: pinned.values().map(|m| m.size).sum(),
            size_memory: memory.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_wat(value: i32) -> Vec<u8> {
        wat::parse_str(format!(
            r#"(module (memory (export "memory") 1) (func (export "f") (result i32) i32.const {value}))"#
        ))
        .unwrap()
    }

    fn new_cache(dir: &Path, limit: usize) -> CodeCache {
        CodeCache::new(Engine::default(), dir, limit).unwrap()
    }

    fn store(cache: &CodeCache, wasm: &[u8]) -> Checksum {
        let checksum = Checksum::generate(wasm);
        cache.save_wasm(&checksum, wasm).unwrap();
        checksum
    }

    #[test]
    fn test_save_and_load_wasm() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), usize::MAX);
        let wasm = module_wat(1);
        let checksum = store(&cache, &wasm);

        assert_eq!(cache.load_wasm(&checksum).unwrap(), wasm);
        assert!(dir.path().join("wasm").join(format!("{}.wasm", checksum.to_hex())).exists());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), usize::MAX);
        let err = cache.load_wasm(&Checksum::generate(b"nothing")).unwrap_err();
        assert!(matches!(err, VmError::NotFound { .. }));
    }

    #[test]
    fn test_load_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), usize::MAX);
        let checksum = store(&cache, &module_wat(1));
        fs::write(cache.wasm_path(&checksum), module_wat(2)).unwrap();

        let err = cache.load_wasm(&checksum).unwrap_err();
        assert!(matches!(err, VmError::Cache(msg) if msg.contains("integrity")));
    }

    #[test]
    fn test_remove_wasm() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), usize::MAX);
        let checksum = store(&cache, &module_wat(1));
        cache.get(&checksum).unwrap();

        cache.remove_wasm(&checksum).unwrap();
        assert_eq!(cache.metrics().unwrap().elements_memory, 0);
        assert!(matches!(cache.remove_wasm(&checksum), Err(VmError::NotFound { .. })));
        assert!(matches!(cache.get(&checksum), Err(VmError::NotFound { .. })));
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), usize::MAX);
        let checksum = store(&cache, &module_wat(1));

        cache.get(&checksum).unwrap();
        cache.get(&checksum).unwrap();
        let metrics = cache.metrics().unwrap();
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.hits_memory_cache, 1);
        assert_eq!(metrics.elements_memory, 1);
        assert!(metrics.size_memory > 0);
    }

    #[test]
    fn test_lru_eviction() {
        let sizes_dir = tempfile::tempdir().unwrap();
        let sizes = new_cache(sizes_dir.path(), usize::MAX);
        let (a, b) = (module_wat(1), module_wat(2));
        let size_a = sizes.get(&store(&sizes, &a)).unwrap().size;
        let size_b = sizes.get(&store(&sizes, &b)).unwrap().size;

        // Room for either module alone, never both.
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), size_a.max(size_b) + size_a.min(size_b) - 1);
        let checksum_a = store(&cache, &a);
        let checksum_b = store(&cache, &b);
        cache.get(&checksum_a).unwrap();
        cache.get(&checksum_b).unwrap();

        let metrics = cache.metrics().unwrap();
        assert_eq!(metrics.elements_memory, 1);
        assert_eq!(metrics.size_memory, size_b);

        // A was evicted and must be compiled again.
        cache.get(&checksum_a).unwrap();
        assert_eq!(cache.metrics().unwrap().misses, 3);
    }

    #[test]
    fn test_module_larger_than_budget_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), 0);
        let checksum = store(&cache, &module_wat(1));
        cache.get(&checksum).unwrap();
        assert_eq!(cache.metrics().unwrap().elements_memory, 0);
    }

    #[test]
    fn test_pin_and_unpin() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), 0);
        let checksum = store(&cache, &module_wat(1));

        cache.pin(&checksum).unwrap();
        cache.get(&checksum).unwrap();
        let metrics = cache.metrics().unwrap();
        assert_eq!(metrics.elements_pinned, 1);
        assert_eq!(metrics.hits_pinned_memory_cache, 1);
        assert_eq!(metrics.misses, 0);

        cache.unpin(&checksum).unwrap();
        cache.unpin(&checksum).unwrap();
        assert_eq!(cache.metrics().unwrap().elements_pinned, 0);
    }

    #[test]
    fn test_pin_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), usize::MAX);
        let err = cache.pin(&Checksum::generate(b"missing")).unwrap_err();
        assert!(matches!(err, VmError::NotFound { .. }));
    }

    #[test]
    fn test_insert_after_remove_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = new_cache(dir.path(), usize::MAX);
        let wasm = module_wat(1);
        let checksum = store(&cache, &wasm);

        // Compiled before the removal, inserted after it.
        let module = Module::new(&cache.engine, &wasm).unwrap();
        cache.remove_wasm(&checksum).unwrap();
        cache.insert(checksum, module, wasm.len()).unwrap();

        assert_eq!(cache.metrics().unwrap().elements_memory, 0);
        assert!(matches!(cache.get(&checksum), Err(VmError::NotFound { .. })));
    }
}
