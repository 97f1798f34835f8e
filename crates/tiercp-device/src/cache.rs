//! Two-tier storage classification cache
//!
//! - The **fast tier** holds the result of one wholesale [`DriveClassifier::scan_all`]
//!   pass and lives for the lifetime of the cache.
//! - The **accurate tier** holds refined or user-supplied classes. It is loaded from
//!   a [`CacheFile`] at startup, invalidated per letter when the volume serial
//!   changed, and written back whenever a refinement succeeds.
//!
//! Ambiguous fast results (`ssd`/`hdd`) get exactly one bounded refinement
//! attempt per letter. A failed attempt is remembered so repeated lookups stay
//! cheap until the letter is refreshed explicitly.

use crate::classifier::DriveClassifier;
use crate::probe::SharedProbe;
use crate::refine::{BusTypeRefiner, NoRefiner, DEFAULT_REFINE_TIMEOUT};
use crate::store::{CacheFile, CacheRecord};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tiercp_types::{ClassificationEntry, Detection, DriveLetter, StorageClass};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, info, trace};

/// Configuration for the classification cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationCacheConfig {
    /// Time budget for one refinement call
    pub refine_timeout: Duration,
    /// Maximum refinement calls in flight at once
    pub max_concurrent_refinements: usize,
}

impl Default for ClassificationCacheConfig {
    fn default() -> Self {
        Self {
            refine_timeout: DEFAULT_REFINE_TIMEOUT,
            max_concurrent_refinements: 2,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationCacheStats {
    /// `get_type` calls
    pub lookups: u64,
    /// Lookups answered by the accurate tier
    pub accurate_hits: u64,
    /// Lookups answered by the fast tier
    pub fast_hits: u64,
    /// Refinement calls started
    pub refinements_attempted: u64,
    /// Refinement calls that produced a class
    pub refinements_succeeded: u64,
}

impl ClassificationCacheStats {
    /// Fraction of lookups answered by the accurate tier
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.accurate_hits as f64 / self.lookups as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    lookups: AtomicU64,
    accurate_hits: AtomicU64,
    fast_hits: AtomicU64,
    refinements_attempted: AtomicU64,
    refinements_succeeded: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ClassificationCacheStats {
        ClassificationCacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            accurate_hits: self.accurate_hits.load(Ordering::Relaxed),
            fast_hits: self.fast_hits.load(Ordering::Relaxed),
            refinements_attempted: self.refinements_attempted.load(Ordering::Relaxed),
            refinements_succeeded: self.refinements_succeeded.load(Ordering::Relaxed),
        }
    }
}

/// Two-tier classification cache
pub struct ClassificationCache {
    classifier: DriveClassifier,
    refiner: Arc<dyn BusTypeRefiner>,
    store: Option<CacheFile>,
    overrides: HashMap<DriveLetter, StorageClass>,
    config: ClassificationCacheConfig,
    fast: RwLock<Option<BTreeMap<DriveLetter, StorageClass>>>,
    accurate: RwLock<HashMap<DriveLetter, ClassificationEntry>>,
    attempted: Mutex<HashSet<DriveLetter>>,
    permits: Semaphore,
    counters: Counters,
}

impl std::fmt::Debug for ClassificationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationCache")
            .field("store", &self.store)
            .field("overrides", &self.overrides)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Shared cache handle
pub type SharedClassificationCache = Arc<ClassificationCache>;

/// Builder for [`ClassificationCache`]
pub struct ClassificationCacheBuilder {
    probe: SharedProbe,
    refiner: Arc<dyn BusTypeRefiner>,
    store: Option<CacheFile>,
    overrides: HashMap<DriveLetter, StorageClass>,
    config: ClassificationCacheConfig,
}

impl ClassificationCacheBuilder {
    /// Use a refinement backend
    pub fn refiner(mut self, refiner: Arc<dyn BusTypeRefiner>) -> Self {
        self.refiner = refiner;
        self
    }

    /// Persist the accurate tier to a file
    pub fn store(mut self, store: CacheFile) -> Self {
        self.store = Some(store);
        self
    }

    /// User-supplied classes that take precedence over detection
    pub fn overrides(mut self, overrides: HashMap<DriveLetter, StorageClass>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Tuning for refinement calls
    pub fn config(mut self, config: ClassificationCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the cache without touching the persisted store
    pub fn build(self) -> ClassificationCache {
        let permits = Semaphore::new(self.config.max_concurrent_refinements.max(1));
        ClassificationCache {
            classifier: DriveClassifier::new(self.probe),
            refiner: self.refiner,
            store: self.store,
            overrides: self.overrides,
            config: self.config,
            fast: RwLock::new(None),
            accurate: RwLock::new(HashMap::new()),
            attempted: Mutex::new(HashSet::new()),
            permits,
            counters: Counters::default(),
        }
    }

    /// Build the cache and load the persisted accurate tier
    pub async fn load(self) -> ClassificationCache {
        let cache = self.build();
        cache.load().await;
        cache
    }
}

impl ClassificationCache {
    /// Start building a cache over `probe`
    pub fn builder(probe: SharedProbe) -> ClassificationCacheBuilder {
        ClassificationCacheBuilder {
            probe,
            refiner: Arc::new(NoRefiner),
            store: None,
            overrides: HashMap::new(),
            config: ClassificationCacheConfig::default(),
        }
    }

    /// The underlying classifier
    pub fn classifier(&self) -> &DriveClassifier {
        &self.classifier
    }

    /// (Re)load the accurate tier from the store and apply overrides
    ///
    /// A persisted entry is dropped only when both its stored serial and the live
    /// serial are known and differ.
    pub async fn load(&self) {
        let record = match &self.store {
            Some(store) => store.load().await,
            None => CacheRecord::default(),
        };

        let mut loaded = HashMap::new();
        for (letter, class, stored_serial) in record.entries() {
            let live_serial = self.classifier.probe().volume_serial(letter).await;
            if let (Some(stored), Some(live)) = (stored_serial, live_serial) {
                if stored != live {
                    debug!(
                        "Dropping cached class for {}: serial changed {:08X} -> {:08X}",
                        letter, stored, live
                    );
                    continue;
                }
            }
            loaded.insert(
                letter,
                ClassificationEntry {
                    letter,
                    class,
                    volume_serial: live_serial.or(stored_serial),
                    is_override: false,
                },
            );
        }

        for (&letter, &class) in &self.overrides {
            loaded.insert(
                letter,
                ClassificationEntry {
                    letter,
                    class,
                    volume_serial: None,
                    is_override: true,
                },
            );
        }

        info!("Loaded {} accurate classifications", loaded.len());
        *self.accurate.write().await = loaded;
    }

    /// Storage class for the volume holding `path`
    ///
    /// Paths without a drive letter are classified as `hdd`.
    pub async fn get_type<P: AsRef<Path>>(&self, path: P) -> StorageClass {
        Counters::bump(&self.counters.lookups);
        let Some(letter) = DriveLetter::from_path(path.as_ref()) else {
            return StorageClass::Hdd;
        };

        if let Some(entry) = self.accurate.read().await.get(&letter) {
            Counters::bump(&self.counters.accurate_hits);
            return entry.class;
        }

        let base = self.fast_class(letter).await;
        Counters::bump(&self.counters.fast_hits);
        if !base.is_ambiguous() {
            return base;
        }

        if !self.attempted.lock().await.insert(letter) {
            trace!("Refinement already attempted for {}", letter);
            return base;
        }

        match self.refine(letter).await {
            Some(class) => {
                self.store_accurate(letter, class).await;
                class
            }
            None => base,
        }
    }

    /// Re-classify one letter and record the result in the accurate tier
    ///
    /// Without `force`, an existing accurate entry is returned untouched.
    /// Overridden letters always report their override.
    pub async fn refresh_for_letter(&self, letter: DriveLetter, force: bool) -> StorageClass {
        if let Some(&class) = self.overrides.get(&letter) {
            return class;
        }
        if !force {
            if let Some(entry) = self.accurate.read().await.get(&letter) {
                return entry.class;
            }
        }

        let base = match self.classifier.classify_present(letter).await {
            Some(class) => {
                if let Some(fast) = self.fast.write().await.as_mut() {
                    fast.insert(letter, class);
                }
                class
            }
            None => self.fast_class(letter).await,
        };

        let class = if base.is_ambiguous() {
            self.attempted.lock().await.insert(letter);
            self.refine(letter).await.unwrap_or(base)
        } else {
            base
        };

        self.store_accurate(letter, class).await;
        class
    }

    /// Refresh the letter of `path`; `None` when the path has no drive letter
    pub async fn refresh_for_path<P: AsRef<Path>>(
        &self,
        path: P,
        force: bool,
    ) -> Option<StorageClass> {
        let letter = DriveLetter::from_path(path.as_ref())?;
        Some(self.refresh_for_letter(letter, force).await)
    }

    /// Refresh several letters in sequence, e.g. from a background task
    pub async fn refresh_letters(
        &self,
        letters: &[DriveLetter],
        force: bool,
    ) -> BTreeMap<DriveLetter, StorageClass> {
        let mut results = BTreeMap::new();
        for &letter in letters {
            results.insert(letter, self.refresh_for_letter(letter, force).await);
        }
        results
    }

    /// Drop the fast tier and forget failed refinement attempts
    pub async fn invalidate_fast(&self) {
        *self.fast.write().await = None;
        self.attempted.lock().await.clear();
    }

    /// Accurate-tier entries, sorted by letter
    pub async fn accurate_entries(&self) -> Vec<ClassificationEntry> {
        let mut entries: Vec<_> = self.accurate.read().await.values().cloned().collect();
        entries.sort_by_key(|entry| entry.letter);
        entries
    }

    /// Fast-tier classes, scanning if the tier is empty
    pub async fn fast_entries(&self) -> BTreeMap<DriveLetter, StorageClass> {
        self.ensure_fast().await;
        self.fast.read().await.clone().unwrap_or_default()
    }

    /// Snapshot of the statistics
    pub fn stats(&self) -> ClassificationCacheStats {
        self.counters.snapshot()
    }

    async fn ensure_fast(&self) {
        if self.fast.read().await.is_some() {
            return;
        }
        let mut fast = self.fast.write().await;
        if fast.is_none() {
            *fast = Some(self.classifier.scan_all().await);
        }
    }

    async fn fast_class(&self, letter: DriveLetter) -> StorageClass {
        self.ensure_fast().await;
        self.fast
            .read()
            .await
            .as_ref()
            .and_then(|fast| fast.get(&letter).copied())
            .unwrap_or_default()
    }

    async fn refine(&self, letter: DriveLetter) -> Option<StorageClass> {
        let Ok(_permit) = self.permits.acquire().await else {
            return None;
        };
        Counters::bump(&self.counters.refinements_attempted);

        let result = tokio::time::timeout(self.config.refine_timeout, self.refiner.refine(letter))
            .await
            .unwrap_or_else(|_| Detection::inconclusive("refinement timed out"));

        match result {
            Detection::Found(class) => {
                Counters::bump(&self.counters.refinements_succeeded);
                debug!("Refined {} to {}", letter, class);
                Some(class)
            }
            Detection::NotFound => {
                debug!("Refinement for {} found no known bus type", letter);
                None
            }
            Detection::Inconclusive(reason) => {
                debug!("Refinement for {} inconclusive: {}", letter, reason);
                None
            }
        }
    }

    async fn store_accurate(&self, letter: DriveLetter, class: StorageClass) {
        let volume_serial = self.classifier.probe().volume_serial(letter).await;
        self.accurate.write().await.insert(
            letter,
            ClassificationEntry {
                letter,
                class,
                volume_serial,
                is_override: false,
            },
        );
        self.persist().await;
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let entries: Vec<ClassificationEntry> = self
            .accurate
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_override)
            .cloned()
            .collect();

        let mut record = CacheRecord::default();
        for entry in entries {
            let serial = self
                .classifier
                .probe()
                .volume_serial(entry.letter)
                .await
                .or(entry.volume_serial);
            record.insert(entry.letter, entry.class, serial);
        }
        store.save(&record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::NoVolumes;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct CountingRefiner {
        answer: Detection<StorageClass>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl BusTypeRefiner for CountingRefiner {
        async fn refine(&self, _letter: DriveLetter) -> Detection<StorageClass> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    fn letter(c: char) -> DriveLetter {
        DriveLetter::new(c).unwrap()
    }

    #[tokio::test]
    async fn test_path_without_letter_is_hdd() {
        let cache = ClassificationCache::builder(Arc::new(NoVolumes)).build();
        assert_eq!(cache.get_type("/var/tmp/file").await, StorageClass::Hdd);
        assert_eq!(cache.get_type("").await, StorageClass::Hdd);
    }

    #[tokio::test]
    async fn test_unknown_letter_refines_once() {
        let refiner = Arc::new(CountingRefiner {
            answer: Detection::inconclusive("offline"),
            calls: AtomicUsize::new(0),
        });
        let cache = ClassificationCache::builder(Arc::new(NoVolumes))
            .refiner(refiner.clone())
            .build();

        assert_eq!(cache.get_type(r"Q:\a").await, StorageClass::Hdd);
        assert_eq!(cache.get_type(r"Q:\b").await, StorageClass::Hdd);
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 1);

        cache.invalidate_fast().await;
        cache.get_type(r"Q:\c").await;
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_successful_refinement_is_promoted_and_persisted() {
        let dir = TempDir::new().unwrap();
        let store = CacheFile::new(dir.path().join("cache.json"));
        let refiner = Arc::new(CountingRefiner {
            answer: Detection::Found(StorageClass::Nvme),
            calls: AtomicUsize::new(0),
        });
        let cache = ClassificationCache::builder(Arc::new(NoVolumes))
            .refiner(refiner.clone())
            .store(store.clone())
            .build();

        assert_eq!(cache.get_type(r"D:\x").await, StorageClass::Nvme);
        assert_eq!(cache.get_type(r"D:\y").await, StorageClass::Nvme);
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.accurate_hits, 1);
        assert_eq!(stats.refinements_succeeded, 1);

        let record = store.load().await;
        assert_eq!(record.classification.get("D").map(String::as_str), Some("nvme"));
    }

    #[tokio::test]
    async fn test_overrides_win() {
        let mut overrides = HashMap::new();
        overrides.insert(letter('R'), StorageClass::Ram);
        let cache = ClassificationCache::builder(Arc::new(NoVolumes))
            .overrides(overrides)
            .load()
            .await;

        assert_eq!(cache.get_type(r"R:\scratch").await, StorageClass::Ram);
        assert_eq!(cache.refresh_for_letter(letter('R'), true).await, StorageClass::Ram);
        assert!(cache.accurate_entries().await[0].is_override);
    }

    #[tokio::test]
    async fn test_overrides_are_not_persisted() {
        let dir = TempDir::new().unwrap();
        let store = CacheFile::new(dir.path().join("cache.json"));
        let mut overrides = HashMap::new();
        overrides.insert(letter('R'), StorageClass::Ram);
        let cache = ClassificationCache::builder(Arc::new(NoVolumes))
            .refiner(Arc::new(CountingRefiner {
                answer: Detection::Found(StorageClass::Ssd),
                calls: AtomicUsize::new(0),
            }))
            .store(store.clone())
            .overrides(overrides)
            .load()
            .await;

        cache.refresh_for_letter(letter('S'), false).await;
        let record = store.load().await;
        assert!(record.classification.contains_key("S"));
        assert!(!record.classification.contains_key("R"));
    }

    #[tokio::test]
    async fn test_unforced_refresh_keeps_accurate_entry() {
        let refiner = Arc::new(CountingRefiner {
            answer: Detection::Found(StorageClass::Usb),
            calls: AtomicUsize::new(0),
        });
        let cache = ClassificationCache::builder(Arc::new(NoVolumes))
            .refiner(refiner.clone())
            .build();

        assert_eq!(cache.refresh_for_letter(letter('G'), false).await, StorageClass::Usb);
        assert_eq!(cache.refresh_for_letter(letter('G'), false).await, StorageClass::Usb);
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 1);
        cache.refresh_for_letter(letter('G'), true).await;
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_letters_covers_each_letter() {
        let refiner = Arc::new(CountingRefiner {
            answer: Detection::Found(StorageClass::Usb),
            calls: AtomicUsize::new(0),
        });
        let cache = ClassificationCache::builder(Arc::new(NoVolumes))
            .refiner(refiner.clone())
            .build();

        let classes = cache
            .refresh_letters(&[letter('G'), letter('H'), letter('G')], false)
            .await;
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[&letter('H')], StorageClass::Usb);
        assert_eq!(refiner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.accurate_entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_for_path_without_letter() {
        let cache = ClassificationCache::builder(Arc::new(NoVolumes)).build();
        assert_eq!(cache.refresh_for_path("/mnt/data", true).await, None);
    }

    #[tokio::test]
    async fn test_refinement_timeout() {
        struct SlowRefiner;

        #[async_trait::async_trait]
        impl BusTypeRefiner for SlowRefiner {
            async fn refine(&self, _letter: DriveLetter) -> Detection<StorageClass> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Detection::Found(StorageClass::Nvme)
            }
        }

        let cache = ClassificationCache::builder(Arc::new(NoVolumes))
            .refiner(Arc::new(SlowRefiner))
            .config(ClassificationCacheConfig {
                refine_timeout: Duration::from_millis(20),
                max_concurrent_refinements: 1,
            })
            .build();
        assert_eq!(cache.get_type(r"C:\").await, StorageClass::Hdd);
        assert_eq!(cache.stats().refinements_succeeded, 0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = ClassificationCacheStats {
            lookups: 4,
            accurate_hits: 3,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(ClassificationCacheStats::default().hit_rate(), 0.0);
    }
}
