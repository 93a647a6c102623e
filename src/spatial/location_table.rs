use crate::spatial::distance::haversine_km;
use crate::spatial::error::LocationTableError;
use crate::types::location::{normalize_name, LatLon, Location};
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{debug, info};
use ordered_float::OrderedFloat;
use rstar::RTree;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const BINCODE_CACHE_FILE_NAME: &str = "locations.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// District coordinates of the Wonosobo regency, the table used when no other is given.
const WONOSOBO_DISTRICTS: &[(&str, f64, f64)] = &[
    ("WADASLINTANG", -7.4789, 109.9156),
    ("KALIBAWANG", -7.3567, 109.9234),
    ("KEJAJAR", -7.2833, 109.9167),
    ("GARUNG", -7.3667, 109.9833),
    ("LEKSONO", -7.3833, 109.9333),
    ("KALIWIRO", -7.4000, 109.9333),
    ("SAPURAN", -7.4167, 109.9500),
    ("KEPIL", -7.4333, 109.9500),
    ("KALIKAJAR", -7.3500, 109.9500),
    ("KERTEK", -7.3500, 110.0000),
    ("WONOSOBO", -7.3667, 110.0000),
    ("MOJOTENGAH", -7.3833, 110.0167),
    ("SELOMERTO", -7.4000, 109.9667),
    ("SUKOHARJO", -7.3333, 109.9667),
    ("WATUMALANG", -7.3833, 110.0333),
];

/// Static coordinate reference data, indexed by normalized name and by position.
#[derive(Debug, Clone)]
pub struct LocationTable {
    rtree: RTree<Location>,
    index: HashMap<String, Location>,
}

// Heap entry ordered by distance, then name, so the heap top is the worst kept candidate.
struct Candidate<'a> {
    distance_km: OrderedFloat<f64>,
    location: &'a Location,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Candidate<'_> {}
impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_km
            .cmp(&other.distance_km)
            .then_with(|| self.location.name.cmp(&other.location.name))
    }
}

impl Default for LocationTable {
    fn default() -> Self {
        Self::wonosobo()
    }
}

impl LocationTable {
    /// Builds a table from `locations`. Names are stored upper-case; a later entry
    /// with the same normalized name replaces an earlier one.
    pub fn new(locations: Vec<Location>) -> Self {
        let mut index = HashMap::with_capacity(locations.len());
        for location in locations {
            let key = location.key();
            index.insert(
                key.clone(),
                Location::new(key, location.latitude, location.longitude),
            );
        }
        let rtree = RTree::bulk_load(index.values().cloned().collect());
        Self { rtree, index }
    }

    /// The built-in table of Wonosobo districts.
    pub fn wonosobo() -> Self {
        Self::new(
            WONOSOBO_DISTRICTS
                .iter()
                .map(|&(name, lat, lon)| Location::new(name, lat, lon))
                .collect(),
        )
    }

    /// Loads the table from `locations.bin` in `cache_dir`, or writes the built-in
    /// table there when no cache file exists yet.
    pub async fn with_cache_folder(cache_dir: &Path) -> Result<Self, LocationTableError> {
        let cache_file = cache_dir.join(BINCODE_CACHE_FILE_NAME);

        if cache_file.exists() {
            let path_clone = cache_file.clone();
            let locations =
                tokio::task::spawn_blocking(move || Self::read_cache(&path_clone)).await??;
            debug!(
                "Loaded {} locations from cache {}",
                locations.len(),
                cache_file.display()
            );
            return Ok(Self::new(locations));
        }

        info!(
            "Location cache not found, seeding {} with the built-in table",
            cache_file.display()
        );
        let table = Self::wonosobo();
        table.write_cache(&cache_file).await?;
        Ok(table)
    }

    fn read_cache(cache_path: &Path) -> Result<Vec<Location>, LocationTableError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| LocationTableError::CacheRead(cache_path.to_path_buf(), e))?;
        let (locations, _) =
            bincode::serde::decode_from_slice::<Vec<Location>, _>(&bytes, BINCODE_CONFIG)
                .map_err(|e| {
                    LocationTableError::CacheDecode(cache_path.to_path_buf(), Box::new(e))
                })?;
        Ok(locations)
    }

    /// Serializes the table to `cache_path`. The file is written next to its final
    /// location and renamed into place, so readers never see a partial cache.
    pub async fn write_cache(&self, cache_path: &Path) -> Result<(), LocationTableError> {
        let mut locations: Vec<Location> = self.index.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        let cache_path = cache_path.to_path_buf();

        let written = tokio::task::spawn_blocking(move || {
            let bytes = bincode::serde::encode_to_vec(&locations, BINCODE_CONFIG)
                .map_err(|e| LocationTableError::CacheEncode(Box::new(e)))?;
            Self::persist_bytes(&cache_path, &bytes)?;
            Ok::<(PathBuf, usize), LocationTableError>((cache_path, bytes.len()))
        })
        .await??;

        debug!(
            "Wrote location cache ({} bytes) to {}",
            written.1,
            written.0.display()
        );
        Ok(())
    }

    fn persist_bytes(cache_path: &Path, bytes: &[u8]) -> Result<(), LocationTableError> {
        let to_write_error =
            |e: std::io::Error| LocationTableError::CacheWrite(cache_path.to_path_buf(), e);
        let dir = cache_path.parent().unwrap_or_else(|| Path::new("."));
        let mut file = NamedTempFile::new_in(dir).map_err(to_write_error)?;
        file.write_all(bytes).map_err(to_write_error)?;
        file.persist(cache_path).map_err(|e| to_write_error(e.error))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Location> {
        self.index.get(&normalize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.rtree.iter()
    }

    /// Returns up to `k` locations accepted by `filter`, nearest first by great-circle
    /// distance, ties broken by name.
    ///
    /// The R-tree walks in planar degree order, which is only close to haversine order,
    /// so every accepted location is scored.
    pub fn nearest<F>(&self, origin: LatLon, k: usize, filter: F) -> Vec<(&Location, f64)>
    where
        F: Fn(&Location) -> bool,
    {
        if k == 0 {
            return vec![];
        }

        let mut heap: BinaryHeap<Candidate<'_>> = BinaryHeap::with_capacity(k + 1);
        for location in self.rtree.nearest_neighbor_iter(&[origin.0, origin.1]) {
            if !filter(location) {
                continue;
            }
            heap.push(Candidate {
                distance_km: OrderedFloat(haversine_km(origin, location.coordinates())),
                location,
            });
            if heap.len() > k {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| (c.location, c.distance_km.into_inner()))
            .collect()
    }
}
