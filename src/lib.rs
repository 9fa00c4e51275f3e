#![forbid(unsafe_code)]

//! Fast hierarchical clustering of geographic points for interactive maps.
//!
//! A [`Supercluster`] is loaded once with GeoJSON point features. Loading projects the
//! points to spherical Mercator and clusters them zoom level by zoom level, from the
//! finest to the coarsest, keeping one static KD-tree per level. The loaded index then
//! answers bounding box and tile queries, and navigates the cluster hierarchy, without
//! ever being mutated again.
//!
//! ```
//! use supercluster_engine::{Options, Supercluster};
//!
//! let point = |lng: f64, lat: f64| geojson::Feature {
//!     bbox: None,
//!     geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![lng, lat]))),
//!     id: None,
//!     properties: None,
//!     foreign_members: None,
//! };
//!
//! let mut index = Supercluster::new(Options::default());
//! index.load(vec![point(4.90, 52.37), point(4.48, 51.92)]).unwrap();
//!
//! let clusters = index.get_clusters([-180.0, -85.0, 180.0, 85.0], 2.0).unwrap();
//!
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].point_count(), 2);
//! ```

mod error;
mod feature;
mod kdbush;
mod options;
pub mod projection;
pub mod region;

use std::collections::HashSet;
use std::time::Instant;

use geojson::{feature::Id, JsonObject, Value};
use kdbush::KDBush;
use projection::{lat_y, lng_x, normalize_bbox, project_bbox, x_lng, y_lat, BBox};

pub use error::{Result, SuperclusterError};
pub use feature::{
    abbreviate_count, ClusterFeature, Feature, PointFeature, Tile, TileFeature,
    TILE_FEATURE_POINT,
};
pub use options::{Options, MAX_SUPPORTED_ZOOM};
pub use region::{viewport_zoom, MapDimensions, Region};

/// Number of low bits of an encoded cluster id holding the origin zoom level
const ZOOM_BITS: usize = 5;

/// Longitude span at which region queries stop picking a zoom from the viewport
const WIDE_REGION_LONGITUDE_DELTA: f64 = 40.0;

/// An input point, kept with everything needed to return it unchanged.
#[derive(Clone, Debug)]
struct Leaf {
    /// Position of the feature in the input vector
    input_index: usize,

    lng: f64,
    lat: f64,

    id: Option<Id>,
    properties: Option<JsonObject>,
}

impl Leaf {
    /// Extract a leaf from a GeoJSON feature with a two-dimensional Point geometry.
    fn from_feature(input_index: usize, feature: geojson::Feature) -> Option<Self> {
        let (lng, lat) = match feature.geometry.as_ref().map(|geometry| &geometry.value) {
            Some(Value::Point(position)) if position.len() >= 2 => (position[0], position[1]),
            _ => return None,
        };

        if !lng.is_finite() || !lat.is_finite() {
            return None;
        }

        Some(Leaf {
            input_index,
            lng,
            lat,
            id: feature.id,
            properties: feature.properties,
        })
    }

    fn to_feature(&self, generate_id: bool) -> PointFeature {
        let id = match &self.id {
            None if generate_id => Some(Id::Number(self.input_index.into())),
            id => id.clone(),
        };

        PointFeature {
            id,
            coordinates: [self.lng, self.lat],
            properties: self.properties.clone(),
        }
    }
}

/// A point or cluster within one generation.
#[derive(Clone, Copy, Debug)]
struct Node {
    /// Projected coordinates
    x: f64,
    y: f64,

    /// Leaf index for points, encoded cluster id for clusters
    id: usize,

    /// Cluster id of the node this one was merged into at the next coarser zoom
    parent_id: Option<usize>,

    /// Number of input points represented by the node
    num_points: usize,
}

impl Node {
    fn is_cluster(&self) -> bool {
        self.num_points > 1
    }
}

/// The nodes visible at one zoom level, and their spatial index.
#[derive(Clone, Debug, Default)]
struct Generation {
    tree: KDBush,
    nodes: Vec<Node>,
}

impl Generation {
    fn new(nodes: Vec<Node>, node_size: usize) -> Self {
        Generation {
            tree: KDBush::new(nodes.iter().map(|node| [node.x, node.y]), node_size),
            nodes,
        }
    }
}

/// The immutable cluster hierarchy produced by loading.
#[derive(Clone, Debug)]
struct Hierarchy {
    leaves: Vec<Leaf>,

    /// Generations indexed by zoom; `max_zoom + 1` holds the unclustered points and
    /// levels below `min_zoom` stay empty.
    generations: Vec<Generation>,
}

#[derive(Clone, Debug, Default)]
enum State {
    #[default]
    Empty,
    Loaded(Hierarchy),
    Disposed,
}

/// A spatial clustering configuration and data structure
#[derive(Clone, Debug, Default)]
pub struct Supercluster {
    /// Configuration settings
    options: Options,

    state: State,
}

impl Supercluster {
    /// Create a new, empty index with the specified configuration settings.
    ///
    /// The options are validated when the points are loaded.
    pub fn new(options: Options) -> Self {
        Supercluster {
            options,
            state: State::Empty,
        }
    }

    /// Configuration settings of the index.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Whether points have been loaded and the index is not disposed.
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Loaded(_))
    }

    /// Load the input GeoJSON points, performing clustering at every zoom level.
    ///
    /// Features without a two-dimensional Point geometry are skipped. The index can
    /// only be loaded once.
    ///
    /// # Errors
    ///
    /// [`SuperclusterError::AlreadyLoaded`] on a second call,
    /// [`SuperclusterError::Disposed`] after [`dispose`](Self::dispose), and
    /// [`SuperclusterError::InvalidOptions`] when the options fail validation.
    pub fn load(&mut self, points: Vec<geojson::Feature>) -> Result<&mut Self> {
        match self.state {
            State::Empty => {}
            State::Loaded(_) => return Err(SuperclusterError::AlreadyLoaded),
            State::Disposed => return Err(SuperclusterError::Disposed),
        }

        self.options.validate()?;

        let started = Instant::now();
        let min_zoom = self.options.min_zoom as usize;
        let max_zoom = self.options.max_zoom as usize;
        let input_len = points.len();

        let leaves: Vec<Leaf> = points
            .into_iter()
            .enumerate()
            .filter_map(|(i, feature)| {
                let leaf = Leaf::from_feature(i, feature);

                if leaf.is_none() {
                    log::warn!("Skipping feature {i}: geometry is not a two-dimensional Point");
                }

                leaf
            })
            .collect();

        let mut generations = vec![Generation::default(); max_zoom + 2];

        generations[max_zoom + 1] = Generation::new(
            leaves
                .iter()
                .enumerate()
                .map(|(i, leaf)| Node {
                    x: lng_x(leaf.lng),
                    y: lat_y(leaf.lat),
                    id: i,
                    parent_id: None,
                    num_points: 1,
                })
                .collect(),
            self.options.node_size,
        );

        log::debug!(
            "Indexed {} of {} input features in {:?}",
            leaves.len(),
            input_len,
            started.elapsed()
        );

        // Cluster points on max zoom, then cluster the results on previous zoom, etc.;
        // results in a cluster hierarchy across zoom levels
        for zoom in (min_zoom..=max_zoom).rev() {
            let level_started = Instant::now();
            let nodes = self.cluster(&mut generations[zoom + 1], zoom, leaves.len());

            log::debug!(
                "Zoom {zoom}: {} nodes in {:?}",
                nodes.len(),
                level_started.elapsed()
            );

            generations[zoom] = Generation::new(nodes, self.options.node_size);
        }

        log::debug!("Loaded index in {:?}", started.elapsed());

        self.state = State::Loaded(Hierarchy {
            leaves,
            generations,
        });

        Ok(self)
    }

    /// Release the loaded hierarchy. Every later call fails with
    /// [`SuperclusterError::Disposed`].
    pub fn dispose(&mut self) {
        if matches!(self.state, State::Loaded(_)) {
            log::debug!("Disposing loaded index");
        }

        self.state = State::Disposed;
    }

    /// Retrieve clustered features within the specified bounding box and zoom level.
    ///
    /// # Arguments
    ///
    /// - `bbox`: The bounding box `[west, south, east, north]`. Longitudes wrap, so a
    ///   box crossing the antimeridian may have `west > east`; latitudes are clamped.
    /// - `zoom`: The zoom level, floored and clamped to `[min_zoom, max_zoom + 1]`.
    ///
    /// A box with NaN components yields no features.
    pub fn get_clusters(&self, bbox: BBox, zoom: f64) -> Result<Vec<Feature>> {
        let hierarchy = self.hierarchy()?;
        let generation = &hierarchy.generations[self.limit_zoom(zoom)];
        let boxes = normalize_bbox(bbox);

        if boxes.is_empty() {
            log::debug!("Ignoring bounding box with undefined coordinates: {bbox:?}");
        }

        let mut seen = HashSet::new();
        let mut clusters = Vec::new();

        for geo_box in boxes {
            let [min_x, min_y, max_x, max_y] = project_bbox(geo_box);

            for id in generation.tree.range(min_x, min_y, max_x, max_y) {
                if seen.insert(id) {
                    clusters.push(hierarchy.node_to_feature(&generation.nodes[id], &self.options));
                }
            }
        }

        Ok(clusters)
    }

    /// Retrieve clustered features visible in a map viewport.
    ///
    /// Wide regions (a longitude delta of 40 degrees or more) are queried at
    /// `min_zoom`; otherwise the zoom is the highest at which the region fits in
    /// `dimensions`.
    pub fn get_clusters_from_region(
        &self,
        region: &Region,
        dimensions: MapDimensions,
    ) -> Result<Vec<Feature>> {
        self.hierarchy()?;

        let bbox = region.to_bbox();
        let zoom = if region.longitude_delta >= WIDE_REGION_LONGITUDE_DELTA {
            self.options.min_zoom
        } else {
            viewport_zoom(
                bbox,
                dimensions,
                self.options.min_zoom,
                self.options.max_zoom.saturating_add(1),
                self.options.extent,
            )
        };

        self.get_clusters(bbox, zoom as f64)
    }

    /// Retrieve the features of the tile `x`, `y` at zoom `z`, in tile-local pixels.
    ///
    /// Features within the cluster radius outside the tile are included, so markers
    /// straddling the tile border render on both sides. Tiles in the first and last
    /// columns also pick up features wrapped around the antimeridian.
    pub fn get_tile(&self, z: u8, x: u32, y: u32) -> Result<Tile> {
        let hierarchy = self.hierarchy()?;
        let generation = &hierarchy.generations[self.limit_zoom(z as f64)];
        let z2 = 2f64.powi(z as i32);
        let p = self.options.radius / self.options.extent;
        let (x, y) = (x as f64, y as f64);
        let top = (y - p) / z2;
        let bottom = (y + 1.0 + p) / z2;

        let mut tile = Tile::default();

        let ids = generation
            .tree
            .range((x - p) / z2, top, (x + 1.0 + p) / z2, bottom);

        self.add_tile_features(hierarchy, generation, &ids, x, y, z2, &mut tile);

        if x == 0.0 {
            let ids = generation.tree.range(1.0 - p / z2, top, 1.0, bottom);

            self.add_tile_features(hierarchy, generation, &ids, z2, y, z2, &mut tile);
        }

        if x == z2 - 1.0 {
            let ids = generation.tree.range(0.0, top, p / z2, bottom);

            self.add_tile_features(hierarchy, generation, &ids, -1.0, y, z2, &mut tile);
        }

        Ok(tile)
    }

    /// Retrieve the children of a cluster on the next zoom level.
    ///
    /// # Errors
    ///
    /// [`SuperclusterError::ClusterNotFound`] if `cluster_id` is not a cluster of
    /// this index.
    pub fn get_children(&self, cluster_id: usize) -> Result<Vec<Feature>> {
        let hierarchy = self.hierarchy()?;

        Ok(hierarchy
            .child_nodes(&self.options, cluster_id)?
            .into_iter()
            .map(|node| hierarchy.node_to_feature(node, &self.options))
            .collect())
    }

    /// Retrieve the input points of a cluster, depth first in children order.
    ///
    /// # Arguments
    ///
    /// - `cluster_id`: The unique identifier of the cluster.
    /// - `limit`: The maximum number of points to return; `usize::MAX` for all.
    /// - `offset`: The number of points to skip.
    ///
    /// # Errors
    ///
    /// [`SuperclusterError::ClusterNotFound`] if `cluster_id` is not a cluster of
    /// this index.
    pub fn get_leaves(&self, cluster_id: usize, limit: usize, offset: usize) -> Result<Vec<Feature>> {
        let hierarchy = self.hierarchy()?;
        let mut leaves = Vec::new();

        hierarchy.append_leaves(&self.options, &mut leaves, cluster_id, limit, offset, 0)?;

        Ok(leaves
            .into_iter()
            .map(|i| Feature::Point(hierarchy.leaves[i].to_feature(self.options.generate_id)))
            .collect())
    }

    /// Determine the zoom level at which a cluster splits into several children.
    ///
    /// Clusters that only ever contain one cluster child are followed downwards. The
    /// result never exceeds `max_zoom + 1`, the level of the unclustered points.
    pub fn get_cluster_expansion_zoom(&self, cluster_id: usize) -> Result<u8> {
        let hierarchy = self.hierarchy()?;
        let mut children = hierarchy.child_nodes(&self.options, cluster_id)?;
        let mut expansion_zoom = hierarchy.origin_zoom(cluster_id);

        while let [only] = children.as_slice() {
            if !only.is_cluster() || expansion_zoom > self.options.max_zoom as usize {
                break;
            }

            let next = only.id;

            children = hierarchy.child_nodes(&self.options, next)?;
            expansion_zoom += 1;
        }

        Ok(expansion_zoom as u8)
    }

    /// Region enclosing the members a cluster breaks into, for animating the map
    /// towards the expanded cluster.
    ///
    /// Clusters that only contain one cluster child are followed downwards until at
    /// least two members, or a single point, are found.
    pub fn get_cluster_expansion_region(&self, cluster_id: usize) -> Result<Region> {
        let hierarchy = self.hierarchy()?;
        let mut members = hierarchy.child_nodes(&self.options, cluster_id)?;

        while let [only] = members.as_slice() {
            if !only.is_cluster() {
                break;
            }

            let next = only.id;

            members = hierarchy.child_nodes(&self.options, next)?;
        }

        Region::enclosing(members.iter().map(|node| hierarchy.node_position(node)))
            .ok_or(SuperclusterError::ClusterNotFound(cluster_id))
    }

    fn hierarchy(&self) -> Result<&Hierarchy> {
        match &self.state {
            State::Loaded(hierarchy) => Ok(hierarchy),
            State::Empty => Err(SuperclusterError::NotLoaded),
            State::Disposed => Err(SuperclusterError::Disposed),
        }
    }

    /// Map a requested zoom to a generation index within `[min_zoom, max_zoom + 1]`.
    fn limit_zoom(&self, zoom: f64) -> usize {
        let min_zoom = self.options.min_zoom as f64;
        let max_zoom = self.options.max_zoom as f64 + 1.0;

        if zoom.is_nan() {
            return min_zoom as usize;
        }

        zoom.floor().clamp(min_zoom, max_zoom) as usize
    }

    /// Cluster the nodes of the generation above `zoom`, marking the parents of the
    /// merged nodes, and return the nodes of the generation at `zoom`.
    ///
    /// Nodes are swept in index order and each unvisited node claims every unvisited
    /// neighbour within the zoom's radius, so the first node seen leads its cluster.
    fn cluster(&self, finer: &mut Generation, zoom: usize, num_leaves: usize) -> Vec<Node> {
        let r = self.options.radius_at(zoom as i32);
        let Generation { tree, nodes } = finer;
        let mut visited = vec![false; nodes.len()];
        let mut next = Vec::new();

        for i in 0..nodes.len() {
            // If we've already visited the point at this zoom level, skip it
            if visited[i] {
                continue;
            }

            visited[i] = true;

            let origin = nodes[i];
            let neighbor_ids = tree.within(origin.x, origin.y, r);

            // Count the number of points in a potential cluster
            let num_points = origin.num_points
                + neighbor_ids
                    .iter()
                    .filter(|&&id| !visited[id])
                    .map(|&id| nodes[id].num_points)
                    .sum::<usize>();

            if num_points > origin.num_points && num_points >= self.options.min_points {
                let id = encode_cluster_id(i, zoom, num_leaves);
                let mut wx = origin.x * origin.num_points as f64;
                let mut wy = origin.y * origin.num_points as f64;

                for neighbor_id in neighbor_ids {
                    if visited[neighbor_id] {
                        continue;
                    }

                    visited[neighbor_id] = true;

                    let neighbor = &mut nodes[neighbor_id];

                    // Accumulate coordinates for calculating weighted center
                    wx += neighbor.x * neighbor.num_points as f64;
                    wy += neighbor.y * neighbor.num_points as f64;

                    neighbor.parent_id = Some(id);
                }

                nodes[i].parent_id = Some(id);

                next.push(Node {
                    x: wx / num_points as f64,
                    y: wy / num_points as f64,
                    id,
                    parent_id: None,
                    num_points,
                });
            } else {
                next.push(Node { parent_id: None, ..origin });

                // Too few to cluster; the neighbours stay unclustered at this zoom too
                if num_points > origin.num_points {
                    for neighbor_id in neighbor_ids {
                        if visited[neighbor_id] {
                            continue;
                        }

                        visited[neighbor_id] = true;

                        next.push(Node {
                            parent_id: None,
                            ..nodes[neighbor_id]
                        });
                    }
                }
            }
        }

        next
    }

    /// Populate a tile with features based on the specified node ids and tile position.
    ///
    /// `x` may be one column outside `0..z2` to render features wrapped around the
    /// antimeridian.
    #[allow(clippy::too_many_arguments)]
    fn add_tile_features(
        &self,
        hierarchy: &Hierarchy,
        generation: &Generation,
        ids: &[usize],
        x: f64,
        y: f64,
        z2: f64,
        tile: &mut Tile,
    ) {
        let extent = self.options.extent;

        for &i in ids {
            let node = &generation.nodes[i];

            let (px, py, tags, id) = if node.is_cluster() {
                let cluster = cluster_feature(node);

                (
                    node.x,
                    node.y,
                    cluster.properties(),
                    Some(Id::Number(node.id.into())),
                )
            } else {
                // Unclustered points are rendered from their original coordinates
                let leaf = &hierarchy.leaves[node.id];
                let point = leaf.to_feature(self.options.generate_id);

                (
                    lng_x(leaf.lng),
                    lat_y(leaf.lat),
                    point.properties.unwrap_or_default(),
                    point.id,
                )
            };

            tile.features.push(TileFeature {
                r#type: TILE_FEATURE_POINT,
                geometry: vec![[
                    (extent * (px * z2 - x)).round() as i64,
                    (extent * (py * z2 - y)).round() as i64,
                ]],
                tags,
                id,
            });
        }
    }
}

impl Hierarchy {
    /// Split a cluster id into the zoom level and index of the node the cluster
    /// originated from, or `None` if the id belongs to a leaf.
    fn decode_cluster_id(&self, cluster_id: usize) -> Option<(usize, usize)> {
        let encoded = cluster_id.checked_sub(self.leaves.len())?;

        Some((encoded % (1 << ZOOM_BITS), encoded >> ZOOM_BITS))
    }

    /// Zoom level holding the children of a cluster (the cluster's own zoom + 1).
    fn origin_zoom(&self, cluster_id: usize) -> usize {
        self.decode_cluster_id(cluster_id)
            .map_or(0, |(origin_zoom, _)| origin_zoom)
    }

    /// Nodes merged into `cluster_id`, in KD-tree order.
    fn child_nodes(&self, options: &Options, cluster_id: usize) -> Result<Vec<&Node>> {
        let not_found = || SuperclusterError::ClusterNotFound(cluster_id);
        let (origin_zoom, origin_index) = self.decode_cluster_id(cluster_id).ok_or_else(not_found)?;
        let generation = self.generations.get(origin_zoom).ok_or_else(not_found)?;
        let origin = generation.nodes.get(origin_index).ok_or_else(not_found)?;
        let r = options.radius_at(origin_zoom as i32 - 1);

        let children: Vec<&Node> = generation
            .tree
            .within(origin.x, origin.y, r)
            .into_iter()
            .map(|id| &generation.nodes[id])
            .filter(|node| node.parent_id == Some(cluster_id))
            .collect();

        if children.is_empty() {
            return Err(not_found());
        }

        Ok(children)
    }

    /// Collect leaf indices of `cluster_id` into `result`, skipping the first
    /// `offset` leaves. Returns the updated count of skipped leaves.
    fn append_leaves(
        &self,
        options: &Options,
        result: &mut Vec<usize>,
        cluster_id: usize,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Result<usize> {
        for child in self.child_nodes(options, cluster_id)? {
            if result.len() >= limit {
                break;
            }

            if child.is_cluster() {
                if skipped + child.num_points <= offset {
                    // Skip the whole cluster
                    skipped += child.num_points;
                } else {
                    skipped = self.append_leaves(options, result, child.id, limit, offset, skipped)?;
                }
            } else if skipped < offset {
                skipped += 1;
            } else {
                result.push(child.id);
            }
        }

        Ok(skipped)
    }

    fn node_to_feature(&self, node: &Node, options: &Options) -> Feature {
        if node.is_cluster() {
            Feature::Cluster(cluster_feature(node))
        } else {
            Feature::Point(self.leaves[node.id].to_feature(options.generate_id))
        }
    }

    /// Longitude and latitude of a node: original coordinates for points.
    fn node_position(&self, node: &Node) -> [f64; 2] {
        if node.is_cluster() {
            [x_lng(node.x), y_lat(node.y)]
        } else {
            let leaf = &self.leaves[node.id];

            [leaf.lng, leaf.lat]
        }
    }
}

/// Encode the index and zoom of the node a cluster originated from, offset by the
/// number of leaves so that cluster ids never collide with leaf indices.
fn encode_cluster_id(origin_index: usize, zoom: usize, num_leaves: usize) -> usize {
    ((origin_index << ZOOM_BITS) + (zoom + 1)) + num_leaves
}

fn cluster_feature(node: &Node) -> ClusterFeature {
    ClusterFeature {
        cluster_id: node.id,
        point_count: node.num_points,
        point_count_abbreviated: abbreviate_count(node.num_points),
        coordinates: [x_lng(node.x), y_lat(node.y)],
    }
}
