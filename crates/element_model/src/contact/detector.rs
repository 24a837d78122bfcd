//! Contact detection pass over a whole model
//!
//! Broad phase: an OBB hierarchy over the model-space geometry of every
//! element, inflated by the tolerance, optionally pruned by centroid
//! proximity. Every pair that already carries a contact is tested again.
//!
//! Narrow phase: [`NarrowPhase::contact`] per candidate pair. Results are
//! collected first and written to the interaction graph afterwards, so a
//! strict pass that fails leaves the graph untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::{BvhConfig, ContactSettings};
use crate::elements::{ElementGeometry, ElementId};
use crate::error::ModelResult;
use crate::foundation::math::Point3;
use crate::geometry::Polyhedron;
use crate::model::{Contact, ContactKind, ElementPair, Model};
use crate::spatial::{Bvh, KdTree, VolumeKind};

use super::narrow_phase::{NarrowPhase, CONTACT_SLACK};

/// Outcome of one contact detection pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactReport {
    /// Pairs that reached the narrow phase, forced pairs included
    pub candidates: usize,
    /// Pairs the narrow phase finished on
    pub tested: usize,
    /// New contacts written to the graph
    pub added: usize,
    /// Existing contacts replaced in place
    pub updated: usize,
    /// Existing contacts removed because the pair no longer touches
    pub removed: usize,
    /// Pairs skipped after a geometry failure, with the reason
    pub skipped: Vec<(ElementPair, String)>,
    /// Elements left out because their model geometry failed to resolve
    pub unresolved: Vec<(ElementId, String)>,
}

impl fmt::Display for ContactReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} candidates, {} tested, {} added, {} updated, {} removed, {} skipped, {} unresolved",
            self.candidates,
            self.tested,
            self.added,
            self.updated,
            self.removed,
            self.skipped.len(),
            self.unresolved.len()
        )
    }
}

/// Broad- and narrow-phase contact detection
#[derive(Debug, Clone, Default)]
pub struct ContactDetector {
    settings: ContactSettings,
}

impl ContactDetector {
    /// Create a detector with the given settings
    pub fn new(settings: ContactSettings) -> Self {
        Self { settings }
    }

    /// Settings used by this detector
    pub fn settings(&self) -> &ContactSettings {
        &self.settings
    }

    /// Candidate index pairs over model-space geometries
    ///
    /// Pairs come from the OBB hierarchy over the geometries inflated by the
    /// tolerance, then filtered by the optional centroid proximity limits.
    pub fn broad_phase(&self, geometries: &[Polyhedron]) -> ModelResult<BTreeSet<(usize, usize)>> {
        let margin = self.settings.tolerance + CONTACT_SLACK + self.settings.bvh.inflate;
        let volumes = geometries
            .iter()
            .map(|geometry| geometry.compute_obb(margin))
            .collect::<ModelResult<Vec<_>>>()?;
        let config = BvhConfig {
            volume_kind: VolumeKind::Obb,
            ..self.settings.bvh.clone()
        };
        let bvh = Bvh::from_volumes(volumes, &config)?;
        let mut pairs: BTreeSet<(usize, usize)> =
            bvh.find_candidate_pairs().into_iter().map(|p| (p.0, p.1)).collect();

        if self.settings.max_neighbours.is_some() || self.settings.max_distance.is_some() {
            let centroids: Vec<Point3> = geometries
                .iter()
                .map(|g| g.centroid().unwrap_or_else(Point3::origin))
                .collect();
            let before = pairs.len();
            pairs = self.prune(&centroids, pairs);
            log::debug!("Proximity pruning kept {} of {} candidate pairs", pairs.len(), before);
        }
        Ok(pairs)
    }

    fn prune(&self, centroids: &[Point3], pairs: BTreeSet<(usize, usize)>) -> BTreeSet<(usize, usize)> {
        let kdtree = KdTree::build(centroids);
        let near = |i: usize| -> Option<BTreeSet<usize>> {
            let k = self.settings.max_neighbours?;
            let query = kdtree.point(i)?;
            Some(
                kdtree
                    .nearest_k(query, k + 1)
                    .into_iter()
                    .filter(|&j| j != i)
                    .take(k)
                    .collect(),
            )
        };
        let neighbours: Vec<Option<BTreeSet<usize>>> = (0..centroids.len()).map(near).collect();
        let within: Vec<Option<BTreeSet<usize>>> = (0..centroids.len())
            .map(|i| -> Option<BTreeSet<usize>> {
                let distance = self.settings.max_distance?;
                Some(kdtree.radius(&centroids[i], distance).into_iter().collect())
            })
            .collect();

        pairs
            .into_iter()
            .filter(|&(i, j)| {
                let close = within[i].as_ref().map_or(true, |set| set.contains(&j));
                let neighbouring = match (&neighbours[i], &neighbours[j]) {
                    (Some(ni), Some(nj)) => ni.contains(&j) || nj.contains(&i),
                    _ => true,
                };
                close && neighbouring
            })
            .collect()
    }

    /// Detect contacts and write them into the model's interaction graph
    ///
    /// New contacts are added, touching pairs that already had a contact are
    /// updated in place (keeping their contact kind), and pairs that had a
    /// contact but no longer touch lose it. In lenient mode an element whose
    /// model geometry fails to resolve is left out, and a pair whose narrow
    /// phase fails is logged and skipped; in strict mode the first failure is
    /// returned and the graph is left unchanged.
    pub fn run(&self, model: &mut Model) -> ModelResult<ContactReport> {
        self.settings.validate()?;

        let mut ids: Vec<ElementId> = Vec::new();
        let mut geometries: Vec<Polyhedron> = Vec::new();
        let mut unresolved: BTreeMap<ElementId, String> = BTreeMap::new();
        for id in model.element_ids() {
            match model.compute_model_geometry(id) {
                Ok(geometry) => {
                    ids.push(id);
                    geometries.push(geometry);
                }
                Err(error) if self.settings.strict => {
                    log::warn!("Contact detection aborted at element {}: {}", id, error);
                    return Err(error);
                }
                Err(error) => {
                    log::warn!("Leaving element {} out of the contact pass: {}", id, error);
                    unresolved.insert(id, error.to_string());
                }
            }
        }
        let index: BTreeMap<ElementId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        // Phase 1: Broad-phase over the current element set
        let mut candidates: BTreeSet<ElementPair> = self
            .broad_phase(&geometries)?
            .into_iter()
            .map(|(i, j)| ElementPair::new(ids[i], ids[j]))
            .collect();
        let existing: BTreeMap<ElementPair, ContactKind> = model
            .contacts()
            .map(|contact| (ElementPair::new(contact.a, contact.b), contact.kind))
            .collect();
        candidates.extend(existing.keys().copied());

        let mut report = ContactReport {
            candidates: candidates.len(),
            ..ContactReport::default()
        };

        // Phase 2: Narrow-phase per candidate pair
        let narrow = NarrowPhase::new(&self.settings);
        let mut results: Vec<(ElementPair, Option<Contact>)> = Vec::with_capacity(candidates.len());
        for pair in candidates {
            if let Some(reason) = unresolved.get(&pair.0).or_else(|| unresolved.get(&pair.1)) {
                log::warn!("Skipping contact pair {} - {}: {}", pair.0, pair.1, reason);
                report.skipped.push((pair, reason.clone()));
                continue;
            }
            let (Some(&i), Some(&j)) = (index.get(&pair.0), index.get(&pair.1)) else {
                continue;
            };
            match narrow.contact(pair.0, &geometries[i], pair.1, &geometries[j]) {
                Ok(contact) => {
                    report.tested += 1;
                    results.push((pair, contact));
                }
                Err(error) if self.settings.strict => {
                    log::warn!("Contact detection aborted at {} - {}: {}", pair.0, pair.1, error);
                    return Err(error);
                }
                Err(error) => {
                    log::warn!("Skipping contact pair {} - {}: {}", pair.0, pair.1, error);
                    report.skipped.push((pair, error.to_string()));
                }
            }
        }

        let graph = model.graph_mut();
        for (pair, contact) in results {
            match contact {
                Some(mut contact) => {
                    if let Some(kind) = existing.get(&pair) {
                        contact.kind = *kind;
                    }
                    if graph.set_contact(contact)? {
                        report.added += 1;
                    } else {
                        report.updated += 1;
                    }
                }
                None => {
                    if graph.clear_contact(pair.0, pair.1).is_some() {
                        report.removed += 1;
                    }
                }
            }
        }

        report.unresolved = unresolved.into_iter().collect();
        log::info!("Contact pass over {} elements: {}", ids.len(), report);
        Ok(report)
    }
}
