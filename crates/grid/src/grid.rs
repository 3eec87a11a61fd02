use std::collections::HashSet;

use glam::Vec2;
use worldtrack_common::{EntityId, EntityType, Rect};

use crate::config::GridConfig;

/// Column/row of a sector in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorCoord {
    pub x: i32,
    pub y: i32,
}

impl SectorCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// How an entity belongs to a sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    /// The sector is the entity's home cell.
    Primary,
    /// The entity's bounds extend into the sector but it is not home here.
    Overlap,
}

impl Membership {
    fn slot(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Overlap => 1,
        }
    }
}

/// One grid cell: a primary and an overlap list per entity type.
#[derive(Debug, Clone, Default)]
pub struct Sector {
    lists: [[Vec<EntityId>; 2]; 5],
}

impl Sector {
    /// Members of the given type and membership kind.
    pub fn list(&self, kind: EntityType, membership: Membership) -> &[EntityId] {
        &self.lists[kind.slot()][membership.slot()]
    }

    pub fn contains(&self, id: EntityId, membership: Membership) -> bool {
        self.list(id.kind, membership).contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().flatten().all(Vec::is_empty)
    }

    fn list_mut(&mut self, kind: EntityType, membership: Membership) -> &mut Vec<EntityId> {
        &mut self.lists[kind.slot()][membership.slot()]
    }

    fn insert(&mut self, id: EntityId, membership: Membership) {
        self.list_mut(id.kind, membership).push(id);
    }

    fn remove(&mut self, id: EntityId, membership: Membership) -> bool {
        let list = self.list_mut(id.kind, membership);
        match list.iter().position(|e| *e == id) {
            Some(pos) => {
                list.swap_remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Inclusive sector range covered by a rectangle, plus its home sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorSpan {
    pub start: SectorCoord,
    pub end: SectorCoord,
    pub mid: SectorCoord,
}

impl SectorSpan {
    /// Every sector in the span with the membership an entity has there.
    pub fn cells(self) -> impl Iterator<Item = (SectorCoord, Membership)> {
        let span = self;
        (span.start.y..=span.end.y).flat_map(move |y| {
            (span.start.x..=span.end.x).map(move |x| {
                let coord = SectorCoord::new(x, y);
                let membership = if coord == span.mid {
                    Membership::Primary
                } else {
                    Membership::Overlap
                };
                (coord, membership)
            })
        })
    }
}

/// Fixed-size sector grid over the playable world.
///
/// Entities are inserted by bounding rectangle. The sector containing the
/// rectangle's midpoint holds the entity in its primary list; every other
/// spanned sector holds it in its overlap list.
pub struct SectorGrid {
    config: GridConfig,
    sector_size: Vec2,
    sectors: Vec<Sector>,
}

impl SectorGrid {
    pub fn new(config: GridConfig) -> Self {
        assert!(config.is_valid(), "grid config must have positive extent");
        Self {
            sector_size: config.sector_size(),
            sectors: vec![Sector::default(); config.sector_count()],
            config,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Sector column of a world X coordinate. May lie outside the grid.
    pub fn sector_index_x(&self, x: f32) -> i32 {
        ((x - self.config.world_min.x) / self.sector_size.x).floor() as i32
    }

    /// Sector row of a world Y coordinate. May lie outside the grid.
    pub fn sector_index_y(&self, y: f32) -> i32 {
        ((y - self.config.world_min.y) / self.sector_size.y).floor() as i32
    }

    pub fn sector_of(&self, p: Vec2) -> SectorCoord {
        SectorCoord::new(self.sector_index_x(p.x), self.sector_index_y(p.y))
    }

    /// Sector range a rectangle covers. No bounds check.
    pub fn span(&self, rect: &Rect) -> SectorSpan {
        SectorSpan {
            start: self.sector_of(rect.min),
            end: self.sector_of(rect.max),
            mid: self.sector_of(rect.centre()),
        }
    }

    pub fn in_bounds(&self, coord: SectorCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.config.sectors_x
            && (coord.y as usize) < self.config.sectors_y
    }

    pub fn sector(&self, coord: SectorCoord) -> Option<&Sector> {
        if !self.in_bounds(coord) {
            return None;
        }
        Some(&self.sectors[self.offset(coord)])
    }

    /// Insert `id` into every sector its rectangle spans.
    ///
    /// # Panics
    /// If the rectangle maps outside the grid.
    pub fn insert(&mut self, id: EntityId, rect: &Rect) {
        let span = self.checked_span(id, rect);
        for (coord, membership) in span.cells() {
            let offset = self.offset(coord);
            self.sectors[offset].insert(id, membership);
        }
        tracing::trace!(%id, ?span, "inserted into grid");
    }

    /// Remove `id` from the sectors `rect` spans. Returns how many
    /// memberships were actually removed; fewer than the span size means the
    /// entity moved without being re-inserted.
    ///
    /// # Panics
    /// If the rectangle maps outside the grid.
    pub fn remove(&mut self, id: EntityId, rect: &Rect) -> usize {
        let span = self.checked_span(id, rect);
        let mut removed = 0;
        let mut expected = 0;
        for (coord, membership) in span.cells() {
            let offset = self.offset(coord);
            expected += 1;
            if self.sectors[offset].remove(id, membership) {
                removed += 1;
            }
        }
        if removed != expected {
            tracing::debug!(%id, removed, expected, "grid removal missed sectors");
        }
        removed
    }

    /// All entities of `kind` whose bounds may reach into `rect`, primary and
    /// overlap, each reported once. Sectors outside the grid are skipped.
    pub fn entities_in_rect(&self, rect: &Rect, kind: EntityType) -> HashSet<EntityId> {
        let mut result = HashSet::new();
        for sector in self.sectors_in(rect) {
            result.extend(sector.list(kind, Membership::Primary));
            result.extend(sector.list(kind, Membership::Overlap));
        }
        result
    }

    /// Entities of `kind` whose home sector lies inside `rect`'s span. No
    /// entity appears twice, so no deduplication is needed.
    pub fn primary_in_rect(&self, rect: &Rect, kind: EntityType) -> Vec<EntityId> {
        self.sectors_in(rect)
            .flat_map(|s| s.list(kind, Membership::Primary).iter().copied())
            .collect()
    }

    /// Count of (primary, overlap) memberships of `id` across the whole grid.
    pub fn membership_counts(&self, id: EntityId) -> (usize, usize) {
        self.sectors.iter().fold((0, 0), |(p, o), s| {
            (
                p + usize::from(s.contains(id, Membership::Primary)),
                o + usize::from(s.contains(id, Membership::Overlap)),
            )
        })
    }

    /// Number of sectors with at least one member.
    pub fn occupied_sectors(&self) -> usize {
        self.sectors.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn clear(&mut self) {
        for sector in &mut self.sectors {
            *sector = Sector::default();
        }
    }

    /// Whether every sector `rect` touches lies inside the grid, i.e.
    /// whether [`SectorGrid::insert`] would accept it.
    pub fn contains_rect(&self, rect: &Rect) -> bool {
        let span = self.span(rect);
        self.in_bounds(span.start) && self.in_bounds(span.end)
    }

    fn checked_span(&self, id: EntityId, rect: &Rect) -> SectorSpan {
        let span = self.span(rect);
        assert!(
            self.contains_rect(rect),
            "{id} bounds {rect:?} map to sectors {:?}..{:?} outside the grid",
            span.start,
            span.end
        );
        span
    }

    fn sectors_in(&self, rect: &Rect) -> impl Iterator<Item = &Sector> + '_ {
        let span = self.span(rect);
        let max_x = self.config.sectors_x as i32 - 1;
        let max_y = self.config.sectors_y as i32 - 1;
        let (x0, x1) = (span.start.x.max(0), span.end.x.min(max_x));
        let (y0, y1) = (span.start.y.max(0), span.end.y.min(max_y));
        (y0..=y1).flat_map(move |y| {
            (x0..=x1).map(move |x| &self.sectors[self.offset(SectorCoord::new(x, y))])
        })
    }

    fn offset(&self, coord: SectorCoord) -> usize {
        coord.y as usize * self.config.sectors_x + coord.x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldtrack_common::PoolHandle;

    /// 8x8 sectors of 10 units over [0, 80).
    fn small_grid() -> SectorGrid {
        SectorGrid::new(GridConfig {
            sectors_x: 8,
            sectors_y: 8,
            world_min: Vec2::ZERO,
            world_max: Vec2::splat(80.0),
        })
    }

    fn id(kind: EntityType, index: u32) -> EntityId {
        EntityId::new(kind, PoolHandle::new(index, 0))
    }

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        Rect::new(Vec2::new(x0, y0), Vec2::new(x1, y1))
    }

    #[test]
    fn sector_index_floors() {
        let grid = SectorGrid::new(GridConfig::default());
        assert_eq!(grid.sector_index_x(-2000.0), 0);
        assert_eq!(grid.sector_index_x(-1960.1), 0);
        assert_eq!(grid.sector_index_x(-1960.0), 1);
        assert_eq!(grid.sector_index_x(-2000.5), -1);
        assert_eq!(grid.sector_index_y(1999.9), 99);
    }

    #[test]
    fn single_sector_vehicle_is_primary_only() {
        let mut grid = small_grid();
        let v = id(EntityType::Vehicle, 0);
        grid.insert(v, &rect(21.0, 31.0, 24.0, 35.0));

        let home = grid.sector(SectorCoord::new(2, 3)).unwrap();
        assert_eq!(home.list(EntityType::Vehicle, Membership::Primary), &[v]);
        assert!(home.list(EntityType::Vehicle, Membership::Overlap).is_empty());
        assert_eq!(grid.membership_counts(v), (1, 0));
    }

    #[test]
    fn spanning_building_has_one_primary_and_overlaps() {
        let mut grid = small_grid();
        let b = id(EntityType::Building, 4);
        // x 15..35 -> sectors 1..3, mid 25 -> 2; y 12..26 -> rows 1..2, mid 19 -> 1
        grid.insert(b, &rect(15.0, 12.0, 35.0, 26.0));

        assert!(grid.sector(SectorCoord::new(2, 1)).unwrap().contains(b, Membership::Primary));
        for (x, y) in [(1, 1), (3, 1), (1, 2), (2, 2), (3, 2)] {
            let s = grid.sector(SectorCoord::new(x, y)).unwrap();
            assert!(s.contains(b, Membership::Overlap), "overlap at ({x},{y})");
            assert!(!s.contains(b, Membership::Primary));
        }
        assert_eq!(grid.membership_counts(b), (1, 5));
    }

    #[test]
    fn lists_are_partitioned_by_type() {
        let mut grid = small_grid();
        let ped = id(EntityType::Ped, 0);
        let obj = id(EntityType::Object, 0);
        let r = rect(1.0, 1.0, 2.0, 2.0);
        grid.insert(ped, &r);
        grid.insert(obj, &r);
        let s = grid.sector(SectorCoord::new(0, 0)).unwrap();
        assert_eq!(s.list(EntityType::Ped, Membership::Primary), &[ped]);
        assert_eq!(s.list(EntityType::Object, Membership::Primary), &[obj]);
        assert!(s.list(EntityType::Vehicle, Membership::Primary).is_empty());
    }

    #[test]
    fn remove_with_same_rect_clears_everything() {
        let mut grid = small_grid();
        let b = id(EntityType::Building, 1);
        let r = rect(5.0, 5.0, 45.0, 25.0);
        grid.insert(b, &r);
        assert_eq!(grid.remove(b, &r), 15);
        assert_eq!(grid.membership_counts(b), (0, 0));
        assert_eq!(grid.occupied_sectors(), 0);
    }

    #[test]
    fn remove_with_moved_rect_misses_sectors() {
        let mut grid = small_grid();
        let v = id(EntityType::Vehicle, 2);
        grid.insert(v, &rect(1.0, 1.0, 2.0, 2.0));
        assert_eq!(grid.remove(v, &rect(51.0, 51.0, 52.0, 52.0)), 0);
        assert_eq!(grid.membership_counts(v), (1, 0));
    }

    #[test]
    #[should_panic(expected = "outside the grid")]
    fn insert_outside_grid_panics() {
        let mut grid = small_grid();
        grid.insert(id(EntityType::Vehicle, 0), &rect(75.0, 75.0, 85.0, 78.0));
    }

    #[test]
    #[should_panic(expected = "outside the grid")]
    fn insert_below_origin_panics() {
        let mut grid = small_grid();
        grid.insert(id(EntityType::Ped, 0), &rect(-0.5, 3.0, 1.0, 4.0));
    }

    #[test]
    fn contains_rect_matches_insert_bounds() {
        let grid = small_grid();
        assert!(grid.contains_rect(&rect(0.0, 0.0, 79.9, 79.9)));
        assert!(!grid.contains_rect(&rect(75.0, 75.0, 85.0, 78.0)));
        assert!(!grid.contains_rect(&rect(-0.5, 3.0, 1.0, 4.0)));
    }

    #[test]
    fn rect_queries_dedupe_and_attribute() {
        let mut grid = small_grid();
        let b = id(EntityType::Building, 0);
        let v = id(EntityType::Vehicle, 0);
        grid.insert(b, &rect(15.0, 12.0, 35.0, 26.0));
        grid.insert(v, &rect(61.0, 61.0, 62.0, 62.0));

        let everything = rect(0.0, 0.0, 79.0, 79.0);
        let found = grid.entities_in_rect(&everything, EntityType::Building);
        assert_eq!(found.len(), 1);
        assert!(found.contains(&b));
        assert_eq!(grid.primary_in_rect(&everything, EntityType::Building), vec![b]);

        // Only the overlap sector (1,2) is queried: the building is found but
        // is not attributed there.
        let corner = rect(11.0, 21.0, 12.0, 22.0);
        assert!(grid.entities_in_rect(&corner, EntityType::Building).contains(&b));
        assert!(grid.primary_in_rect(&corner, EntityType::Building).is_empty());
    }

    #[test]
    fn queries_clamp_to_grid() {
        let mut grid = small_grid();
        let p = id(EntityType::Ped, 3);
        grid.insert(p, &rect(0.5, 0.5, 1.0, 1.0));
        let huge = rect(-500.0, -500.0, 500.0, 500.0);
        assert!(grid.entities_in_rect(&huge, EntityType::Ped).contains(&p));
        assert!(grid.sector(SectorCoord::new(-1, 0)).is_none());
        assert!(grid.sector(SectorCoord::new(8, 0)).is_none());
    }

    #[test]
    fn clear_empties_all_sectors() {
        let mut grid = small_grid();
        grid.insert(id(EntityType::Dummy, 0), &rect(1.0, 1.0, 30.0, 30.0));
        assert!(grid.occupied_sectors() > 0);
        grid.clear();
        assert_eq!(grid.occupied_sectors(), 0);
    }
}
