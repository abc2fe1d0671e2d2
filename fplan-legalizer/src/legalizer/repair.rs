//! Deterministic clean-up for soft blocks still illegal once every overlap is gone.

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use std::collections::BTreeMap;

use fplan_common::{Area, Direction, Floorplan, Len, Rect, RectSet, RegionId};

use super::construct::block_edges;
use super::graph::EdgeKind;
use super::segment::Segment;

/// Try to fix every illegal soft block, one predicate at a time in a fixed order. Returns the
/// blocks that are still illegal afterwards.
pub fn repair_all(fp: &mut Floorplan) -> Result<Vec<RegionId>> {
    let _span = tracing::info_span!("fallback_repair").entered();
    let mut still_illegal = Vec::new();
    for region in fp.soft_ids().collect_vec() {
        if fp.region(region).legal_area == 0 || fp.is_legal(region) {
            continue;
        }
        log::debug!(
            "Repairing {} ({:?})",
            fp.region(region).name,
            fp.violations(region)
        );
        repair_region(fp, region)
            .with_context(|| anyhow!("Repairing {}", fp.region(region).name))?;
        if !fp.is_legal(region) {
            log::info!(
                "{} is still illegal after repair: {:?}",
                fp.region(region).name,
                fp.violations(region)
            );
            still_illegal.push(region);
        }
    }
    Ok(still_illegal)
}

pub fn repair_region(fp: &mut Floorplan, region: RegionId) -> Result<()> {
    if !fp.is_legal_one_shape(region) {
        keep_largest_component(fp, region)?;
    }
    if !fp.is_legal_no_hole(region) {
        keep_largest_tile(fp, region)?;
    }
    if !fp.is_legal_enough_area(region) {
        grow_missing_area(fp, region)?;
    }
    if !fp.is_legal_aspect_ratio(region) {
        trim_aspect_ratio(fp, region)?;
    }
    if !fp.is_legal_utilization(region) {
        fill_bounding_box(fp, region)?;
    }
    Ok(())
}

/// Drop every connected piece but the largest.
pub fn keep_largest_component(fp: &mut Floorplan, region: RegionId) -> Result<Area> {
    let largest = fp
        .shape(region)
        .components()
        .into_iter()
        .fold(None, |best: Option<RectSet>, c| match best {
            Some(b) if b.area() >= c.area() => Some(b),
            _ => Some(c),
        });
    match largest {
        Some(keep) => fp.retain_region(region, &keep),
        None => Ok(0),
    }
}

/// Shrink to the single largest tile the region owns, which cannot have a hole.
pub fn keep_largest_tile(fp: &mut Floorplan, region: RegionId) -> Result<Area> {
    let mut largest: Option<Rect> = None;
    for t in fp.region(region).block_tiles().iter() {
        let r = fp.tile_rect(*t)?;
        if largest.map(|l| r.area() > l.area()).unwrap_or(true) {
            largest = Some(r);
        }
    }
    match largest {
        Some(keep) => fp.retain_region(region, &RectSet::from_rect(keep)),
        None => Ok(0),
    }
}

/// Grow into blank space next to the region until it reaches its legal area. Sides are tried
/// longest blank contour first, each grown by the depth that would cover the missing area if
/// the whole contour were free.
pub fn grow_missing_area(fp: &mut Floorplan, region: RegionId) -> Result<Area> {
    let mut by_side: BTreeMap<Direction, Vec<Segment>> = BTreeMap::new();
    for edge in block_edges(fp, region)? {
        if let EdgeKind::BlockToBlank { dir } = edge.kind {
            by_side.entry(dir).or_default().extend(edge.segments);
        }
    }
    let sides = by_side
        .into_iter()
        .map(|(d, segs)| {
            let contour: Len = segs.iter().map(|s| s.len()).sum();
            (d, contour, segs)
        })
        .sorted_by_key(|(d, contour, _)| (std::cmp::Reverse(*contour), *d))
        .collect_vec();

    let mut gained = 0;
    for (dir, contour, segments) in sides {
        let missing = fp.region(region).legal_area - fp.actual_area(region);
        if missing <= 0 || contour <= 0 {
            break;
        }
        let depth = (missing + contour as Area - 1) / contour as Area;
        log::trace!("Growing {} {:?} by {}", region, dir, depth);
        for seg in segments {
            if let Some(rect) = seg.extend_into_blank(depth * seg.len() as Area, fp) {
                gained += fp.grow_region(region, rect)?;
            }
        }
    }
    Ok(gained)
}

/// Trim the long axis of the bounding box back inside the aspect ratio bounds. Of cutting the
/// low end, the high end, or both halves, keep whichever leaves one piece with no hole and the
/// most area.
pub fn trim_aspect_ratio(fp: &mut Floorplan, region: RegionId) -> Result<Area> {
    let shape = fp.shape(region);
    let bbox = match shape.bounding_box() {
        Some(b) => b,
        None => return Ok(0),
    };
    let r = fp.region(region);
    let ar = bbox.aspect_ratio();

    let candidates = if ar > r.aspect_ratio_max {
        let keep = ((bbox.height() as f64 * r.aspect_ratio_max).floor() as Len).max(1);
        let cut = bbox.width() - keep;
        if cut <= 0 {
            return Ok(0);
        }
        [
            Rect::new(bbox.xl + cut, bbox.yl, bbox.xh, bbox.yh),
            Rect::new(bbox.xl, bbox.yl, bbox.xh - cut, bbox.yh),
            Rect::new(bbox.xl + cut / 2, bbox.yl, bbox.xh - (cut - cut / 2), bbox.yh),
        ]
    } else if ar < r.aspect_ratio_min {
        let keep = ((bbox.width() as f64 / r.aspect_ratio_min).floor() as Len).max(1);
        let cut = bbox.height() - keep;
        if cut <= 0 {
            return Ok(0);
        }
        [
            Rect::new(bbox.xl, bbox.yl + cut, bbox.xh, bbox.yh),
            Rect::new(bbox.xl, bbox.yl, bbox.xh, bbox.yh - cut),
            Rect::new(bbox.xl, bbox.yl + cut / 2, bbox.xh, bbox.yh - (cut - cut / 2)),
        ]
    } else {
        return Ok(0);
    };

    let mut best: Option<RectSet> = None;
    for window in candidates {
        let kept = shape.intersect_rect(&window);
        if !kept.one_shape() || !kept.no_hole() {
            continue;
        }
        if best.as_ref().map(|b| kept.area() > b.area()).unwrap_or(true) {
            best = Some(kept);
        }
    }
    match best {
        Some(keep) => fp.retain_region(region, &keep),
        None => {
            log::debug!("No valid aspect ratio trim for {}", region);
            Ok(0)
        }
    }
}

/// Would `region` still pass its checks with `shape`?
fn legal_with(fp: &Floorplan, region: RegionId, shape: &RectSet) -> bool {
    let r = fp.region(region);
    let ar = shape.aspect_ratio();
    shape.area() >= r.legal_area
        && r.aspect_ratio_min <= ar
        && ar <= r.aspect_ratio_max
        && shape.utilization() >= r.utilization_min
        && shape.one_shape()
        && shape.no_hole()
}

/// Grow into the free parts of the bounding box, larger pieces first, then into pieces of other
/// soft blocks inside it, taking from the block with the largest area surplus first. A piece is
/// only taken if the region stays one piece with no hole and the block giving it up stays legal.
pub fn fill_bounding_box(fp: &mut Floorplan, region: RegionId) -> Result<Area> {
    let mut gained = 0;
    loop {
        if fp.is_legal_utilization(region) {
            break;
        }
        let bbox = match fp.bounding_box(region) {
            Some(b) => b,
            None => break,
        };

        let blank = fp
            .plane()
            .blank_in(bbox)
            .into_iter()
            .sorted_by_key(|r| std::cmp::Reverse(r.area()))
            .map(|r| (r, None));
        // blocks with the most area above their legal area give theirs up first
        let taken = fp
            .soft_ids()
            .filter(|o| *o != region)
            .flat_map(|o| {
                let surplus = fp.actual_area(o) - fp.region(o).legal_area;
                fp.shape(o)
                    .intersect_rect(&bbox)
                    .rects()
                    .iter()
                    .map(|r| (*r, surplus, o))
                    .collect_vec()
            })
            .sorted_by_key(|(r, surplus, _)| std::cmp::Reverse((*surplus, r.area())))
            .map(|(r, _, o)| (r, Some(o)));
        let candidates = blank.chain(taken).collect_vec();

        let own = fp.shape(region);
        let mut grew = false;
        for (piece, victim) in candidates {
            let mut grown = own.clone();
            grown.add(piece);
            if !grown.one_shape() || !grown.no_hole() {
                continue;
            }
            if let Some(v) = victim {
                let mut rest = fp.shape(v);
                rest.subtract(&piece);
                if !legal_with(fp, v, &rest) {
                    continue;
                }
                fp.shrink_region(v, piece)?;
            }
            gained += fp.grow_region(region, piece)?;
            grew = true;
            break;
        }
        if !grew {
            break;
        }
    }
    Ok(gained)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::legalizer::test::floorplan;

    #[test]
    fn largest_component_survives() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut fp = floorplan![
            chip: (0, 0, 20, 20),
            soft: [
                a => 16, [(0, 0, 4, 4), (10, 10, 11, 11)];
            ],
            fixed: []
        ];
        let a = RegionId(0);
        assert!(!fp.is_legal_one_shape(a));
        assert_eq!(keep_largest_component(&mut fp, a).unwrap(), 1);
        assert!(fp.is_legal(a));
    }

    #[test]
    fn area_grows_from_longest_side() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut fp = floorplan![
            chip: (0, 0, 4, 20),
            soft: [
                a => 24, [(0, 0, 4, 4)];
            ],
            fixed: []
        ];
        let a = RegionId(0);
        assert_eq!(grow_missing_area(&mut fp, a).unwrap(), 8);
        assert_eq!(fp.shape(a), RectSet::from_rect(Rect::new(0, 0, 4, 6)));
    }

    #[test]
    fn aspect_ratio_trim_keeps_one_piece() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut fp = floorplan![
            chip: (0, 0, 20, 20),
            soft: [
                a => 8, [(0, 0, 10, 2)];
            ],
            fixed: []
        ];
        let a = RegionId(0);
        assert!(!fp.is_legal_aspect_ratio(a));
        assert_eq!(trim_aspect_ratio(&mut fp, a).unwrap(), 12);
        assert_eq!(fp.shape(a).bounding_box(), Some(Rect::new(6, 0, 10, 2)));
        assert!(fp.is_legal_aspect_ratio(a));
    }

    #[test]
    fn fill_prefers_blank_and_spares_victims() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut fp = floorplan![
            chip: (0, 0, 20, 20),
            soft: [
                a => 12, [(0, 0, 4, 2), (0, 2, 2, 4)];
                b => 4, [(2, 2, 4, 4)];
            ],
            fixed: []
        ];
        let a = RegionId(0);
        // the only free corner belongs to b, which cannot spare it
        assert!(!fp.is_legal_utilization(a));
        assert_eq!(fill_bounding_box(&mut fp, a).unwrap(), 0);

        let mut fp = floorplan![
            chip: (0, 0, 20, 20),
            soft: [
                a => 12, [(0, 0, 4, 2), (0, 2, 2, 4)];
            ],
            fixed: []
        ];
        assert_eq!(fill_bounding_box(&mut fp, a).unwrap(), 4);
        assert!(fp.is_legal(a));
    }

    #[test]
    fn fill_takes_from_block_with_most_to_spare() {
        let _ = tracing_subscriber::fmt::try_init();
        let mut fp = floorplan![
            chip: (0, 0, 20, 20),
            soft: [
                a => 16, [(0, 0, 6, 2), (0, 2, 2, 4)];
                b => 4, [(4, 2, 6, 6)];
                c => 4, [(2, 2, 4, 7)];
            ],
            fixed: []
        ];
        let (a, b, c) = (RegionId(0), RegionId(1), RegionId(2));
        assert!(!fp.is_legal_utilization(a));
        assert_eq!(fill_bounding_box(&mut fp, a).unwrap(), 4);
        assert_eq!(fp.actual_area(a), 20);
        assert_eq!(fp.shape(a).intersect_rect(&Rect::new(2, 2, 4, 4)).area(), 4);
        assert_eq!(fp.actual_area(b), 8);
        assert_eq!(fp.actual_area(c), 6);
        assert!(fp.is_legal(a) && fp.is_legal(b) && fp.is_legal(c));
        fp.check_consistency().unwrap();
    }
}
