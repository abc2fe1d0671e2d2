use super::*;

fn two_blocks() -> (Floorplan, RegionId, RegionId) {
    let mut fp = Floorplan::new(Rect::new(0, 0, 20, 20));
    let a = fp.add_region(Region::soft("a", 16)).unwrap();
    let b = fp.add_region(Region::soft("b", 16)).unwrap();
    fp.paint_region(a, Rect::new(0, 0, 4, 4)).unwrap();
    fp.paint_region(b, Rect::new(2, 2, 6, 6)).unwrap();
    (fp, a, b)
}

#[test]
fn painting_creates_overlap_tiles() {
    let (fp, a, b) = two_blocks();
    fp.check_consistency().unwrap();
    assert_eq!(fp.total_overlap_area(), 4);
    assert_eq!(fp.actual_area(a), 16);
    assert_eq!(fp.actual_area(b), 16);
    let shared = fp.overlap_tiles_between(a, b);
    assert_eq!(shared.len(), 1);
    assert_eq!(fp.tile_rect(shared[0]).unwrap(), Rect::new(2, 2, 4, 4));
    assert_eq!(fp.overlap_tiles_between(b, a), shared);
}

#[test]
fn soft_after_fixed_is_rejected() {
    let mut fp = Floorplan::new(Rect::new(0, 0, 4, 4));
    fp.add_region(Region::fixed("f", 1)).unwrap();
    assert!(fp.add_region(Region::soft("s", 1)).is_err());
}

#[test]
fn decreasing_overlap_hands_tile_to_remaining_owner() {
    let (mut fp, a, b) = two_blocks();
    let shared = fp.overlap_tiles_between(a, b)[0];
    fp.decrease_tile_overlap(shared, b).unwrap();
    fp.check_consistency().unwrap();
    assert_eq!(fp.total_overlap_area(), 0);
    assert!(fp.region(a).block_tiles().contains(&shared));
    assert_eq!(fp.actual_area(a), 16);
    assert_eq!(fp.actual_area(b), 12);
    assert!(fp.decrease_tile_overlap(shared, b).is_err());
}

#[test]
fn three_owner_overlap_keeps_other_pair() {
    let (mut fp, a, b) = two_blocks();
    let c = fp.add_region(Region::soft("c", 4)).unwrap();
    fp.paint_region(c, Rect::new(3, 3, 4, 4)).unwrap();
    fp.check_consistency().unwrap();

    let triple = fp
        .overlap_tiles_between(a, c)
        .into_iter()
        .find(|t| fp.tile(*t).unwrap().payload.owners().len() == 3)
        .unwrap();
    fp.decrease_tile_overlap(triple, c).unwrap();
    assert_eq!(
        fp.tile(triple).unwrap().payload,
        TilePayload::Overlap(vec![a, b])
    );
    fp.check_consistency().unwrap();
}

#[test]
fn move_parent_transfers_area() {
    let (mut fp, a, b) = two_blocks();
    let tile = *fp.region(a).block_tiles().iter().next().unwrap();
    let area = fp.tile_rect(tile).unwrap().area();
    fp.move_tile_parent(tile, a, b).unwrap();
    fp.check_consistency().unwrap();
    assert_eq!(fp.actual_area(a), 16 - area);
    assert_eq!(fp.actual_area(b), 16 + area);
    assert!(fp.move_tile_parent(tile, a, b).is_err());
}

#[test]
fn grow_and_shrink() {
    let (mut fp, a, b) = two_blocks();
    // only the blank part is gained
    assert_eq!(fp.grow_region(a, Rect::new(0, 4, 4, 8)).unwrap(), 12);
    assert_eq!(fp.actual_area(a), 28);

    // shrinking through the overlap gives it up to b
    assert_eq!(fp.shrink_region(a, Rect::new(2, 0, 4, 4)).unwrap(), 8);
    fp.check_consistency().unwrap();
    assert_eq!(fp.total_overlap_area(), 0);
    assert_eq!(fp.actual_area(b), 16);
}

#[test]
fn legality_predicates() {
    let mut fp = Floorplan::new(Rect::new(0, 0, 20, 20));
    let a = fp.add_region(Region::soft("a", 16)).unwrap();
    fp.add_block_tile(a, Rect::new(0, 0, 8, 2)).unwrap();
    assert!(fp.is_legal_enough_area(a));
    assert!(!fp.is_legal_aspect_ratio(a));
    assert!(fp.is_legal_utilization(a));
    assert_eq!(fp.violations(a), vec![Violation::AspectRatio]);

    fp.add_block_tile(a, Rect::new(10, 0, 11, 1)).unwrap();
    assert!(!fp.is_legal_one_shape(a));
    assert!(fp.violations(a).contains(&Violation::Fragmented));

    let ring = fp.add_region(Region::soft("ring", 8)).unwrap();
    for r in [
        Rect::new(12, 12, 15, 13),
        Rect::new(12, 14, 15, 15),
        Rect::new(12, 13, 13, 14),
        Rect::new(14, 13, 15, 14),
    ] {
        fp.add_block_tile(ring, r).unwrap();
    }
    assert!(!fp.is_legal_no_hole(ring));
    assert!(fp.is_legal_one_shape(ring));
}

#[test]
fn reshape_keeps_shape() {
    let mut fp = Floorplan::new(Rect::new(0, 0, 20, 20));
    let a = fp.add_region(Region::soft("a", 16)).unwrap();
    for x in 0..4 {
        fp.add_block_tile(a, Rect::new(x, 0, x + 1, 4)).unwrap();
    }
    let before = fp.shape(a);
    fp.reshape_region(a).unwrap();
    fp.check_consistency().unwrap();
    assert_eq!(fp.region(a).block_tiles().len(), 1);
    assert_eq!(fp.shape(a), before);
}

#[test]
fn retain_drops_outside() {
    let (mut fp, a, _) = two_blocks();
    let keep = RectSet::from_rect(Rect::new(0, 0, 2, 4));
    assert_eq!(fp.retain_region(a, &keep).unwrap(), 8);
    assert_eq!(fp.shape(a), keep);
    assert_eq!(fp.total_overlap_area(), 0);
}
