use super::*;
use proptest::prelude::*;

fn set(rects: &[(Len, Len, Len, Len)]) -> RectSet {
    rects
        .iter()
        .map(|&(xl, yl, xh, yh)| Rect::new(xl, yl, xh, yh))
        .collect()
}

#[test]
fn union_counts_shared_area_once() {
    let s = set(&[(0, 0, 4, 4), (2, 2, 6, 6)]);
    assert_eq!(s.area(), 28);
    assert_eq!(s.bounding_box(), Some(Rect::new(0, 0, 6, 6)));
    assert!(s.one_shape());
}

#[test]
fn corner_contact_is_two_shapes() {
    let s = set(&[(0, 0, 2, 2), (2, 2, 4, 4)]);
    assert!(!s.one_shape());
    assert_eq!(s.components().len(), 2);
}

#[test]
fn ring_has_hole() {
    let ring = set(&[(0, 0, 6, 2), (0, 4, 6, 6), (0, 2, 2, 4), (4, 2, 6, 4)]);
    assert!(ring.one_shape());
    assert!(!ring.no_hole());

    let notched = set(&[(0, 0, 6, 2), (0, 4, 6, 6), (0, 2, 2, 4)]);
    assert!(notched.no_hole());
}

#[test]
fn dice_is_canonical() {
    let a = set(&[(0, 0, 4, 2), (0, 2, 4, 4)]);
    assert_eq!(a.dice(), vec![Rect::new(0, 0, 4, 4)]);

    let b = set(&[(0, 0, 2, 4), (2, 0, 4, 4)]);
    assert_eq!(a, b);

    let l = set(&[(0, 0, 2, 4), (2, 0, 4, 2)]);
    assert_eq!(
        l.dice(),
        vec![Rect::new(0, 0, 4, 2), Rect::new(0, 2, 2, 4)]
    );
}

#[test]
fn boundary_skips_internal_edges() {
    let s = set(&[(0, 0, 2, 2), (2, 0, 4, 2)]);
    assert_eq!(s.boundary(Direction::Top), vec![(2, 0, 4)]);
    assert_eq!(s.boundary(Direction::Right), vec![(4, 0, 2)]);
    assert_eq!(s.boundary(Direction::Left), vec![(0, 0, 2)]);

    let l = set(&[(0, 0, 4, 2), (0, 2, 2, 4)]);
    assert_eq!(l.boundary(Direction::Top), vec![(2, 2, 4), (4, 0, 2)]);
}

#[test]
fn utilization_of_l_shape() {
    let l = set(&[(0, 0, 4, 2), (0, 2, 2, 4)]);
    approx::assert_relative_eq!(l.utilization(), 0.75);
    approx::assert_relative_eq!(l.aspect_ratio(), 1.0);
}

fn arb_rect() -> impl Strategy<Value = Rect> {
    (0..12i32, 0..12i32, 1..6i32, 1..6i32).prop_map(|(x, y, w, h)| Rect::with_size(x, y, w, h))
}

fn covered(s: &RectSet, x: Len, y: Len) -> bool {
    s.rects()
        .iter()
        .any(|r| r.xl <= x && x < r.xh && r.yl <= y && y < r.yh)
}

proptest! {
    #[test]
    fn set_ops_agree_with_point_membership(
        a in prop::collection::vec(arb_rect(), 1..5),
        b in prop::collection::vec(arb_rect(), 1..5),
    ) {
        let a: RectSet = a.into_iter().collect();
        let b: RectSet = b.into_iter().collect();
        let u = a.union(&b);
        let d = a.difference(&b);
        let i = a.intersection(&b);

        for x in 0..18 {
            for y in 0..18 {
                let in_a = covered(&a, x, y);
                let in_b = covered(&b, x, y);
                prop_assert_eq!(covered(&u, x, y), in_a || in_b);
                prop_assert_eq!(covered(&d, x, y), in_a && !in_b);
                prop_assert_eq!(covered(&i, x, y), in_a && in_b);
            }
        }
        prop_assert_eq!(u.area(), d.area() + b.area());
        prop_assert_eq!(i.area() + d.area(), a.area());
    }

    #[test]
    fn dice_preserves_points(rects in prop::collection::vec(arb_rect(), 1..6)) {
        let s: RectSet = rects.into_iter().collect();
        let diced: RectSet = s.dice().into_iter().collect();
        prop_assert_eq!(diced.area(), s.area());
        prop_assert_eq!(diced.dice(), s.dice());
    }
}
