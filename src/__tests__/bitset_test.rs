use crate::BitSet;

fn set(items: &[usize]) -> BitSet {
    items.iter().copied().collect()
}

#[test]
fn add_remove_contains() {
    let mut s = BitSet::new();
    assert!(s.is_empty());
    s.add(3);
    s.add(64);
    s.add(1000);
    assert!(s.contains(3));
    assert!(s.contains(64));
    assert!(s.contains(1000));
    assert!(!s.contains(4));
    assert_eq!(s.len(), 3);
    s.remove(64);
    assert!(!s.contains(64));
    s.remove(9999); // out of range, no effect
    assert_eq!(s.len(), 2);
}

#[test]
fn grows_downward() {
    let mut s = BitSet::new();
    s.add(500);
    s.add(2);
    assert!(s.contains(2));
    assert!(s.contains(500));
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![2, 500]);
}

#[test]
fn equality_ignores_bounds() {
    let mut a = BitSet::with_range(0, 1024);
    let mut b = BitSet::new();
    a.add(70);
    b.add(70);
    assert_eq!(a, b);
    b.add(900);
    assert_ne!(a, b);
    b.remove(900);
    assert_eq!(a, b);
    assert_eq!(BitSet::with_range(0, 4096), BitSet::new());
}

#[test]
fn union_laws() {
    let a = set(&[1, 5, 130]);
    let b = set(&[5, 7]);
    let c = set(&[200]);
    assert_eq!(a.union(&b), b.union(&a));
    assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
    assert_eq!(a.union(&a), a);
    assert_eq!(a.union(&BitSet::new()), a);
}

#[test]
fn intersection_distributes_over_union() {
    let a = set(&[1, 2, 3, 70]);
    let b = set(&[2, 70, 90]);
    let c = set(&[3, 70, 91]);
    assert_eq!(
        a.intersection(&b.union(&c)),
        a.intersection(&b).union(&a.intersection(&c))
    );
}

#[test]
fn intersection_keeps_bounds() {
    let a = set(&[1, 2, 300]);
    let b = set(&[2]);
    let i = a.intersection(&b);
    assert_eq!(i, set(&[2]));
    let empty = a.intersection(&set(&[4000]));
    assert!(empty.is_empty());
}

#[test]
fn difference() {
    let a = set(&[1, 2, 300]);
    assert!(a.difference(&a).is_empty());
    assert_eq!(a.difference(&set(&[2])), set(&[1, 300]));
    assert_eq!(a.difference(&BitSet::new()), a);
}

#[test]
fn in_place_forms() {
    let mut s = set(&[1, 2]);
    s.union_with(&set(&[2, 600]));
    assert_eq!(s, set(&[1, 2, 600]));
    s.intersect_with(&set(&[2, 600, 601]));
    assert_eq!(s, set(&[2, 600]));
    s.subtract_with(&set(&[600]));
    assert_eq!(s, set(&[2]));
}

#[test]
fn bulk_operations() {
    let mut s = BitSet::new();
    s.add_all(0..10);
    assert_eq!(s.len(), 10);
    s.remove_all(0..5);
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9]);
}
