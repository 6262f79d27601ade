//! Property-based tests for the moment combiner.
//!
//! Folding block moments in any order or grouping has to match the moments
//! computed directly over all observations.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use trajfold::moments::{fold_moments, Moments};
use trajfold::partition::make_balanced_slices;

const WIDTH: usize = 3;

fn observations(n: usize, seed: u64, offset: f64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            (0..WIDTH)
                .map(|axis| offset * (axis + 1) as f64 + rng.random_range(-5.0..5.0))
                .collect()
        })
        .collect()
}

fn block_moments(rows: &[Vec<f64>], n_blocks: usize) -> Vec<Moments> {
    make_balanced_slices(rows.len(), n_blocks, None, None, None)
        .unwrap()
        .iter()
        .map(|block| {
            let chunk: Vec<Vec<f64>> = block
                .indices(rows.len())
                .map(|i| rows[i].clone())
                .collect();
            Moments::from_observations(&chunk).unwrap()
        })
        .collect()
}

fn close(a: &[f64], b: &[f64], rel: f64) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= rel * x.abs().max(y.abs()).max(1.0))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fold_matches_direct(
        n in 1usize..400,
        n_blocks in 1usize..16,
        seed in any::<u64>(),
        offset in -1.0e4f64..1.0e4,
    ) {
        prop_assume!(n_blocks <= n);
        let rows = observations(n, seed, offset);
        let direct = Moments::from_observations(&rows).unwrap();
        let folded = fold_moments(block_moments(&rows, n_blocks)).unwrap();

        prop_assert_eq!(folded.count(), n as u64);
        prop_assert!(close(folded.mean(), direct.mean(), 1e-9));
        prop_assert!(close(folded.sum_sq_dev(), direct.sum_sq_dev(), 1e-8));
    }

    #[test]
    fn fold_order_does_not_matter(
        n in 2usize..200,
        n_blocks in 2usize..10,
        seed in any::<u64>(),
    ) {
        prop_assume!(n_blocks <= n);
        let rows = observations(n, seed, 100.0);
        let mut parts = block_moments(&rows, n_blocks);
        let in_order = fold_moments(parts.clone()).unwrap();

        parts.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(1)));
        let shuffled = fold_moments(parts.clone()).unwrap();

        // Pairwise tree reduction instead of a left fold.
        while parts.len() > 1 {
            parts = parts
                .chunks(2)
                .map(|pair| match pair {
                    [a, b] => a.combine(b).unwrap(),
                    [a] => a.clone(),
                    _ => unreachable!(),
                })
                .collect();
        }
        let tree = parts.pop().unwrap();

        for other in [&shuffled, &tree] {
            prop_assert_eq!(other.count(), in_order.count());
            prop_assert!(close(other.mean(), in_order.mean(), 1e-9));
            prop_assert!(close(other.sum_sq_dev(), in_order.sum_sq_dev(), 1e-8));
        }
    }

    #[test]
    fn empty_is_neutral(n in 1usize..50, seed in any::<u64>()) {
        let a = Moments::from_observations(&observations(n, seed, 1.0)).unwrap();
        prop_assert_eq!(&a.combine(&Moments::empty()).unwrap(), &a);
        prop_assert_eq!(&Moments::empty().combine(&a).unwrap(), &a);
    }

    #[test]
    fn sum_sq_dev_is_non_negative(n in 1usize..100, n_blocks in 1usize..8, seed in any::<u64>()) {
        prop_assume!(n_blocks <= n);
        let rows = observations(n, seed, 1.0e6);
        let folded = fold_moments(block_moments(&rows, n_blocks)).unwrap();
        prop_assert!(folded.sum_sq_dev().iter().all(|&s| s >= 0.0));
    }
}

#[test]
fn large_offset_stays_accurate() {
    // A naive sum-of-squares merge loses every digit here.
    let rows: Vec<Vec<f64>> = (0..1000)
        .map(|i| vec![1.0e9 + (i % 10) as f64])
        .collect();
    let folded = fold_moments(block_moments(&rows, 7)).unwrap();
    let direct = Moments::from_observations(&rows).unwrap();

    assert!((folded.mean()[0] - direct.mean()[0]).abs() < 1e-6);
    assert!((folded.sum_sq_dev()[0] - direct.sum_sq_dev()[0]).abs() < 1e-3);
    assert!((direct.sum_sq_dev()[0] - 8250.0).abs() < 1e-3);
}
