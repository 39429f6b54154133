//! Property tests for wedge selection

use autoindex_orchestration::{select_wedges, OrchestratorError};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_wedges_lie_inside_contiguous_sweep(
        first in 1u32..1000,
        count in 1u32..2000,
        phi_width in 0.05f64..10.0,
        block in 1usize..10,
    ) {
        let images: Vec<u32> = (first..first + count).collect();
        let last = first + count - 1;
        let wedges = select_wedges(&images, phi_width, block).unwrap();

        prop_assert!(!wedges.is_empty());
        prop_assert!(wedges.len() <= 3);
        prop_assert_eq!(wedges[0].start, first);

        for wedge in &wedges {
            prop_assert!(wedge.start <= wedge.end);
            prop_assert!(wedge.start >= first && wedge.end <= last, "{} outside {}..={}", wedge, first, last);
        }
    }

    #[test]
    fn prop_blocks_have_uniform_length(
        count in 3u32..1000,
        phi_width in 0.05f64..10.0,
        block in 1usize..10,
    ) {
        let images: Vec<u32> = (1..=count).collect();
        let wedges = select_wedges(&images, phi_width, block).unwrap();
        let expected = block.min(count as usize) as u32;

        for wedge in &wedges {
            prop_assert_eq!(wedge.len(), expected);
        }
    }

    #[test]
    fn prop_later_wedges_do_not_overlap_the_first(
        count in 3u32..1000,
        // below 9° per frame the 45° block starts after a five-image head
        phi_width in 0.05f64..9.0,
    ) {
        let images: Vec<u32> = (1..=count).collect();
        let wedges = select_wedges(&images, phi_width, 5).unwrap();

        // the tail may overlap the head only when the sweep is shorter than two blocks
        if count >= 10 {
            for wedge in &wedges[1..] {
                prop_assert!(!wedge.overlaps(&wedges[0]));
            }
        }
    }

    #[test]
    fn prop_selection_is_deterministic(
        mut images in proptest::collection::vec(1u32..5000, 1..200),
        phi_width in 0.05f64..10.0,
    ) {
        images.sort_unstable();
        images.dedup();

        let a = select_wedges(&images, phi_width, 5).unwrap();
        let b = select_wedges(&images, phi_width, 5).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_short_sets_give_reference_images(
        mut images in proptest::collection::vec(1u32..5000, 1..3),
        phi_width in 0.05f64..10.0,
    ) {
        images.sort_unstable();
        images.dedup();

        let wedges = select_wedges(&images, phi_width, 5).unwrap();
        prop_assert_eq!(wedges.len(), images.len());
        for (wedge, image) in wedges.iter().zip(&images) {
            prop_assert_eq!(wedge.start, *image);
            prop_assert_eq!(wedge.end, *image);
        }
    }
}

#[test]
fn test_empty_sweep_is_an_error() {
    assert!(matches!(
        select_wedges(&[], 1.0, 5),
        Err(OrchestratorError::NoImages)
    ));
}
