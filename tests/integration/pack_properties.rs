//! Property-based tests for pack expansion and rate governor admission

use proptest::prelude::*;
use shotforge::governor::RequestGovernor;
use shotforge::pack::{
    expand, AspectRatio, Catalog, ExpandOptions, ModelShot, PackKind, ProductShot, ShotTier,
};

fn model(id: String, tier: ShotTier) -> ModelShot {
    ModelShot {
        label: format!("Shot {}", id),
        shot_type: format!("{} framing", id),
        expression: "neutral".to_string(),
        camera_angle: "eye level".to_string(),
        tier,
        id,
    }
}

fn product(id: String, tier: ShotTier) -> ProductShot {
    ProductShot {
        label: format!("Product {}", id),
        camera_angle: "front".to_string(),
        focal_length: "50mm".to_string(),
        tier,
        id,
    }
}

/// Catalog with the given number of entries per tier, in both halves.
fn catalog(essential: usize, plus: usize, social: usize) -> Catalog {
    let mut model_shots = Vec::new();
    let mut product_shots = Vec::new();
    for (tier, count, prefix) in [
        (ShotTier::Essential, essential, "e"),
        (ShotTier::Plus, plus, "p"),
        (ShotTier::Social, social, "s"),
    ] {
        for i in 0..count {
            model_shots.push(model(format!("{}{}", prefix, i), tier));
            product_shots.push(product(format!("{}{}", prefix, i), tier));
        }
    }
    let social_ids: Vec<String> = (0..social).map(|i| format!("s{}", i)).collect();
    let catalog = Catalog {
        social_shot_ids: social_ids.clone(),
        product_social_ids: social_ids,
        model_shots,
        product_shots,
    };
    catalog.validate().unwrap();
    catalog
}

fn aspect_ratio() -> impl Strategy<Value = AspectRatio> {
    prop_oneof![
        Just(AspectRatio::Square),
        Just(AspectRatio::Portrait),
        Just(AspectRatio::Landscape),
        Just(AspectRatio::Vertical),
        Just(AspectRatio::Widescreen),
    ]
}

/// Test that job counts follow the catalog tiers for every pack
#[test]
fn test_pack_job_counts_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(1usize..6, 0usize..6, 0usize..5, aspect_ratio(), any::<bool>()),
            |(essential, plus, social, ratio, product_only)| {
                let catalog = catalog(essential, plus, social);
                let options = ExpandOptions {
                    aspect_ratio: ratio,
                    product_only,
                };
                let count = |pack| expand(pack, &catalog, &options).unwrap().len();

                prop_assert_eq!(count(PackKind::Essential), essential);
                prop_assert_eq!(count(PackKind::Plus), essential + plus);
                prop_assert_eq!(count(PackKind::Social), social * 2);
                prop_assert_eq!(count(PackKind::Complete), essential + social * 2);
                Ok(())
            },
        )
        .unwrap();
}

/// Test that expansion is deterministic and indices match positions
#[test]
fn test_pack_expansion_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(1usize..5, 0usize..4, 0usize..4, aspect_ratio(), any::<bool>()),
            |(essential, plus, social, ratio, product_only)| {
                let catalog = catalog(essential, plus, social);
                let options = ExpandOptions {
                    aspect_ratio: ratio,
                    product_only,
                };
                for pack in PackKind::ALL {
                    let first = expand(pack, &catalog, &options).unwrap();
                    let second = expand(pack, &catalog, &options).unwrap();
                    prop_assert_eq!(&first, &second);
                    for (position, job) in first.iter().enumerate() {
                        prop_assert_eq!(job.index, position);
                    }
                    // e-commerce shots use the session ratio, social shots carry their own
                    for job in &first {
                        if job.shot_id.starts_with('s') {
                            prop_assert_eq!(job.overrides.aspect_ratio, Some(job.aspect_ratio));
                        } else {
                            prop_assert_eq!(job.aspect_ratio, ratio);
                        }
                        prop_assert_eq!(job.overrides.focal_length.is_some(), product_only);
                    }
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Test that the governor admits exactly `limit` requests inside one window
#[test]
fn test_governor_admission_bound_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(1u32..30, 0u32..30), |(limit, requests)| {
            let governor = RequestGovernor::new();
            let admitted = (0..requests)
                .filter(|_| governor.admit(Some(limit)))
                .count() as u32;
            prop_assert_eq!(admitted, requests.min(limit));
            prop_assert_eq!(governor.admit(Some(limit)), requests < limit);
            Ok(())
        })
        .unwrap();
}
