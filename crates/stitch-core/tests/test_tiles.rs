mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

use stitch_core::tile::{Rect, Roi, RoiShape, Tile, TileData};
use stitch_core::{register_pair, register_pairs, RoiPolicy, StitchError, StitchingParameters};

use common::{crop, init_tracing, noise, noise_u8};

fn integer_params() -> StitchingParameters {
    StitchingParameters {
        subpixel_accuracy: false,
        ..StitchingParameters::default()
    }
}

#[test]
fn test_all_encoding_pairs_agree() {
    let base = noise_u8(&[80, 80], 21);
    let first = crop(&base, &[8, 8], &[64, 64]);
    let second = crop(&base, &[12, 15], &[64, 64]);

    let encode = |data: &ndarray::ArrayD<u8>| -> Vec<TileData> {
        vec![
            TileData::UInt8(data.clone()),
            TileData::UInt16(data.mapv(|v| v as u16 * 257)),
            TileData::Float32(data.mapv(|v| v as f32 / 255.0)),
        ]
    };

    for a in encode(&first) {
        for b in encode(&second) {
            let tile1 = Tile::new("first", a.clone());
            let tile2 = Tile::new("second", b);
            let result = register_pair(&tile1, &tile2, &integer_params()).unwrap();
            assert_eq!(result.shift, vec![4.0, 7.0]);
        }
    }
}

#[test]
fn test_unsupported_encoding_is_recoverable() {
    init_tracing();
    let good = Tile::new("good", noise(&[32, 32], 22));
    let rgb = Tile::from_dynamic_image("rgb", &DynamicImage::new_rgb8(32, 32));

    let err = register_pair(&good, &rgb, &StitchingParameters::default()).unwrap_err();
    assert!(matches!(err, StitchError::UnsupportedEncoding { .. }));
    assert!(err.is_recoverable());
    assert!(err.to_string().contains("rgb"));

    let err = register_pair(&rgb, &good, &StitchingParameters::default()).unwrap_err();
    assert!(err.is_recoverable());
}

#[test]
fn test_batch_continues_past_skipped_pairs() {
    init_tracing();
    let base = noise(&[80, 80], 23);
    let tiles = vec![
        Tile::new("a", crop(&base, &[0, 0], &[64, 64])),
        Tile::new("b", crop(&base, &[5, 3], &[64, 64])),
        Tile::new("c", TileData::Unsupported("Rgba16".into())),
        Tile::new("d", crop(&base, &[10, 12], &[64, 64])),
    ];
    let pairs = [(0, 1), (1, 2), (0, 3), (2, 3), (0, 9)];
    let done = AtomicUsize::new(0);

    let results = register_pairs(&tiles, &pairs, &integer_params(), |_| {
        done.fetch_add(1, Ordering::Relaxed);
    });

    assert_eq!(done.load(Ordering::Relaxed), pairs.len());
    assert_eq!(results.len(), pairs.len());
    assert_eq!(results[0].result().unwrap().shift, vec![5.0, 3.0]);
    assert!(results[1].result().is_none());
    assert_eq!(results[2].result().unwrap().shift, vec![10.0, 12.0]);
    assert!(matches!(
        results[3].outcome,
        Err(StitchError::UnsupportedEncoding { .. })
    ));
    assert!(matches!(
        results[4].outcome,
        Err(StitchError::InvalidParameters(_))
    ));
    for (entry, &(first, second)) in results.iter().zip(&pairs) {
        assert_eq!((entry.first, entry.second), (first, second));
    }
}

#[test]
fn test_non_rectangular_roi_matches_full_image() {
    init_tracing();
    let base = noise(&[80, 80], 24);
    let img1 = crop(&base, &[4, 4], &[64, 64]);
    let img2 = crop(&base, &[9, 1], &[64, 64]);

    let plain = register_pair(
        &Tile::new("one", img1.clone()),
        &Tile::new("two", img2.clone()),
        &StitchingParameters::default(),
    )
    .unwrap();

    let oval = Roi {
        shape: RoiShape::Oval,
        bounds: Rect::from_xywh(10, 10, 20, 20),
    };
    let with_oval = register_pair(
        &Tile::new("one", img1).with_roi(oval),
        &Tile::new("two", img2),
        &StitchingParameters::default(),
    )
    .unwrap();

    assert_eq!(plain.shift, with_oval.shift);
    assert_eq!(plain.integer_shift, vec![5, -3]);
}

#[test]
fn test_rectangular_roi_restricts_sampling() {
    let base = noise(&[96, 96], 25);
    let tile1 = Tile::new("wide", crop(&base, &[0, 0], &[80, 80]))
        .with_roi(Roi::rectangle(Rect::from_xywh(8, 8, 64, 64)));
    let tile2 = Tile::new("narrow", crop(&base, &[13, 4], &[64, 64]));

    let result = register_pair(&tile1, &tile2, &integer_params()).unwrap();
    assert_eq!(result.shift, vec![5.0, -4.0]);

    let ignored = StitchingParameters {
        roi_policy: RoiPolicy::Ignore,
        ..integer_params()
    };
    let result = register_pair(&tile1, &tile2, &ignored).unwrap();
    assert_eq!(result.shift, vec![13.0, 4.0]);
}

#[test]
fn test_dynamic_image_tiles() {
    let base = noise_u8(&[72, 72], 26);
    let to_image = |origin: [usize; 2]| -> DynamicImage {
        let window = crop(&base, &origin, &[64, 64]);
        let buf: GrayImage = ImageBuffer::from_fn(64, 64, |x, y| {
            Luma([window[[y as usize, x as usize]]])
        });
        DynamicImage::ImageLuma8(buf)
    };

    let tile1 = Tile::from_dynamic_image("left", &to_image([2, 2]));
    let tile2 = Tile::from_dynamic_image("right", &to_image([5, 8]));
    let result = register_pair(&tile1, &tile2, &integer_params()).unwrap();
    assert_eq!(result.shift, vec![3.0, 6.0]);
}
