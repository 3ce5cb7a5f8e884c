use std::path::{Path, PathBuf};

use frameup::{FrameupError, TemplateCatalog, TemplateDescriptor, shadow::ShadowSpec};
use kurbo::{Point, Vec2};

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("frameup_catalog_io").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_png(path: &Path, width: u32, height: u32, rgba: [u8; 4]) {
    let pixels: Vec<u8> = rgba
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect();
    image::save_buffer_with_format(
        path,
        &pixels,
        width,
        height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .unwrap();
}

fn write_catalog(path: &Path, descriptors: &[TemplateDescriptor]) {
    let json = serde_json::to_string_pretty(descriptors).unwrap();
    std::fs::write(path, json).unwrap();
}

fn descriptor(id: &str, background: &str) -> TemplateDescriptor {
    TemplateDescriptor {
        id: id.to_string(),
        background: PathBuf::from(background),
        corners: [
            Point::new(10.0, 10.0),
            Point::new(50.0, 10.0),
            Point::new(50.0, 40.0),
            Point::new(10.0, 40.0),
        ],
        light: Default::default(),
        shadow: Some(ShadowSpec {
            offset: Vec2::new(3.0, 3.0),
            blur_radius: 2,
            opacity: 0.35,
        }),
        occlusion: None,
        focal_point: None,
    }
}

#[test]
fn loads_a_valid_catalog_from_disk() {
    let dir = fixture_dir("valid");
    write_png(&dir.join("living_room.png"), 64, 48, [140, 140, 150, 255]);
    write_png(&dir.join("gallery.png"), 80, 60, [220, 220, 220, 255]);

    let catalog_path = dir.join("catalog.json");
    write_catalog(
        &catalog_path,
        &[
            descriptor("living_room", "living_room.png"),
            descriptor("gallery", "gallery.png"),
        ],
    );

    let catalog = TemplateCatalog::load(&catalog_path).unwrap();
    assert_eq!(catalog.len(), 2);

    let template = catalog.get("living_room").unwrap();
    assert_eq!((template.background.width, template.background.height), (64, 48));
    assert!(template.shadow.is_some());

    assert!(matches!(
        catalog.get("attic").unwrap_err(),
        FrameupError::TemplateNotFound(_)
    ));
}

#[test]
fn missing_background_fails_the_whole_load() {
    let dir = fixture_dir("missing_background");
    write_png(&dir.join("present.png"), 64, 48, [140, 140, 150, 255]);

    let catalog_path = dir.join("catalog.json");
    write_catalog(
        &catalog_path,
        &[
            descriptor("present", "present.png"),
            descriptor("absent", "absent.png"),
        ],
    );

    assert!(TemplateCatalog::load(&catalog_path).is_err());
}

#[test]
fn occlusion_size_mismatch_fails_the_load() {
    let dir = fixture_dir("occlusion_mismatch");
    write_png(&dir.join("bg.png"), 64, 48, [140, 140, 150, 255]);
    write_png(&dir.join("occ.png"), 32, 32, [0, 0, 0, 0]);

    let mut bad = descriptor("mismatched", "bg.png");
    bad.occlusion = Some(PathBuf::from("occ.png"));

    let catalog_path = dir.join("catalog.json");
    write_catalog(&catalog_path, &[bad]);

    let err = TemplateCatalog::load(&catalog_path).unwrap_err();
    assert!(matches!(err, FrameupError::DimensionMismatch(_)));
}

#[test]
fn degenerate_corners_fail_the_load() {
    let dir = fixture_dir("degenerate_corners");
    write_png(&dir.join("bg.png"), 64, 48, [140, 140, 150, 255]);

    let mut bad = descriptor("flat", "bg.png");
    bad.corners = [
        Point::new(0.0, 0.0),
        Point::new(20.0, 0.0),
        Point::new(40.0, 0.0),
        Point::new(0.0, 30.0),
    ];

    let catalog_path = dir.join("catalog.json");
    write_catalog(&catalog_path, &[bad]);

    let err = TemplateCatalog::load(&catalog_path).unwrap_err();
    assert!(matches!(err, FrameupError::DegenerateGeometry(_)));
}

#[test]
fn malformed_json_is_rejected() {
    let dir = fixture_dir("malformed_json");
    let catalog_path = dir.join("catalog.json");
    std::fs::write(&catalog_path, b"{ not json ]").unwrap();

    assert!(TemplateCatalog::load(&catalog_path).is_err());
}
