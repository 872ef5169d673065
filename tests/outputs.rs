use std::sync::Arc;

use hexmap::{
    config::AppConfig,
    generator::{GenerationRequest, MapGenerator},
    render::{PngRenderer, Renderer},
    tables::TerrainTables,
    terrain::TerrainKind,
};
use tempfile::tempdir;

#[test]
fn generate_and_render_writes_png() {
    let temp = tempdir().expect("tempdir");
    let output = temp.path().join("static").join("map.png");

    let generator = MapGenerator::default();
    let request = GenerationRequest::new(5, 7).with_seed(3);
    let map = generator
        .generate_and_render(&request, &PngRenderer::new(12), &output)
        .expect("render succeeds");

    assert!(output.exists(), "expected {} to exist", output.display());
    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
    assert_eq!(map.tiles().len(), 35);
}

#[test]
fn renderer_output_is_stable_for_a_seed() {
    let temp = tempdir().expect("tempdir");
    let generator = MapGenerator::default();
    let request = GenerationRequest::new(4, 4).with_seed(10);
    let renderer = PngRenderer::default();

    let first = temp.path().join("a.png");
    let second = temp.path().join("b.png");
    let map_a = generator.generate(&request).unwrap();
    let map_b = generator.generate(&request).unwrap();
    renderer.render(&map_a, &first).unwrap();
    renderer.render(&map_b, &second).unwrap();

    assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
}

#[test]
fn map_serializes_to_json() {
    let generator = MapGenerator::default();
    let map = generator
        .generate(&GenerationRequest::new(2, 2).with_seed(1))
        .unwrap();

    let value = serde_json::to_value(&map).unwrap();
    assert_eq!(value["rows"], 2);
    assert_eq!(value["cols"], 2);
    assert_eq!(value["default_terrain"], "grass");
    let tiles = value["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 4);
    for tile in tiles {
        let name = tile["terrain_type"].as_str().unwrap();
        assert!(name.parse::<TerrainKind>().is_ok());
    }
}

#[test]
fn config_file_drives_generation() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("hexmap.yaml");
    std::fs::write(
        &path,
        r#"
map:
  rows: 3
  cols: 4
  default_terrain: water
  seed: 5
tables:
  probabilities:
    water: 1.0
    wetland: 1.0
  features:
    water: [reef]
  transitions:
    water: { water: 1.0 }
    wetland: { wetland: 1.0 }
"#,
    )
    .unwrap();

    let config = AppConfig::from_yaml(&path).expect("config loads");
    let generator = MapGenerator::new(Arc::new(config.terrain_tables()));
    let request = GenerationRequest::new(config.map.rows, config.map.cols)
        .with_default_terrain(config.map.default_terrain)
        .with_seed(config.map.seed.unwrap());
    let map = generator.generate(&request).unwrap();

    assert_eq!(map.tiles().len(), 12);
    for tile in map.tiles() {
        assert!(matches!(
            tile.terrain_type,
            TerrainKind::Water | TerrainKind::Wetland
        ));
        if tile.terrain_type == TerrainKind::Wetland {
            assert!(tile.terrain_feature.is_none());
        }
        assert!(tile.resource.is_none());
    }
}

#[test]
fn tables_file_rejects_dangling_transition() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("tables.yaml");
    std::fs::write(
        &path,
        "probabilities:\n  grass: 1.0\ntransitions:\n  grass: { desert: 0.5 }\n",
    )
    .unwrap();

    assert!(TerrainTables::from_yaml(&path).is_err());
}

#[test]
fn bundled_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/hexmap.yaml");
    let config = AppConfig::from_yaml(path).expect("bundled config parses");

    assert_eq!(config.map.rows, 16);
    assert_eq!(config.map.seed, Some(7));
    assert_eq!(config.server.max_dimension, 128);
    assert_eq!(config.terrain_tables(), TerrainTables::default());
}
