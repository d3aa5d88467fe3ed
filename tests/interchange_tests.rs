//! End-to-end tests for loading and saving interchange trees
//!
//! Each test builds a small tree in a temp directory, loads it into a fresh
//! database and checks the resulting hierarchy, values or error.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use vault_yaml::{
    fingerprint, Database, DatabaseKind, FieldKey, InterchangeError, Number, Value, YamlStorage,
};

const INFO: &str = r#"
PrimaryVaultName: db
Classes:
  - Name: car
    Fields:
      - {Name: CollectionName, TypeName: "EA::Reflection::Text", Alignment: 4, Flags: 0, MaxCount: 1, Size: 4, Offset: 0}
      - {Name: Speed, TypeName: "EA::Reflection::Float", Alignment: 4, Flags: 2, MaxCount: 1, Size: 4, Offset: 4}
      - {Name: Gears, TypeName: "EA::Reflection::UInt8", Alignment: 1, Flags: 1, MaxCount: 4, Size: 1, Offset: 0}
      - {Name: Icon, TypeName: "Attrib::Blob", Alignment: 4, Flags: 0, MaxCount: 1, Size: 8, Offset: 0}
      - {Name: Ref, TypeName: "Attrib::RefSpec", Alignment: 4, Flags: 0, MaxCount: 1, Size: 12, Offset: 0}
      - Name: Tint
        TypeName: "Attrib::Types::Vector3"
        Alignment: 4
        Flags: 4
        MaxCount: 1
        Size: 12
        Offset: 0
        StaticValue: {X: 1.0, Y: 0.5, Z: 0.0}
Types:
  - {Name: "EA::Reflection::Float", Size: 4}
Files:
  - {Name: gameplay, Group: main, Vaults: [db, tuning]}
  - {Name: extras, Group: dlc, Vaults: [bonus]}
"#;

const DB_CARS: &str = r#"
- Name: default
  Data:
    CollectionName: default
    Speed: 1.5
    Gears: {Capacity: 4, Data: [1, 2, 3]}
- Name: fast
  ParentName: default
  Data:
    Speed: 9
    Ref: {ClassKey: '0x10', CollectionKey: 3}
"#;

const TUNING_CARS: &str = r#"
- Name: tuned
  ParentName: fast
  Data:
    Icon: _blobs/car_tuned_Icon.bin
"#;

fn write(root: &Path, relative: &str, content: impl AsRef<[u8]>) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "info.yml", INFO);
    write(root, "main/gameplay/db/car.yml", DB_CARS);
    write(root, "main/gameplay/tuning/car.yml", TUNING_CARS);
    write(root, "main/gameplay/tuning/_blobs/car_tuned_Icon.bin", [0xCAu8, 0xFE, 0x01]);
    dir
}

fn load(root: &Path) -> Result<Database, InterchangeError> {
    let mut database = Database::new(DatabaseKind::X64);
    YamlStorage::new().load(root, &mut database, None)?;
    Ok(database)
}

fn value<'a>(database: &'a Database, name: &str, field: &str) -> Option<&'a Value> {
    let id = database.find_collection("car", name).unwrap();
    database.get_value(id, field).unwrap()
}

/// Path -> (parent path, sorted field data) for every collection
fn snapshot(database: &Database) -> BTreeMap<String, (Option<String>, Vec<(FieldKey, Value)>)> {
    database
        .collections
        .iter()
        .map(|(id, collection)| {
            let parent = database
                .collections
                .parent(id)
                .and_then(|p| database.collections.find(p))
                .map(|p| p.short_path());
            let mut data: Vec<_> = collection
                .data
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect();
            data.sort_by_key(|(k, _)| *k);
            (collection.short_path(), (parent, data))
        })
        .collect()
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_builds_cross_vault_hierarchy() {
    let dir = fixture();
    let mut database = Database::new(DatabaseKind::X64);
    let files = YamlStorage::new()
        .load(dir.path(), &mut database, None)
        .unwrap();

    assert_eq!(files.len(), 2);
    let vaults: Vec<_> = database.vaults.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(vaults, vec!["db", "tuning", "bonus"]);
    assert_eq!(database.primary_vault().unwrap().name, "db");

    let default = database.find_collection("car", "default").unwrap();
    let fast = database.find_collection("car", "fast").unwrap();
    let tuned = database.find_collection("car", "tuned").unwrap();
    assert_eq!(database.collections.roots(), &[default]);
    assert_eq!(database.collections.parent(fast), Some(default));
    assert_eq!(database.collections.parent(tuned), Some(fast));
    assert_eq!(database.collections.find(tuned).unwrap().vault, "tuning");
}

#[test]
fn test_load_decodes_typed_values() {
    let dir = fixture();
    let database = load(dir.path()).unwrap();

    assert_eq!(
        value(&database, "fast", "Speed"),
        Some(&Value::Number(Number::F32(9.0)))
    );
    let gears = value(&database, "default", "Gears").unwrap().as_array().unwrap();
    assert_eq!(gears.capacity, 4);
    assert_eq!(gears.items[2], Value::Number(Number::U8(3)));

    let reference = value(&database, "fast", "Ref").unwrap().as_struct().unwrap();
    assert_eq!(reference.get("ClassKey"), Some(&Value::Number(Number::U32(16))));

    assert_eq!(
        value(&database, "tuned", "Icon"),
        Some(&Value::Blob(vec![0xCA, 0xFE, 0x01]))
    );
    assert_eq!(value(&database, "tuned", "Speed"), None);

    let tint = database.schema.field("car", "Tint").unwrap();
    let tint = tint.static_value.as_ref().unwrap().as_struct().unwrap();
    assert_eq!(tint.get("Y"), Some(&Value::Number(Number::F32(0.5))));
    assert_eq!(database.schema.types().len(), 1);
}

#[test]
fn test_x86_database_uses_32_bit_keys() {
    let dir = fixture();
    let mut database = Database::new(DatabaseKind::X86);
    YamlStorage::new().load(dir.path(), &mut database, None).unwrap();
    let class = database.schema.find_class("car").unwrap();
    assert!(class.fields().iter().all(|f| f.key.0 <= u64::from(u32::MAX)));
}

#[test]
fn test_null_entry_becomes_empty_text() {
    let dir = fixture();
    write(
        dir.path(),
        "main/gameplay/db/car.yml",
        "- Name: default\n  Data:\n    CollectionName: ~\n",
    );
    write(dir.path(), "main/gameplay/tuning/car.yml", "");
    let database = load(dir.path()).unwrap();
    assert_eq!(value(&database, "default", "CollectionName"), Some(&Value::from("")));
}

#[test]
fn test_plain_scalars_keep_their_text() {
    let dir = fixture();
    write(
        dir.path(),
        "main/gameplay/db/car.yml",
        "- Name: default\n  Data:\n    CollectionName: 0x1F\n\
         - Name: 007\n  ParentName: default\n  Data:\n    CollectionName: 1.10\n    \
         Speed: 1.10\n    Gears: {Capacity: 4, Data: [0x1F, 007, +5]}\n",
    );
    write(dir.path(), "main/gameplay/tuning/car.yml", "");
    let storage = YamlStorage::new();
    let mut database = Database::new(DatabaseKind::X64);
    let files = storage.load(dir.path(), &mut database, None).unwrap();

    assert_eq!(value(&database, "default", "CollectionName"), Some(&Value::from("0x1F")));
    assert_eq!(value(&database, "007", "CollectionName"), Some(&Value::from("1.10")));
    assert_eq!(
        value(&database, "007", "Speed"),
        Some(&Value::Number(Number::F32(1.1)))
    );
    let gears = value(&database, "007", "Gears").unwrap().as_array().unwrap();
    assert_eq!(
        gears.items,
        vec![
            Value::Number(Number::U8(31)),
            Value::Number(Number::U8(7)),
            Value::Number(Number::U8(5)),
        ]
    );

    let out = tempfile::tempdir().unwrap();
    storage.save(&database, out.path(), &files).unwrap();
    let reloaded = load(out.path()).unwrap();
    assert_eq!(snapshot(&reloaded), snapshot(&database));
}

#[test]
fn test_file_filter() {
    let dir = fixture();
    let mut database = Database::new(DatabaseKind::X64);
    let only = vec!["extras".to_string()];
    let files = YamlStorage::new()
        .load(dir.path(), &mut database, Some(only.as_slice()))
        .unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "extras");
    assert_eq!(database.vaults.len(), 1);
    assert!(database.collections.is_empty());
    // The schema is loaded regardless of the filter
    assert!(database.schema.find_class("car").is_some());
}

// =============================================================================
// Load failures
// =============================================================================

#[test]
fn test_duplicate_collection_across_vaults() {
    let dir = fixture();
    write(
        dir.path(),
        "main/gameplay/tuning/car.yml",
        "- Name: fast\n  Data: {}\n",
    );

    let mut database = Database::new(DatabaseKind::X64);
    let err = YamlStorage::new()
        .load(dir.path(), &mut database, None)
        .unwrap_err();
    assert!(matches!(err, InterchangeError::DuplicateCollectionPath(ref p) if p == "car/fast"));

    // Nothing was committed
    assert!(database.vaults.is_empty());
    assert!(database.collections.is_empty());
    assert!(database.schema.classes().is_empty());
}

#[test]
fn test_array_limits_enforced() {
    let dir = fixture();
    write(
        dir.path(),
        "main/gameplay/db/car.yml",
        "- Name: default\n  Data:\n    Gears: {Capacity: 5, Data: [1]}\n",
    );
    write(dir.path(), "main/gameplay/tuning/car.yml", "");
    assert!(matches!(
        load(dir.path()),
        Err(InterchangeError::ArrayExceedsFieldLimit { max_count: 4, capacity: 5, .. })
    ));

    write(
        dir.path(),
        "main/gameplay/db/car.yml",
        "- Name: default\n  Data:\n    Gears: {Capacity: 3, Data: [1, 2, 3, 4]}\n",
    );
    match load(dir.path()) {
        Err(InterchangeError::ArrayOverCapacity {
            collection, field, ..
        }) => {
            assert_eq!(collection, "car/default");
            assert_eq!(field, "Gears");
        }
        other => panic!("Expected ArrayOverCapacity, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_mutual_vault_dependency() {
    let dir = fixture();
    write(
        dir.path(),
        "main/gameplay/db/car.yml",
        "- Name: a\n  ParentName: b\n  Data: {}\n",
    );
    write(
        dir.path(),
        "main/gameplay/tuning/car.yml",
        "- Name: b\n  ParentName: a\n  Data: {}\n",
    );

    match load(dir.path()) {
        Err(InterchangeError::UnresolvedVaultDependencies { mut vaults }) => {
            vaults.sort();
            assert_eq!(vaults, vec!["db", "tuning"]);
        }
        other => panic!("Expected UnresolvedVaultDependencies, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_parent_fails_load() {
    let dir = fixture();
    write(
        dir.path(),
        "main/gameplay/tuning/car.yml",
        "- Name: tuned\n  ParentName: ghost\n  Data: {}\n",
    );
    assert!(matches!(
        load(dir.path()),
        Err(InterchangeError::UnresolvedVaultDependencies { ref vaults }) if vaults == &["tuning"]
    ));
}

#[test]
fn test_unknown_class_and_field() {
    let dir = fixture();
    write(dir.path(), "main/gameplay/db/truck.yml", "- Name: t\n  Data: {}\n");
    assert!(matches!(
        load(dir.path()),
        Err(InterchangeError::UnknownClass { ref class, .. }) if class == "truck"
    ));

    let dir = fixture();
    write(
        dir.path(),
        "main/gameplay/db/car.yml",
        "- Name: default\n  Data:\n    Mass: 1200\n",
    );
    assert!(matches!(
        load(dir.path()),
        Err(InterchangeError::UnknownField { ref field, .. }) if field == "Mass"
    ));
}

#[test]
fn test_missing_blob_file() {
    let dir = fixture();
    fs::remove_file(dir.path().join("main/gameplay/tuning/_blobs/car_tuned_Icon.bin")).unwrap();
    assert!(matches!(
        load(dir.path()),
        Err(InterchangeError::MissingBlobFile { ref collection, .. }) if collection == "car/tuned"
    ));
}

#[test]
fn test_missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(load(dir.path()), Err(InterchangeError::Manifest(_))));
}

// =============================================================================
// Saving
// =============================================================================

#[test]
fn test_save_then_load_preserves_database() {
    let dir = fixture();
    let storage = YamlStorage::new();
    let mut database = Database::new(DatabaseKind::X64);
    let files = storage.load(dir.path(), &mut database, None).unwrap();

    let out = tempfile::tempdir().unwrap();
    storage.save(&database, out.path(), &files).unwrap();

    assert!(out.path().join("info.yml").is_file());
    assert!(out.path().join("main/gameplay/db/car.yml").is_file());
    assert!(out
        .path()
        .join("main/gameplay/tuning/_blobs/car_tuned_Icon.bin")
        .is_file());
    assert!(out.path().join("dlc/extras/bonus").is_dir());

    let reloaded = load(out.path()).unwrap();
    assert_eq!(snapshot(&reloaded), snapshot(&database));
    assert_eq!(
        reloaded.schema.field("car", "Tint").unwrap().static_value,
        database.schema.field("car", "Tint").unwrap().static_value
    );
    assert_eq!(reloaded.primary_vault().unwrap().name, "db");
}

#[test]
fn test_saved_records_name_their_parent() {
    let dir = fixture();
    let database = load(dir.path()).unwrap();
    let files = YamlStorage::new().load_manifest(dir.path()).unwrap().files;

    let out = tempfile::tempdir().unwrap();
    YamlStorage::new().save(&database, out.path(), &files).unwrap();

    let text = fs::read_to_string(out.path().join("main/gameplay/tuning/car.yml")).unwrap();
    assert!(text.contains("ParentName: fast"));
    let text = fs::read_to_string(out.path().join("main/gameplay/db/car.yml")).unwrap();
    assert!(text.contains("Capacity: 4"));
    // Read-only struct properties are not written
    assert!(!text.contains("CollectionPtr"));
}

#[test]
fn test_empty_blob_is_not_written() {
    let dir = fixture();
    let storage = YamlStorage::new();
    let mut database = Database::new(DatabaseKind::X64);
    let files = storage.load(dir.path(), &mut database, None).unwrap();

    let tuned = database.find_collection("car", "tuned").unwrap();
    database.set_value(tuned, "Icon", Value::Blob(Vec::new())).unwrap();

    let out = tempfile::tempdir().unwrap();
    storage.save(&database, out.path(), &files).unwrap();
    assert!(!out.path().join("main/gameplay/tuning/_blobs").exists());

    let reloaded = load(out.path()).unwrap();
    assert_eq!(value(&reloaded, "tuned", "Icon"), Some(&Value::Blob(Vec::new())));
}

#[test]
fn test_edits_survive_save() {
    let dir = fixture();
    let storage = YamlStorage::new();
    let mut database = Database::new(DatabaseKind::X64);
    let files = storage.load(dir.path(), &mut database, None).unwrap();

    let fast = database.find_collection("car", "fast").unwrap();
    let copy = database.copy_collection(fast, "faster", Some(fast)).unwrap();
    database
        .set_value(copy, "Speed", Value::Number(Number::F32(12.5)))
        .unwrap();
    let tuned = database.find_collection("car", "tuned").unwrap();
    database.move_collection(tuned, None).unwrap();

    let out = tempfile::tempdir().unwrap();
    storage.save(&database, out.path(), &files).unwrap();
    let reloaded = load(out.path()).unwrap();

    let faster = reloaded.find_collection("car", "faster").unwrap();
    assert_eq!(
        reloaded.collections.parent(faster),
        reloaded.find_collection("car", "fast")
    );
    assert_eq!(
        value(&reloaded, "faster", "CollectionName"),
        Some(&Value::from("faster"))
    );
    let tuned = reloaded.find_collection("car", "tuned").unwrap();
    assert_eq!(reloaded.collections.parent(tuned), None);
}

// =============================================================================
// Fingerprints
// =============================================================================

#[test]
fn test_fingerprint_per_file_group() {
    let dir = fixture();
    let storage = YamlStorage::new();
    let manifest = storage.load_manifest(dir.path()).unwrap();
    let gameplay = &manifest.files[0];
    let extras = &manifest.files[1];

    let first = storage.fingerprint(dir.path(), gameplay).unwrap();
    assert_eq!(first, storage.fingerprint(dir.path(), gameplay).unwrap());
    assert_eq!(first, fingerprint(&dir.path().join("main/gameplay")).unwrap());
    assert_eq!(storage.fingerprint(dir.path(), extras).unwrap(), "");

    write(
        dir.path(),
        "main/gameplay/tuning/_blobs/car_tuned_Icon.bin",
        [0xCAu8, 0xFE, 0x02],
    );
    assert_ne!(first, storage.fingerprint(dir.path(), gameplay).unwrap());
}

#[test]
fn test_saved_trees_fingerprint_identically() {
    let dir = fixture();
    let storage = YamlStorage::new();
    let mut database = Database::new(DatabaseKind::X64);
    let files = storage.load(dir.path(), &mut database, None).unwrap();

    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    storage.save(&database, a.path(), &files).unwrap();
    storage.save(&database, b.path(), &files).unwrap();

    for file in &files {
        assert_eq!(
            storage.fingerprint(a.path(), file).unwrap(),
            storage.fingerprint(b.path(), file).unwrap()
        );
    }
}
