// Tests for the SQLite asset registry

use std::fs;
use sweeper_core::registry::AssetRegistry;
use sweeper_core::remove::AssetDeleter;
use sweeper_scanner::{AssetId, DependencyService, LookupError, ModuleScope};
use tempfile::TempDir;

fn create_test_registry() -> (TempDir, AssetRegistry) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("registry.db");
    let registry = AssetRegistry::open(&db_path).unwrap();
    (temp_dir, registry)
}

fn id(s: &str) -> AssetId {
    AssetId::new(s)
}

// ============================================================================
// Registry Creation Tests
// ============================================================================

#[test]
fn test_registry_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("registry.db");

    let registry = AssetRegistry::open(&db_path);
    assert!(registry.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_registry_exists_and_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("registry.db");
    assert!(!AssetRegistry::exists(&db_path));

    {
        let _registry = AssetRegistry::open(&db_path).unwrap();
    }
    assert!(AssetRegistry::exists(&db_path));

    AssetRegistry::drop(&db_path).unwrap();
    assert!(!AssetRegistry::exists(&db_path));
}

#[test]
fn test_registry_persists_between_opens() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("registry.db");

    {
        let registry = AssetRegistry::open(&db_path).unwrap();
        registry.add_dependency("/Mod/A", "/Ext/Z").unwrap();
    }

    let registry = AssetRegistry::open(&db_path).unwrap();
    assert_eq!(registry.dependency_count().unwrap(), 1);
}

// ============================================================================
// Manifest Import Tests
// ============================================================================

#[test]
fn test_import_edges_from_file() {
    let (temp_dir, registry) = create_test_registry();
    let manifest = temp_dir.path().join("deps.csv");
    fs::write(
        &manifest,
        "Asset,Dependency\n/Mod/A,/Ext/Z\n/Mod/A,/Mod/B\n/Mod/Lonely,\n/Mod/A,/ext/z\n",
    )
    .unwrap();

    let added = registry.import_edges(&manifest).unwrap();

    assert_eq!(added, 2);
    assert_eq!(registry.asset_count().unwrap(), 4);
    assert!(registry.contains(&id("/mod/lonely")).unwrap());
}

#[test]
fn test_import_rejects_missing_column() {
    let (_temp_dir, registry) = create_test_registry();
    let result = registry.import_edges_str("From,To\n/a,/b\n");
    assert!(result.is_err());
    assert_eq!(registry.asset_count().unwrap(), 0);
}

#[test]
fn test_import_is_all_or_nothing() {
    let (_temp_dir, registry) = create_test_registry();
    let result = registry.import_edges_str("Asset,Dependency\n/Mod/A,/Ext/Z\n,/Ext/Y\n");
    assert!(result.is_err());
    assert_eq!(registry.dependency_count().unwrap(), 0);
}

#[test]
fn test_import_missing_file() {
    let (temp_dir, registry) = create_test_registry();
    let result = registry.import_edges(&temp_dir.path().join("nope.csv"));
    assert!(result.is_err());
}

// ============================================================================
// Dependency Service Tests
// ============================================================================

#[test]
fn test_direct_dependencies_sorted() {
    let (_temp_dir, registry) = create_test_registry();
    registry.add_dependency("/Mod/A", "/Ext/Zeta").unwrap();
    registry.add_dependency("/Mod/A", "/Ext/Alpha").unwrap();

    let deps = registry.direct_dependencies(&id("/mod/a")).unwrap();
    assert_eq!(deps, vec![id("/Ext/Alpha"), id("/Ext/Zeta")]);
}

#[test]
fn test_referencers_stop_at_scope() {
    let (_temp_dir, registry) = create_test_registry();
    // /Mod/Top -> /Ext/Mid -> /Ext/Leaf, /Other/X -> /Mod/Top
    registry.add_dependency("/Mod/Top", "/Ext/Mid").unwrap();
    registry.add_dependency("/Ext/Mid", "/Ext/Leaf").unwrap();
    registry.add_dependency("/Other/X", "/Mod/Top").unwrap();

    let found = registry
        .referencers_reachable_from(&id("/Ext/Leaf"), &ModuleScope::new("Mod"))
        .unwrap();

    assert_eq!(found, vec![id("/Ext/Mid"), id("/Mod/Top")]);
}

#[test]
fn test_referencers_of_missing_asset() {
    let (_temp_dir, registry) = create_test_registry();
    let err = registry
        .referencers_reachable_from(&id("/Ext/Ghost"), &ModuleScope::new("Mod"))
        .unwrap_err();
    assert!(matches!(err, LookupError::NotFound(_)));
}

#[test]
fn test_assets_under_path_is_prefix_not_pattern() {
    let (_temp_dir, registry) = create_test_registry();
    registry.add_asset("/My_Mod/A").unwrap();
    registry.add_asset("/MyXMod/B").unwrap();
    registry.add_asset("/My_Mod/Sub/C").unwrap();

    let under = registry.assets_under("/my_mod").unwrap();
    assert_eq!(under, vec![id("/My_Mod/A"), id("/My_Mod/Sub/C")]);
}

// ============================================================================
// Deletion Tests
// ============================================================================

#[test]
fn test_delete_asset_removes_edges() {
    let (_temp_dir, registry) = create_test_registry();
    registry.add_dependency("/Mod/A", "/Ext/Z").unwrap();
    registry.add_dependency("/Ext/Z", "/Ext/Y").unwrap();

    registry.delete_asset(&id("/ext/z")).unwrap();

    assert_eq!(registry.dependency_count().unwrap(), 0);
    assert_eq!(registry.asset_count().unwrap(), 2);
    assert!(registry.direct_dependencies(&id("/Mod/A")).unwrap().is_empty());
}
