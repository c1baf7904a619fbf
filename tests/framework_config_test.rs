use confschema::framework::{self, ROOT};
use confschema::schema::ConfigPath;
use confschema::{
    normalize, section, ConfigError, NormalizedConfig, Normalizer, SchemaNode, SourceLoader,
};
use serde_json::{json, Value};
use std::io::Write;

fn tree() -> SchemaNode {
    framework::configuration(false).unwrap()
}

fn run(raw: Value) -> NormalizedConfig {
    normalize(&tree(), &raw).unwrap()
}

fn paths(err: &ConfigError) -> Vec<String> {
    err.errors()
        .iter()
        .filter_map(|e| e.path())
        .map(|p| p.to_string())
        .collect()
}

/// Only the router section and the cache warmer default survive.
#[test]
fn test_router_optional_fields_omitted() {
    let config = run(json!({"router": {"resource": "routing.yml"}}));
    assert_eq!(
        config.value(),
        &json!({"cache_warmer": true, "router": {"resource": "routing.yml"}})
    );
    assert_eq!(config.get_str("router.resource"), Some("routing.yml"));
    assert!(!config.contains("router.type"));
    assert!(!config.contains("router.cache_warmer"));
}

#[test]
fn test_router_requires_resource() {
    let err = normalize(&tree(), &json!({"router": {"type": "annotation"}})).unwrap_err();
    assert_eq!(
        err,
        ConfigError::MissingRequiredField {
            path: ConfigPath::root().key("framework").key("router").key("resource")
        }
    );
}

#[test]
fn test_kernel_debug_disables_cache_warmer_default() {
    let debug_tree = framework::configuration(true).unwrap();
    let config = normalize(&debug_tree, &json!({})).unwrap();
    assert_eq!(config.get_bool("cache_warmer"), Some(false));
}

#[test]
fn test_csrf_protection_shortcuts() {
    assert_eq!(
        run(json!({"csrf_protection": null})).get("csrf_protection"),
        Some(&json!({"enabled": true}))
    );
    assert_eq!(
        run(json!({"csrf_protection": true})).get("csrf_protection"),
        Some(&json!({"enabled": true}))
    );
    let explicit = json!({"enabled": false, "field_name": "x"});
    assert_eq!(
        run(json!({ "csrf_protection": explicit.clone() })).get("csrf_protection"),
        Some(&explicit)
    );
}

#[test]
fn test_esi_shortcut_and_string_booleans() {
    assert_eq!(run(json!({"esi": true})).get("esi"), Some(&json!({"enabled": true})));
    assert_eq!(
        run(json!({"esi": {"enabled": "false"}})).get("esi"),
        Some(&json!({"enabled": false}))
    );
}

#[test]
fn test_templating_engine_forms() {
    let single = run(json!({"templating": {"engine": "twig"}}));
    assert_eq!(single.get("templating.engines"), Some(&json!(["twig"])));

    let list = run(json!({"templating": {"engines": ["twig", "php"]}}));
    assert_eq!(list.get("templating.engines"), Some(&json!(["twig", "php"])));

    let tagged = run(json!({"templating": {"engine": [{"id": "twig"}, {"id": "php"}]}}));
    assert_eq!(tagged.get("templating.engines"), Some(&json!(["twig", "php"])));

    let err = normalize(&tree(), &json!({"templating": {"engines": []}})).unwrap_err();
    assert!(matches!(err, ConfigError::EmptyCollection { .. }));
    assert_eq!(paths(&err), ["framework.templating.engines"]);
}

#[test]
fn test_templating_defaults_empty_collections() {
    let config = run(json!({"templating": {"engines": "twig"}}));
    assert_eq!(
        config.get("templating"),
        Some(&json!({
            "assets_base_urls": [],
            "engines": ["twig"],
            "loaders": [],
            "packages": {}
        }))
    );
}

#[test]
fn test_templating_requires_engines() {
    let err = normalize(&tree(), &json!({"templating": {"cache": "/tmp"}})).unwrap_err();
    assert_eq!(paths(&err), ["framework.templating.engines"]);
}

#[test]
fn test_assets_base_urls_from_tag_style_values() {
    let config = run(json!({
        "templating": {
            "engines": ["twig"],
            "assets_base_url": [{"value": "http://cdn-a"}, "http://cdn-b"],
            "loader": "filesystem"
        }
    }));
    assert_eq!(
        config.get("templating.assets_base_urls"),
        Some(&json!(["http://cdn-a", "http://cdn-b"]))
    );
    assert_eq!(config.get("templating.loaders"), Some(&json!(["filesystem"])));
}

#[test]
fn test_packages_keyed_by_name() {
    let config = run(json!({
        "templating": {
            "engines": ["twig"],
            "package": [
                {"name": "images", "version": "v1", "base_url": [{"value": "http://img"}]},
                {"name": "css"}
            ]
        }
    }));
    assert_eq!(
        config.get("templating.packages"),
        Some(&json!({
            "images": {"version": "v1", "base_urls": ["http://img"]},
            "css": {"version": null, "base_urls": []}
        }))
    );
    let names: Vec<_> = config
        .get("templating.packages")
        .and_then(Value::as_object)
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(names, ["images", "css"]);
}

#[test]
fn test_packages_keyed_object_form() {
    let config = run(json!({
        "templating": {
            "engines": ["twig"],
            "packages": {"images": {"version": "v2", "base_urls": ["http://img"]}}
        }
    }));
    assert_eq!(config.get_str("templating.packages.images.version"), Some("v2"));
}

#[test]
fn test_duplicate_package_names() {
    let err = normalize(
        &tree(),
        &json!({"templating": {"engines": ["twig"], "packages": [{"name": "a"}, {"name": "a"}]}}),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateKey { ref key, .. } if key == "a"));
}

#[test]
fn test_singular_package_merges_with_keyed_plural() {
    let config = run(json!({
        "templating": {
            "engines": ["twig"],
            "package": {"name": "js"},
            "packages": {"css": {"version": "v3"}}
        }
    }));
    let names: Vec<_> = config
        .get("templating.packages")
        .and_then(Value::as_object)
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(names, ["js", "css"]);
}

#[test]
fn test_session_strips_pdo_prefix() {
    let config = run(json!({"session": {"pdo.db_table": "sessions", "name": "SID"}}));
    assert_eq!(
        config.get("session"),
        Some(&json!({"storage_id": "native", "name": "SID", "db_table": "sessions"}))
    );
    let session = config.get("session").and_then(Value::as_object).unwrap();
    assert!(!session.contains_key("pdo.db_table"));
}

#[test]
fn test_profiler_defaults() {
    let config = run(json!({"profiler": null}));
    assert_eq!(
        config.get("profiler"),
        Some(&json!({
            "only_exceptions": false,
            "dsn": "sqlite:%kernel.cache_dir%/profiler.db",
            "username": "",
            "password": "",
            "lifetime": 86400
        }))
    );
}

#[test]
fn test_translator_enabled_by_default() {
    let config = run(json!({"translator": {"fallback": "en"}}));
    assert_eq!(config.get("translator"), Some(&json!({"enabled": true, "fallback": "en"})));
}

#[test]
fn test_validation_namespace_moves_under_annotations() {
    let config = run(json!({
        "validation": {
            "enabled": true,
            "annotations": true,
            "namespace": {"prefix": "app", "value": "App\\Validator\\"}
        }
    }));
    assert_eq!(
        config.get("validation"),
        Some(&json!({
            "enabled": true,
            "annotations": {"namespaces": {"app": "App\\Validator\\"}}
        }))
    );
}

#[test]
fn test_validation_annotations_shortcut() {
    let config = run(json!({"validation": {"annotations": true}}));
    assert_eq!(config.get("validation.annotations"), Some(&json!({"namespaces": {}})));

    let keyed = run(json!({
        "validation": {"annotations": {"namespaces": [{"prefix": "x", "namespace": "X\\"}]}}
    }));
    assert_eq!(keyed.get_str("validation.annotations.namespaces.x"), Some("X\\"));
}

#[test]
fn test_every_independent_error_reported() {
    let err = normalize(
        &tree(),
        &json!({
            "bogus": 1,
            "esi": {"enabled": "sometimes"},
            "session": {"auto_start": [true]}
        }),
    )
    .unwrap_err();
    assert_eq!(
        paths(&err),
        ["framework", "framework.esi.enabled", "framework.session.auto_start"]
    );

    let raw = json!({"router": {}, "templating": {"engines": []}});
    let err = normalize(&tree(), &raw).unwrap_err();
    assert_eq!(
        paths(&err),
        ["framework.router.resource", "framework.templating.engines"]
    );
}

#[test]
fn test_type_error_does_not_hide_missing_fields() {
    let raw = json!({"esi": {"enabled": "sometimes"}, "router": {}});
    let err = normalize(&tree(), &raw).unwrap_err();
    assert_eq!(paths(&err), ["framework.esi.enabled", "framework.router.resource"]);

    let raw = json!({
        "session": {"auto_start": "later"},
        "templating": {"engines": [], "packages": [{"version": "v1"}]}
    });
    let err = normalize(&tree(), &raw).unwrap_err();
    assert_eq!(
        paths(&err),
        [
            "framework.session.auto_start",
            "framework.templating.packages[0].name",
            "framework.templating.engines"
        ]
    );
}

#[test]
fn test_every_keyless_singular_package_reported() {
    let raw = json!({
        "templating": {
            "engines": ["twig"],
            "package": [{"version": "v1"}, {"version": "v2"}],
            "packages": {"css": {}}
        }
    });
    let err = normalize(&tree(), &raw).unwrap_err();
    assert_eq!(
        paths(&err),
        [
            "framework.templating.packages[0].name",
            "framework.templating.packages[1].name"
        ]
    );
}

#[test]
fn test_layered_sources() {
    let base = json!({
        "router": {"resource": "routing.yml"},
        "profiler": {"matcher": {"ip": "127.0.0.1", "path": "^/admin"}},
        "templating": {"engines": ["twig"]}
    });
    let dev = json!({
        "router": {"resource": "routing_dev.yml"},
        "profiler": {"only_exceptions": true, "matcher": {"path": "^/dev"}},
        "templating": {"engine": "php"}
    });
    let config = Normalizer::new().process(&tree(), &[base, dev]).unwrap();
    assert_eq!(config.get_str("router.resource"), Some("routing_dev.yml"));
    assert_eq!(config.get("profiler.matcher"), Some(&json!({"path": "^/dev"})));
    assert_eq!(config.get_bool("profiler.only_exceptions"), Some(true));
    assert_eq!(config.get("templating.engines"), Some(&json!(["twig", "php"])));
}

#[test]
fn test_later_source_unsets_section() {
    let config = Normalizer::new()
        .process(&tree(), &[json!({"esi": true}), json!({"esi": false})])
        .unwrap();
    assert!(!config.contains("esi"));
}

#[test]
fn test_yaml_files_end_to_end() {
    let mut base = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    let base_yaml = concat!(
        "framework:\n",
        "  charset: UTF-8\n",
        "  router:\n",
        "    resource: \"%kernel.root_dir%/config/routing.yml\"\n",
        "  templating:\n",
        "    engines: [twig]\n",
    );
    write!(base, "{}", base_yaml).unwrap();
    let mut overrides = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    let overrides_json = r#"{"framework": {"test": true, "session": {"pdo.db_table": "s"}}}"#;
    write!(overrides, "{}", overrides_json).unwrap();
    let mut unrelated = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(unrelated, "twig:\n  debug: true\n").unwrap();

    let documents = SourceLoader::new()
        .load_all(&[base.path(), overrides.path(), unrelated.path()])
        .unwrap();
    let sources: Vec<Value> = documents.iter().filter_map(|d| section(d, ROOT)).collect();
    assert_eq!(sources.len(), 2);

    let config = Normalizer::new().process(&tree(), &sources).unwrap();
    assert_eq!(config.get_str("charset"), Some("UTF-8"));
    assert_eq!(config.get_bool("test"), Some(true));
    assert_eq!(config.get_str("session.db_table"), Some("s"));
    assert_eq!(
        config.get_str("router.resource"),
        Some("%kernel.root_dir%/config/routing.yml")
    );
    assert!(config.to_yaml().unwrap().contains("engines:"));
}
