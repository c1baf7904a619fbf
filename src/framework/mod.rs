// Web framework bundle configuration tree
//
// The `framework` section of an application's configuration: top-level
// switches plus one optional section per subsystem (CSRF protection, ESI,
// profiler, router, session, templating, translator, validation). Wiring code
// reads the normalized result by path, e.g. `router.resource` or
// `templating.engines`.

use serde_json::{json, Value};

use crate::internal::error::Result;
use crate::schema::{object, NodeBuilder, NormalizationRule, Predicate, SchemaNode, Transform};

/// Name of the root node and of the document section it is read from
pub const ROOT: &str = "framework";

/// Builds the framework configuration tree.
///
/// `kernel_debug` only affects defaults: cache warming is on by default when
/// the kernel does not run in debug mode.
pub fn configuration(kernel_debug: bool) -> Result<SchemaNode> {
    NodeBuilder::array(ROOT)
        .child(NodeBuilder::scalar("cache_warmer").default_value(Value::Bool(!kernel_debug)))
        .child(NodeBuilder::scalar("charset"))
        .child(NodeBuilder::scalar("document_root"))
        .child(NodeBuilder::scalar("error_handler"))
        .child(NodeBuilder::scalar("exception_controller"))
        .child(NodeBuilder::scalar("ide"))
        .child(NodeBuilder::boolean("test"))
        .child(csrf_protection_section())
        .child(esi_section())
        .child(profiler_section())
        .child(router_section())
        .child(session_section())
        .child(templating_section())
        .child(translator_section())
        .child(validation_section())
        .build()
}

fn enabled() -> Value {
    object(&[("enabled", Value::Bool(true))])
}

fn csrf_protection_section() -> NodeBuilder {
    NodeBuilder::array("csrf_protection")
        .can_be_unset()
        .treat_null_like(enabled())
        .treat_true_like(enabled())
        .child(NodeBuilder::boolean("enabled"))
        .child(NodeBuilder::scalar("field_name"))
        .child(NodeBuilder::scalar("secret"))
}

fn esi_section() -> NodeBuilder {
    NodeBuilder::array("esi")
        .can_be_unset()
        .treat_null_like(enabled())
        .treat_true_like(enabled())
        .child(NodeBuilder::boolean("enabled"))
}

fn profiler_section() -> NodeBuilder {
    NodeBuilder::array("profiler")
        .can_be_unset()
        .child(NodeBuilder::boolean("only_exceptions").default_false())
        .child(
            NodeBuilder::scalar("dsn")
                .default_value(json!("sqlite:%kernel.cache_dir%/profiler.db")),
        )
        .child(NodeBuilder::scalar("username").default_value(json!("")))
        .child(NodeBuilder::scalar("password").default_value(json!("")))
        .child(NodeBuilder::scalar("lifetime").default_value(json!(86400)))
        .child(
            NodeBuilder::array("matcher")
                .can_be_unset()
                .perform_no_deep_merging()
                .child(NodeBuilder::scalar("ip"))
                .child(NodeBuilder::scalar("path"))
                .child(NodeBuilder::scalar("service")),
        )
}

fn router_section() -> NodeBuilder {
    NodeBuilder::array("router")
        .can_be_unset()
        .child(NodeBuilder::scalar("cache_warmer"))
        .child(
            NodeBuilder::scalar("resource")
                .is_required()
                .info("Main routing resource, e.g. \"%kernel.root_dir%/config/routing.yml\""),
        )
        .child(NodeBuilder::scalar("type"))
}

fn session_section() -> NodeBuilder {
    // Storage options may arrive as `pdo.db_table`; dots are not valid in node names.
    NodeBuilder::array("session")
        .can_be_unset()
        .before_normalization(NormalizationRule::strip_key_prefix("pdo."))
        .child(NodeBuilder::boolean("auto_start"))
        .child(NodeBuilder::scalar("class"))
        .child(NodeBuilder::scalar("default_locale"))
        .child(NodeBuilder::scalar("storage_id").default_value(json!("native")))
        .child(NodeBuilder::scalar("name"))
        .child(NodeBuilder::scalar("lifetime"))
        .child(NodeBuilder::scalar("path"))
        .child(NodeBuilder::scalar("domain"))
        .child(NodeBuilder::boolean("secure"))
        .child(NodeBuilder::boolean("httponly"))
        .child(NodeBuilder::scalar("db_table"))
        .child(NodeBuilder::scalar("db_id_col"))
        .child(NodeBuilder::scalar("db_data_col"))
        .child(NodeBuilder::scalar("db_time_col"))
}

fn templating_section() -> NodeBuilder {
    NodeBuilder::array("templating")
        .can_be_unset()
        .child(NodeBuilder::scalar("assets_version"))
        .fix_xml_config("assets_base_url")
        .child(
            NodeBuilder::prototype(
                "assets_base_urls",
                NodeBuilder::scalar("assets_base_url")
                    .before_normalization(NormalizationRule::unwrap_key("value")),
            )
            .before_normalization(NormalizationRule::wrap_non_sequence()),
        )
        .child(NodeBuilder::scalar("cache"))
        .child(NodeBuilder::scalar("cache_warmer"))
        .fix_xml_config("engine")
        .child(
            NodeBuilder::prototype(
                "engines",
                NodeBuilder::scalar("engine")
                    .before_normalization(NormalizationRule::unwrap_key("id")),
            )
            .is_required()
            .requires_at_least_one_element()
            .info("Template engines to enable, e.g. [twig, php]")
            .before_normalization(NormalizationRule::wrap_non_sequence()),
        )
        .fix_xml_config("loader")
        .child(
            NodeBuilder::prototype("loaders", NodeBuilder::scalar("loader"))
                .before_normalization(NormalizationRule::wrap_non_sequence()),
        )
        .fix_xml_config("package")
        .child(
            NodeBuilder::prototype(
                "packages",
                NodeBuilder::array("package")
                    .child(NodeBuilder::scalar("name"))
                    .child(NodeBuilder::scalar("version").default_null())
                    .fix_xml_config("base_url")
                    .child(NodeBuilder::prototype(
                        "base_urls",
                        NodeBuilder::scalar("base_url")
                            .before_normalization(NormalizationRule::unwrap_key("value")),
                    )),
            )
            .use_attribute_as_key("name"),
        )
}

fn translator_section() -> NodeBuilder {
    NodeBuilder::array("translator")
        .can_be_unset()
        .child(NodeBuilder::boolean("enabled").default_true())
        .child(NodeBuilder::scalar("fallback"))
}

fn validation_section() -> NodeBuilder {
    // Tag-style sources put `namespace` next to `annotations`; it belongs under it.
    let move_namespace = NormalizationRule::new(
        "nest_namespace_under_annotations",
        Predicate::HasNonEmpty(vec!["annotations".to_string(), "namespace".to_string()]),
        Transform::NestUnder {
            key: "namespace".to_string(),
            into: "annotations".to_string(),
        },
    );

    NodeBuilder::array("validation")
        .can_be_unset()
        .before_normalization(move_namespace)
        .child(NodeBuilder::boolean("enabled"))
        .child(
            NodeBuilder::array("annotations")
                .can_be_unset()
                .treat_null_like(object(&[]))
                .treat_true_like(object(&[]))
                .fix_xml_config("namespace")
                .child(
                    NodeBuilder::prototype(
                        "namespaces",
                        NodeBuilder::scalar("namespace")
                            .before_normalization(NormalizationRule::unwrap_key("namespace"))
                            .before_normalization(NormalizationRule::unwrap_key("value")),
                    )
                    .use_attribute_as_key("prefix"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ConfigPath, NodeKind};

    #[test]
    fn test_tree_builds_for_both_kernel_modes() {
        let debug = configuration(true).unwrap();
        let prod = configuration(false).unwrap();
        assert_eq!(debug.name, ROOT);
        assert_eq!(debug.child("cache_warmer").unwrap().default, Some(Value::Bool(false)));
        assert_eq!(prod.child("cache_warmer").unwrap().default, Some(Value::Bool(true)));
    }

    #[test]
    fn test_section_shapes() {
        let tree = configuration(false).unwrap();
        assert_eq!(tree.find("templating.engines").unwrap().kind, NodeKind::Prototype);
        assert_eq!(tree.find("templating.packages").unwrap().kind, NodeKind::Map);
        assert_eq!(
            tree.find("validation.annotations.namespaces").unwrap().key_attribute.as_deref(),
            Some("prefix")
        );
        assert!(!tree.find("profiler.matcher").unwrap().mergeable);
        assert!(tree.find("router.resource").unwrap().required);
        assert!(tree.find("session").unwrap().allow_unset);
    }

    #[test]
    fn test_help_text_reachable_from_error_paths() {
        let tree = configuration(false).unwrap();
        let engines = ConfigPath::root().key(ROOT).key("templating").key("engines");
        let info = tree.node_at(&engines).and_then(|node| node.info.as_deref());
        assert_eq!(info, Some("Template engines to enable, e.g. [twig, php]"));
        assert!(tree.node_at(&engines.index(0)).unwrap().info.is_none());
    }
}
