//! モデル定義
//!
//! FleetStackのリソースグラフを構成するデータモデルを定義します。

mod environment;
mod gate;
mod group;
mod node;
mod plan;
mod reference;
mod settings;
mod workspace;

// Re-exports
pub use environment::*;
pub use gate::*;
pub use group::*;
pub use node::*;
pub use plan::*;
pub use reference::*;
pub use settings::*;
pub use workspace::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        let id = NodeId::new("prd", "ss-db");
        assert_eq!(id.to_string(), "prd/ss-db");
        assert_ne!(id, NodeId::new("dev", "ss-db"));
    }

    #[test]
    fn test_node_kind_parse() {
        assert_eq!(NodeKind::parse("volume"), Some(NodeKind::Volume));
        assert_eq!(NodeKind::parse("database"), Some(NodeKind::ManagedDatabase));
        assert_eq!(NodeKind::parse("managed-cache"), Some(NodeKind::ManagedCache));
        assert_eq!(NodeKind::parse("image"), Some(NodeKind::ContainerImage));
        assert_eq!(NodeKind::parse("app"), Some(NodeKind::ClusterApplication));
        assert_eq!(NodeKind::parse("bucket"), None);
    }

    #[test]
    fn test_node_kind_layers() {
        assert_eq!(NodeKind::ContainerImage.layer(), Layer::Build);
        assert_eq!(NodeKind::ManagedDatabase.layer(), Layer::Cloud);
        assert_eq!(NodeKind::ClusterApplication.layer(), Layer::Cluster);
        assert!(Layer::Build < Layer::Cloud && Layer::Cloud < Layer::Cluster);
    }

    #[test]
    fn test_runtime_attributes() {
        assert!(NodeKind::ManagedDatabase.exports("host"));
        assert!(NodeKind::Volume.exports("volume-id"));
        assert!(!NodeKind::Volume.exports("host"));
    }

    #[test]
    fn test_deferred_reference_parse() {
        let r = DeferredReference::parse("ss-db.host").unwrap();
        assert_eq!(r.node, "ss-db");
        assert_eq!(r.attribute, "host");

        let dotted = DeferredReference::parse("logs.bucket.v2.name").unwrap();
        assert_eq!(dotted.node, "logs.bucket.v2");
        assert_eq!(dotted.attribute, "name");

        assert!(DeferredReference::parse("no-dot").is_none());
        assert!(DeferredReference::parse(".host").is_none());
        assert!(DeferredReference::parse("db.").is_none());
    }

    #[test]
    fn test_secret_source_parse() {
        let whole = SecretSource::parse("secrets/db.yml");
        assert_eq!(whole.file, std::path::PathBuf::from("secrets/db.yml"));
        assert_eq!(whole.key, None);

        let keyed = SecretSource::parse("secrets/db.yml#DB_PASSWORD");
        assert_eq!(keyed.key.as_deref(), Some("DB_PASSWORD"));
        assert_eq!(keyed.to_string(), "secrets/db.yml#DB_PASSWORD");
    }

    #[test]
    fn test_backing_parse() {
        assert_eq!(Backing::parse("managed"), Some(Backing::Managed));
        assert_eq!(Backing::parse("Self-Hosted"), Some(Backing::SelfHosted));
        assert_eq!(Backing::parse("in-cluster"), Some(Backing::SelfHosted));
        assert_eq!(Backing::parse("hybrid"), None);
        assert_eq!(Backing::from_managed_flag(true), Backing::Managed);
        assert_eq!(Backing::default(), Backing::SelfHosted);
    }

    #[test]
    fn test_component_enabled() {
        let open = Environment::new("dev");
        assert!(open.component_enabled(Some("superset")));
        assert!(open.component_enabled(None));

        let listed = Environment::new("prd")
            .with_component("superset", true)
            .with_component("jupyter", false);
        assert!(listed.component_enabled(Some("superset")));
        assert!(!listed.component_enabled(Some("jupyter")));
        assert!(!listed.component_enabled(Some("airflow")));
        assert!(listed.component_enabled(None));
    }

    #[test]
    fn test_environment_key() {
        let env = Environment::new("prd");
        assert_eq!(env.key("data"), "data-prd");

        let custom = Environment {
            key: Some("dp-production".to_string()),
            ..Environment::new("prd")
        };
        assert_eq!(custom.key("data"), "dp-production");
    }

    #[test]
    fn test_workspace_environment_not_found() {
        let ws = Workspace::new("data")
            .with_environment(Environment::new("dev"))
            .with_environment(Environment::new("prd"));

        assert!(ws.environment("dev").is_ok());
        let err = ws.environment("stg").unwrap_err().to_string();
        assert!(err.contains("stg"));
        assert!(err.contains("dev, prd"));
    }

    #[test]
    fn test_node_references() {
        let node = ResourceNode::new("web", NodeKind::ClusterApplication)
            .with_attribute("replicas", Attribute::literal(2))
            .with_attribute(
                "db-host",
                Attribute::first_of(
                    vec![
                        DeferredReference::new("ss-db", "host"),
                        DeferredReference::new("rds", "host"),
                    ],
                    true,
                ),
            );

        let refs: Vec<_> = node
            .references()
            .map(|(attr, r)| (attr.to_string(), r.to_string()))
            .collect();
        assert_eq!(
            refs,
            vec![
                ("db-host".to_string(), "ss-db.host".to_string()),
                ("db-host".to_string(), "rds.host".to_string()),
            ]
        );
    }
}
