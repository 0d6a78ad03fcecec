use anyhow::Context as _;
use serde_yaml::{Mapping, Value};
use statsig_openapi_tools::ApiServerConfig;
use std::path::Path;

/// Command-line and environment overrides, applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub spec_url: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub timeout_secs: Option<u64>,
    pub include_only_tagged: bool,
    pub warehouse_native: Option<&'static str>,
    pub strict_schemas: bool,
}

/// Read the YAML config (if any), apply `overrides` and build the library config.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<ApiServerConfig> {
    let mut root = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            match serde_yaml::from_str::<Value>(&text)
                .with_context(|| format!("parse {}", path.display()))?
            {
                Value::Mapping(m) => m,
                Value::Null => Mapping::new(),
                _ => anyhow::bail!("config {} must be a YAML mapping", path.display()),
            }
        }
        None => Mapping::new(),
    };

    set(&mut root, "baseUrl", overrides.base_url.clone());
    set(&mut root, "specUrl", overrides.spec_url.clone());
    set(&mut root, "apiKey", overrides.api_key.clone());
    set(&mut root, "apiVersion", overrides.api_version.clone());
    set(&mut root, "timeoutSecs", overrides.timeout_secs);

    let compile = root
        .entry(Value::from("compile"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    let Value::Mapping(compile) = compile else {
        anyhow::bail!("'compile' must be a mapping");
    };
    if overrides.include_only_tagged {
        compile.insert(Value::from("includeOnlyTagged"), Value::from(true));
    }
    set(
        compile,
        "warehouseNative",
        overrides.warehouse_native.map(str::to_string),
    );
    if overrides.strict_schemas {
        compile.insert(Value::from("untypedSchemas"), Value::from("strict"));
    }

    if !root.contains_key("baseUrl") {
        anyhow::bail!("baseUrl is required (--base-url, STATSIG_BASE_URL or the config file)");
    }
    serde_yaml::from_value(Value::Mapping(root)).context("invalid configuration")
}

fn set<T: Into<Value>>(map: &mut Mapping, key: &str, value: Option<T>) {
    if let Some(v) = value {
        map.insert(Value::from(key), v.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statsig_openapi_tools::config::{UntypedSchemaPolicy, WarehouseNativeFilter};
    use tempfile::tempdir;

    #[test]
    fn flags_override_file_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statsig.yaml");
        std::fs::write(
            &path,
            "baseUrl: https://file.example/console/v1\napiKey: from-file\ncompile:\n  inclusionTag: Exposed\n",
        )
        .unwrap();

        let cfg = load_config(
            Some(&path),
            &Overrides {
                api_key: Some("from-flag".to_string()),
                warehouse_native: Some("exclude"),
                strict_schemas: true,
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.base_url, "https://file.example/console/v1");
        assert_eq!(cfg.api_key.as_deref(), Some("from-flag"));
        assert_eq!(cfg.compile.inclusion_tag, "Exposed");
        assert_eq!(cfg.compile.warehouse_native, WarehouseNativeFilter::Exclude);
        assert_eq!(cfg.compile.untyped_schemas, UntypedSchemaPolicy::Strict);
    }

    #[test]
    fn flags_alone_are_enough() {
        let cfg = load_config(
            None,
            &Overrides {
                base_url: Some("http://127.0.0.1:8080".to_string()),
                timeout_secs: Some(0),
                include_only_tagged: true,
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.timeout_secs, Some(0));
        assert!(cfg.compile.include_only_tagged);
        assert_eq!(cfg.spec_location(), "http://127.0.0.1:8080/openapi.json");
    }

    #[test]
    fn missing_base_url_is_reported() {
        let err = load_config(None, &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("baseUrl is required"));
    }
}
