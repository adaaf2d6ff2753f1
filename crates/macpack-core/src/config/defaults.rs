//! Default configuration values

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "macpack.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "macpack.yaml";

/// Disk image icon size when none is configured
pub const DEFAULT_DMG_ICON_SIZE: u32 = 80;

/// Disk image formats hdiutil accepts
pub const DMG_FORMATS: &[&str] = &["UDRO", "UDCO", "UDZO", "UDBZ", "ULFO", "ULMO"];

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".macpack.toml",
        ".macpack.yaml",
    ]
}

/// Starter configuration written by new projects
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# macpack configuration

product_name = "App"
version = "0.1.0"
targets = ["default"]
compression = "normal"

[directories]
build_resources = "build"
output = "dist"

[mac]
# identity = "Acme Corp (ABCDE12345)"

[mas]

[signing]
# cert_link = "https://example.com/certs/app.p12"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Config;

    #[test]
    fn test_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.product_name, "App");
        assert_eq!(config.version, "0.1.0");
    }
}
