// FILE: src/cli/config.rs

use crate::error::{CompilerError, Result};
use crate::localization::LocalizationOptions;
use crate::{CompilerOptions, FileNamingScheme, StyleScheme};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub target_platform: Option<String>,
    pub style_scheme: Option<String>,
    pub file_naming: Option<FileNamingScheme>,
    pub use_short_identifiers: Option<bool>,
    pub force_include_internal_props: Option<bool>,
    pub localization: Option<LocalizationOptions>,
    pub enable_query_integration: Option<bool>,
    pub enable_substitution_indirection: Option<bool>,
    pub enable_auth_gating: Option<bool>,
    pub use_optimized_images: Option<bool>,
    pub emit_skeleton: Option<bool>,
    pub output_directory: Option<String>,
}

impl ConfigFile {
    pub fn apply(&self, options: &mut CompilerOptions) -> Result<()> {
        if let Some(platform) = &self.target_platform {
            options.target_platform = platform.parse()?;
        }
        if let Some(scheme) = &self.style_scheme {
            options.style_scheme = scheme.parse::<StyleScheme>()?;
        }
        if let Some(naming) = self.file_naming {
            options.file_naming = naming;
        }
        if let Some(localization) = &self.localization {
            options.localization = Some(localization.clone());
        }

        let flags = [
            (self.use_short_identifiers, &mut options.use_short_identifiers),
            (self.force_include_internal_props, &mut options.force_include_internal_props),
            (self.enable_query_integration, &mut options.enable_query_integration),
            (self.enable_substitution_indirection, &mut options.enable_substitution_indirection),
            (self.enable_auth_gating, &mut options.enable_auth_gating),
            (self.use_optimized_images, &mut options.use_optimized_images),
            (self.emit_skeleton, &mut options.emit_skeleton),
        ];
        for (value, slot) in flags {
            if let Some(value) = value {
                *slot = value;
            }
        }
        Ok(())
    }
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| {
        CompilerError::FileNotFound {
            path: format!("Config file {}: {}", config_path, e),
        }
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?
    } else {
        return Err(CompilerError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        });
    };
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::KeyScheme;
    use crate::TargetPlatform;
    use tempfile::TempDir;

    #[test]
    fn test_toml_config_applies_over_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("designc.toml");
        fs::write(
            &path,
            r#"
targetPlatform = "nextjs"
styleScheme = "scoped"
emitSkeleton = false
enableAuthGating = true

[localization]
keyScheme = "path"
tagPrefix = "shop."
"#,
        )
        .unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        let mut options = CompilerOptions::default();
        config.apply(&mut options).unwrap();

        assert_eq!(options.target_platform, TargetPlatform::NextJs);
        assert_eq!(options.style_scheme, StyleScheme::Scoped);
        assert!(!options.emit_skeleton);
        assert!(options.enable_auth_gating);
        let localization = options.localization.unwrap();
        assert_eq!(localization.key_scheme, KeyScheme::Path);
        assert_eq!(localization.tag_prefix.as_deref(), Some("shop."));
    }

    #[test]
    fn test_json_config_and_bad_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("designc.json");
        fs::write(&path, r#"{ "fileNaming": "opaqueId", "outputDirectory": "gen" }"#).unwrap();
        let config = load(path.to_str().unwrap()).unwrap();
        let mut options = CompilerOptions::default();
        config.apply(&mut options).unwrap();
        assert_eq!(options.file_naming, FileNamingScheme::OpaqueId);
        assert_eq!(config.output_directory.as_deref(), Some("gen"));

        let bad = ConfigFile {
            target_platform: Some("angular".to_string()),
            ..Default::default()
        };
        assert!(bad.apply(&mut CompilerOptions::default()).is_err());

        let yaml = temp_dir.path().join("designc.yaml");
        fs::write(&yaml, "x: 1").unwrap();
        assert!(matches!(
            load(yaml.to_str().unwrap()),
            Err(CompilerError::InvalidFormat { .. })
        ));
    }
}
