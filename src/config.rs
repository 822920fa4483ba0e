//! CLI configuration: optional TOML file plus environment overrides.

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

const DEFAULT_DB_PATH: &str = "evidence.db";
const DEFAULT_EXPORT_DIR: &str = "exports";

#[derive(Debug, Deserialize, Default)]
struct EvidenceConfigFile {
    db_path: Option<String>,
    export_dir: Option<String>,
    kdf: Option<KdfConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct KdfConfigFile {
    m_cost_kib: Option<u32>,
    t_cost: Option<u32>,
    parallelism: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct EvidenceConfig {
    pub db_path: String,
    pub export_dir: String,
    pub kdf_params: crate::types::KdfParams,
}

impl EvidenceConfig {
    /// Read `EVIDENCE_CONFIG` (TOML) if set, then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("EVIDENCE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(Path::new(path))?,
            None => EvidenceConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EvidenceConfigFile) -> Self {
        let mut kdf_params = crate::crypto::vault::default_kdf_params();
        if let Some(kdf) = file.kdf {
            if let Some(m) = kdf.m_cost_kib {
                kdf_params.m_cost_kib = m;
            }
            if let Some(t) = kdf.t_cost {
                kdf_params.t_cost = t;
            }
            if let Some(p) = kdf.parallelism {
                kdf_params.parallelism = p;
            }
        }
        Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            export_dir: file
                .export_dir
                .unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string()),
            kdf_params,
        }
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("EVIDENCE_DB") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(dir) = std::env::var("EVIDENCE_EXPORT_DIR") {
            if !dir.trim().is_empty() {
                self.export_dir = dir;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.kdf_params.m_cost_kib < 8 {
            return Err(anyhow!("kdf.m_cost_kib must be at least 8 KiB"));
        }
        if self.kdf_params.t_cost == 0 {
            return Err(anyhow!("kdf.t_cost must be greater than zero"));
        }
        if self.kdf_params.parallelism == 0 {
            return Err(anyhow!("kdf.parallelism must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<EvidenceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_defaults_fill_in() {
        let cfg = EvidenceConfig::from_file(EvidenceConfigFile::default());
        assert_eq!(cfg.db_path, "evidence.db");
        assert_eq!(cfg.export_dir, "exports");
        assert_eq!(cfg.kdf_params.alg, "argon2id");
    }

    #[test]
    fn kdf_overrides_are_merged() {
        let file: EvidenceConfigFile = toml::from_str(
            r#"
            db_path = "custom.db"

            [kdf]
            m_cost_kib = 65536
            t_cost = 2
            "#,
        )
        .unwrap();
        let cfg = EvidenceConfig::from_file(file);
        assert_eq!(cfg.db_path, "custom.db");
        assert_eq!(cfg.kdf_params.m_cost_kib, 65536);
        assert_eq!(cfg.kdf_params.t_cost, 2);
        assert_eq!(cfg.kdf_params.parallelism, 1);
    }

    #[test]
    fn zero_kdf_cost_is_rejected() {
        let mut cfg = EvidenceConfig::from_file(EvidenceConfigFile::default());
        cfg.kdf_params.t_cost = 0;
        assert!(cfg.validate().is_err());
    }
}
