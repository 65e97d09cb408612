// ============================================================================
// Persisted healing defaults (key=value .cfg file)
// ============================================================================

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::HealResult;
use crate::log_warn;
use crate::ops::heal::{HealParams, HealQuality};

const SETTINGS_FILE: &str = "heal_settings.cfg";

/// Brush defaults read from disk. Unset fields fall back to the quality
/// preset; command-line flags override both.
#[derive(Clone, Debug, PartialEq)]
pub struct HealSettings {
    pub quality: HealQuality,
    pub brush_radius: Option<i32>,
    pub feather: Option<f32>,
    pub flow: Option<f32>,
    pub gap: Option<i32>,
    pub sample_radius: Option<i32>,
    pub patch_size: Option<i32>,
    pub patchmatch_iters: Option<u32>,
    pub poisson_iters: Option<u32>,
    pub spacing_factor: Option<f32>,
    /// Fixed RNG seed for reproducible batches.
    pub seed: Option<u64>,
}

impl Default for HealSettings {
    fn default() -> Self {
        Self {
            quality: HealQuality::Full,
            brush_radius: None,
            feather: None,
            flow: None,
            gap: None,
            sample_radius: None,
            patch_size: None,
            patchmatch_iters: None,
            poisson_iters: None,
            spacing_factor: None,
            seed: None,
        }
    }
}

impl HealSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/paintfe-heal/heal_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PaintFE-Heal\heal_settings.cfg
    /// On macOS:   ~/Library/Application Support/PaintFE-Heal/heal_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("paintfe-heal");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("PaintFE-Heal").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PaintFE-Heal")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Read `path`; a missing or unreadable file gives the defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines. Unknown keys and unparsable values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "quality" => match HealQuality::parse(val) {
                    Some(q) => s.quality = q,
                    None => {
                        log_warn!("settings: unknown quality '{}'", val);
                    }
                },
                "brush_radius" => s.brush_radius = val.parse().ok(),
                "feather" => s.feather = val.parse().ok(),
                "flow" => s.flow = val.parse().ok(),
                "gap" => s.gap = val.parse().ok(),
                "sample_radius" => s.sample_radius = val.parse().ok(),
                "patch_size" => s.patch_size = val.parse().ok(),
                "patchmatch_iters" => s.patchmatch_iters = val.parse().ok(),
                "poisson_iters" => s.poisson_iters = val.parse().ok(),
                "spacing_factor" => s.spacing_factor = val.parse().ok(),
                "seed" => s.seed = val.parse().ok(),
                _ => {}
            }
        }
        s
    }

    /// Serialize to the on-disk format; unset overrides are omitted.
    pub fn to_cfg_string(&self) -> String {
        let mut out = format!("quality={}\n", self.quality.label());
        let mut put = |key: &str, val: Option<String>| {
            if let Some(v) = val {
                let _ = writeln!(out, "{}={}", key, v);
            }
        };
        put("brush_radius", self.brush_radius.map(|v| v.to_string()));
        put("feather", self.feather.map(|v| v.to_string()));
        put("flow", self.flow.map(|v| v.to_string()));
        put("gap", self.gap.map(|v| v.to_string()));
        put("sample_radius", self.sample_radius.map(|v| v.to_string()));
        put("patch_size", self.patch_size.map(|v| v.to_string()));
        put("patchmatch_iters", self.patchmatch_iters.map(|v| v.to_string()));
        put("poisson_iters", self.poisson_iters.map(|v| v.to_string()));
        put("spacing_factor", self.spacing_factor.map(|v| v.to_string()));
        put("seed", self.seed.map(|v| v.to_string()));
        out
    }

    pub fn save_to(&self, path: &Path) -> HealResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_cfg_string())?;
        Ok(())
    }

    /// Quality preset with every stored override applied.
    pub fn params(&self) -> HealParams {
        let mut p = HealParams::for_quality(self.quality);
        if let Some(v) = self.brush_radius {
            p.brush_radius = v;
        }
        if let Some(v) = self.feather {
            p.feather = v;
        }
        if let Some(v) = self.flow {
            p.flow = v;
        }
        if let Some(v) = self.gap {
            p.gap = v;
        }
        if let Some(v) = self.sample_radius {
            p.sample_radius = v;
        }
        if let Some(v) = self.patch_size {
            p.patch_size = v;
        }
        if let Some(v) = self.patchmatch_iters {
            p.patchmatch_iters = v;
        }
        if let Some(v) = self.poisson_iters {
            p.poisson_iters = v;
        }
        if let Some(v) = self.spacing_factor {
            p.spacing_factor = v;
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = HealSettings::load_from(&dir.path().join("nope.cfg"));
        assert_eq!(s, HealSettings::default());
        assert_eq!(s.params(), HealParams::for_quality(HealQuality::Full));
    }

    #[test]
    fn parse_skips_junk() {
        let s = HealSettings::parse(
            "# comment\nquality = preview\nbrush_radius=25\nfeather=abc\nno_equals\nunknown=3\nseed=42\n",
        );
        assert_eq!(s.quality, HealQuality::Preview);
        assert_eq!(s.brush_radius, Some(25));
        assert_eq!(s.feather, None);
        assert_eq!(s.seed, Some(42));

        let p = s.params();
        assert_eq!(p.brush_radius, 25);
        assert_eq!(p.sample_radius, 64);
        assert_eq!(p.feather, 0.6);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let s = HealSettings {
            quality: HealQuality::Preview,
            flow: Some(0.5),
            poisson_iters: Some(0),
            spacing_factor: Some(0.25),
            ..HealSettings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(HealSettings::load_from(&path), s);
    }
}
