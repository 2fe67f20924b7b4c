use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

/// One fish as declared in the tank manifest: a sprite file plus the
/// swim speed (1..=5) chosen for it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct FishEntry {
    pub(crate) sprite: PathBuf,
    pub(crate) speed: u32,
}

/// Tank manifest. Fish are mandatory for a meaningful run; backgrounds and
/// food sprites may be empty, which degrades the tank (fallback fill color,
/// feeding disabled) without stopping it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) world_w: u32,
    pub(crate) world_h: u32,
    pub(crate) fps_cap: u32,
    pub(crate) seed: u64,
    pub(crate) hud: bool,
    pub(crate) fish: Vec<FishEntry>,
    pub(crate) backgrounds: Vec<PathBuf>,
    pub(crate) food: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            world_w: 900,
            world_h: 600,
            fps_cap: 60,
            seed: 0xF00D_F155_u64,
            hud: true,
            fish: Vec::new(),
            backgrounds: Vec::new(),
            food: Vec::new(),
        }
    }
}

pub(crate) fn load_settings(path: &Path) -> Result<Settings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read tank manifest {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&text)
        .with_context(|| format!("invalid tank manifest {}", path.display()))?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips() {
        let text = r#"{
            "world_w": 800,
            "seed": 7,
            "fish": [{ "sprite": "assets/goldie.txt", "speed": 3 }],
            "food": ["assets/flake.txt"]
        }"#;
        let s: Settings = serde_json::from_str(text).unwrap();
        assert_eq!(s.world_w, 800);
        assert_eq!(s.world_h, 600); // default fills the gap
        assert_eq!(s.fish.len(), 1);
        assert_eq!(s.fish[0].speed, 3);
        assert!(s.backgrounds.is_empty());
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let err = load_settings(Path::new("/nonexistent/tank.json")).unwrap_err();
        assert!(err.to_string().contains("tank manifest"));
    }
}
