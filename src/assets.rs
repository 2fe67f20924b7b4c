use crate::config::Settings;
use crate::model::{FISH_DISPLAY_SIZE, FOOD_DISPLAY_SIZE};
use crate::render::Pixel;
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Pixel-art sprite loaded from a text file.
///
/// The file format is palette directives followed by art rows:
///
/// ```text
/// = g 255 200 60
/// = k 30 30 40
/// ..gg..
/// .gkkg.
/// ..gg..
/// ```
///
/// `.` and space are always transparent. Rows are right-padded with
/// transparency to the widest row. `w`/`h` are the sprite's display size in
/// world pixels, fixed per asset class at load time (the art resolution is
/// independent and sampled nearest).
#[derive(Clone, Debug)]
pub(crate) struct Sprite {
    pub(crate) name: String,
    pub(crate) w: f32,
    pub(crate) h: f32,
    cols: usize,
    rows: usize,
    px: Vec<Pixel>,
}

impl Sprite {
    pub(crate) fn parse(name: &str, text: &str, display: (f32, f32)) -> Result<Sprite> {
        let mut palette: HashMap<char, Pixel> = HashMap::new();
        let mut art: Vec<&str> = Vec::new();

        for (ln, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('=') {
                let mut it = rest.split_whitespace();
                let ch = match it.next() {
                    Some(tok) if tok.chars().count() == 1 => tok.chars().next().unwrap(),
                    _ => bail!("sprite {}: bad palette directive on line {}", name, ln + 1),
                };
                if ch == '.' {
                    bail!("sprite {}: '.' is reserved for transparency", name);
                }
                let mut chan = |what: &str| -> Result<u8> {
                    it.next()
                        .and_then(|t| t.parse::<u8>().ok())
                        .with_context(|| {
                            format!("sprite {}: bad {} on line {}", name, what, ln + 1)
                        })
                };
                let r = chan("red")?;
                let g = chan("green")?;
                let b = chan("blue")?;
                let a = it.next().map(|t| t.parse::<u8>()).transpose().with_context(
                    || format!("sprite {}: bad alpha on line {}", name, ln + 1),
                )?;
                palette.insert(ch, Pixel { r, g, b, a: a.unwrap_or(255) });
            } else {
                art.push(line);
            }
        }

        if art.is_empty() {
            bail!("sprite {}: no art rows", name);
        }

        let rows = art.len();
        let cols = art.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut px = vec![Pixel::default(); cols * rows];

        for (y, row) in art.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '.' || ch == ' ' {
                    continue;
                }
                px[y * cols + x] = *palette.get(&ch).with_context(|| {
                    format!("sprite {}: art character {:?} missing from palette", name, ch)
                })?;
            }
        }

        Ok(Sprite {
            name: name.to_string(),
            w: display.0,
            h: display.1,
            cols,
            rows,
            px,
        })
    }

    /// Nearest sample at normalized coordinates (u, v) in [0, 1).
    pub(crate) fn sample(&self, u: f32, v: f32) -> Pixel {
        let x = ((u * self.cols as f32) as usize).min(self.cols - 1);
        let y = ((v * self.rows as f32) as usize).min(self.rows - 1);
        self.px[y * self.cols + x]
    }
}

pub(crate) struct FishAsset {
    pub(crate) sprite: Sprite,
    pub(crate) speed: u32,
}

pub(crate) struct Assets {
    pub(crate) fish: Vec<FishAsset>,
    pub(crate) backgrounds: Vec<Sprite>,
    pub(crate) food: Vec<Sprite>,
}

fn load_sprite(path: &Path, display: (f32, f32)) -> Result<Sprite> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read sprite {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Sprite::parse(&name, &text, display)
}

/// Load every sprite the manifest names. Any failure here is fatal: a fish
/// with no renderable image cannot be simulated meaningfully.
pub(crate) fn load(settings: &Settings) -> Result<Assets> {
    let world = (settings.world_w as f32, settings.world_h as f32);

    let mut fish = Vec::with_capacity(settings.fish.len());
    for entry in &settings.fish {
        fish.push(FishAsset {
            sprite: load_sprite(&entry.sprite, FISH_DISPLAY_SIZE)?,
            speed: entry.speed,
        });
    }

    let mut backgrounds = Vec::with_capacity(settings.backgrounds.len());
    for path in &settings.backgrounds {
        backgrounds.push(load_sprite(path, world)?);
    }

    let mut food = Vec::with_capacity(settings.food.len());
    for path in &settings.food {
        food.push(load_sprite(path, FOOD_DISPLAY_SIZE)?);
    }

    Ok(Assets {
        fish,
        backgrounds,
        food,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_palette_and_rows() {
        let text = "= g 255 200 60\n= k 30 30 40 128\n..gg\n.gkg\n";
        let s = Sprite::parse("goldie", text, (120.0, 80.0)).unwrap();
        assert_eq!((s.cols, s.rows), (4, 2));
        assert_eq!(s.sample(0.0, 0.0).a, 0); // '.' transparent
        let g = s.sample(0.99, 0.0);
        assert_eq!((g.r, g.g, g.b, g.a), (255, 200, 60, 255));
        let k = s.sample(0.6, 0.9);
        assert_eq!(k.a, 128);
    }

    #[test]
    fn short_rows_pad_with_transparency() {
        let text = "= x 1 2 3\nxxx\nx\n";
        let s = Sprite::parse("pad", text, (50.0, 50.0)).unwrap();
        assert_eq!(s.sample(0.9, 0.9).a, 0);
        assert_eq!(s.sample(0.0, 0.9).a, 255);
    }

    #[test]
    fn unknown_art_character_is_fatal() {
        let err = Sprite::parse("bad", "= x 1 2 3\nxyx\n", (50.0, 50.0)).unwrap_err();
        assert!(err.to_string().contains("missing from palette"));
    }

    #[test]
    fn empty_art_is_fatal() {
        assert!(Sprite::parse("empty", "= x 1 2 3\n", (50.0, 50.0)).is_err());
        assert!(Sprite::parse("blank", "\n\n", (50.0, 50.0)).is_err());
    }

    #[test]
    fn bad_palette_line_is_fatal() {
        assert!(Sprite::parse("bad", "= xx 1 2 3\nx\n", (50.0, 50.0)).is_err());
        assert!(Sprite::parse("bad", "= x 1 2 300\nx\n", (50.0, 50.0)).is_err());
        assert!(Sprite::parse("bad", "= . 1 2 3\n.\n", (50.0, 50.0)).is_err());
    }
}
