//! Shape catalog - built-in and user-defined table shapes
//!
//! User shapes live as `*.json` files in a directory. A user shape with the
//! same name as a built-in one replaces it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ShapeError, ShapeResult};
use crate::models::Grid;
use crate::sections::find_sections;
use crate::shape::{builtin_shapes, TableShape};

/// Where a catalog entry came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Builtin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
struct Entry {
    shape: TableShape,
    origin: Origin,
}

/// Catalog of table shapes
pub struct ShapeCatalog {
    /// Directory where user shapes are stored
    shapes_dir: Option<PathBuf>,
    /// Shapes by name
    shapes: BTreeMap<String, Entry>,
}

impl ShapeCatalog {
    /// Built-in shapes only.
    pub fn new() -> Self {
        let shapes = builtin_shapes()
            .into_iter()
            .map(|shape| {
                (
                    shape.name.clone(),
                    Entry {
                        shape,
                        origin: Origin::Builtin,
                    },
                )
            })
            .collect();
        Self {
            shapes_dir: None,
            shapes,
        }
    }

    /// Built-in shapes plus every shape file in `dir`.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut catalog = Self::new();
        catalog.shapes_dir = Some(PathBuf::from(dir.as_ref()));
        catalog.load_all();
        catalog
    }

    /// Load all shapes from the catalog directory
    fn load_all(&mut self) {
        let Some(dir) = self.shapes_dir.clone() else {
            return;
        };
        if !dir.exists() {
            return;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read shapes directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match load_shape_file(&path) {
                Ok(shape) => {
                    debug!(name = %shape.name, path = %path.display(), "loaded shape");
                    self.shapes.insert(
                        shape.name.clone(),
                        Entry {
                            shape,
                            origin: Origin::File(path),
                        },
                    );
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping shape file"),
            }
        }
    }

    /// All shapes, by name.
    pub fn list(&self) -> Vec<&TableShape> {
        self.shapes.values().map(|e| &e.shape).collect()
    }

    /// Get a shape by name
    pub fn get(&self, name: &str) -> Option<&TableShape> {
        self.shapes.get(name).map(|e| &e.shape)
    }

    pub fn origin(&self, name: &str) -> Option<&Origin> {
        self.shapes.get(name).map(|e| &e.origin)
    }

    /// A shape by name, or loaded from a JSON file path.
    pub fn resolve(&self, name_or_path: &str) -> ShapeResult<TableShape> {
        if let Some(shape) = self.get(name_or_path) {
            return Ok(shape.clone());
        }
        let path = Path::new(name_or_path);
        if path.is_file() {
            return load_shape_file(path);
        }
        Err(ShapeError::UnknownShape(name_or_path.to_string()))
    }

    /// Shapes whose sections can be discovered in `grid`.
    pub fn matching(&self, grid: &Grid) -> Vec<&TableShape> {
        self.list()
            .into_iter()
            .filter(|shape| {
                find_sections(grid, &shape.strategy).is_ok_and(|s| s.len() > shape.section)
            })
            .collect()
    }

    /// Save a shape to the catalog directory
    pub fn save(&mut self, shape: TableShape) -> ShapeResult<PathBuf> {
        shape.validate()?;
        let dir = self
            .shapes_dir
            .clone()
            .ok_or_else(|| ShapeError::Invalid("catalog has no shapes directory".into()))?;

        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", slug(&shape.name)));
        fs::write(&path, shape.to_json()?)?;

        self.shapes.insert(
            shape.name.clone(),
            Entry {
                shape,
                origin: Origin::File(path.clone()),
            },
        );
        Ok(path)
    }

    /// Delete a user shape. A shadowed built-in becomes visible again.
    pub fn delete(&mut self, name: &str) -> ShapeResult<()> {
        let path = match self.shapes.get(name).map(|e| &e.origin) {
            Some(Origin::File(path)) => path.clone(),
            Some(Origin::Builtin) => {
                return Err(ShapeError::Invalid(format!(
                    "built-in shape cannot be deleted: {}",
                    name
                )))
            }
            None => return Err(ShapeError::UnknownShape(name.to_string())),
        };

        fs::remove_file(&path)?;
        self.shapes.remove(name);
        if let Some(shape) = builtin_shapes().into_iter().find(|s| s.name == name) {
            self.shapes.insert(
                name.to_string(),
                Entry {
                    shape,
                    origin: Origin::Builtin,
                },
            );
        }
        Ok(())
    }
}

impl Default for ShapeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn load_shape_file(path: &Path) -> ShapeResult<TableShape> {
    let content = fs::read_to_string(path)?;
    TableShape::from_json(&content)
}

/// File stem for a shape name
fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
