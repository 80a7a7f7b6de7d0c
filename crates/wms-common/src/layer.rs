//! Layer, virtual layer and style definitions.

use serde::{Deserialize, Serialize};

/// Colormap applied to scalar styles unless configured otherwise.
pub const DEFAULT_COLORMAP: &str = "jet";

/// Colormap applied to vector styles.
pub const DEFAULT_VECTOR_COLORMAP: &str = "cubehelix";

/// Image types available to scalar layers.
pub const SCALAR_IMAGE_TYPES: &[&str] = &["filledcontours", "contours", "pcolor", "facets"];

/// A rendering style: an image type paired with a colormap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Style {
    pub image_type: String,
    pub colormap: String,
}

impl Style {
    pub fn new(image_type: impl Into<String>, colormap: impl Into<String>) -> Self {
        Self {
            image_type: image_type.into(),
            colormap: colormap.into(),
        }
    }

    /// WMS style name, e.g. `filledcontours_jet`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.image_type, self.colormap)
    }

    /// Styles attached to every layer discovered in a dataset.
    pub fn defaults() -> Vec<Style> {
        SCALAR_IMAGE_TYPES
            .iter()
            .map(|image_type| Style::new(*image_type, DEFAULT_COLORMAP))
            .collect()
    }

    /// Styles attached to a virtual layer rendered as `image_type`
    /// (`vectors` or `barbs`).
    pub fn vector_defaults(image_type: &str) -> Vec<Style> {
        vec![Style::new(image_type, DEFAULT_VECTOR_COLORMAP)]
    }
}

/// A renderable layer backed by a single dataset variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: i64,
    pub dataset_id: i64,
    /// Variable name inside the dataset
    pub var_name: String,
    /// CF standard name, if the variable carries one
    pub std_name: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    pub default_min: Option<f64>,
    pub default_max: Option<f64>,
    pub styles: Vec<Style>,
}

impl LayerRecord {
    /// A fresh, inactive layer for `var_name`.
    pub fn new(dataset_id: i64, var_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            dataset_id,
            var_name: var_name.into(),
            std_name: None,
            description: None,
            active: false,
            default_min: None,
            default_max: None,
            styles: Vec::new(),
        }
    }

    /// Name of the variable to read from the dataset.
    pub fn access_name(&self) -> &str {
        &self.var_name
    }
}

/// A layer derived from two component variables (`u,v`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualLayer {
    pub id: i64,
    pub dataset_id: i64,
    /// Component variables joined with a comma, e.g. `u,v`
    pub var_name: String,
    pub std_name: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    pub styles: Vec<Style>,
}

impl VirtualLayer {
    pub fn new(dataset_id: i64, var_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            dataset_id,
            var_name: var_name.into(),
            std_name: None,
            description: None,
            active: false,
            styles: Vec::new(),
        }
    }

    /// Component variable names.
    pub fn components(&self) -> Vec<&str> {
        self.var_name.split(',').map(str::trim).collect()
    }

    /// The first component; time and depth lookups use it.
    pub fn access_name(&self) -> &str {
        self.var_name.split(',').next().map(str::trim).unwrap_or_default()
    }
}

/// Either kind of layer, as listed by a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnyLayer {
    Layer(LayerRecord),
    Virtual(VirtualLayer),
}

impl AnyLayer {
    pub fn var_name(&self) -> &str {
        match self {
            AnyLayer::Layer(l) => &l.var_name,
            AnyLayer::Virtual(v) => &v.var_name,
        }
    }

    pub fn access_name(&self) -> &str {
        match self {
            AnyLayer::Layer(l) => l.access_name(),
            AnyLayer::Virtual(v) => v.access_name(),
        }
    }

    pub fn active(&self) -> bool {
        match self {
            AnyLayer::Layer(l) => l.active,
            AnyLayer::Virtual(v) => v.active,
        }
    }

    pub fn styles(&self) -> &[Style] {
        match self {
            AnyLayer::Layer(l) => &l.styles,
            AnyLayer::Virtual(v) => &v.styles,
        }
    }
}

/// A `{min, max}` pair; both ends are `None` when the axis is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: Clone> Bounds<T> {
    /// First and last element of an ordered axis.
    pub fn from_ordered(values: &[T]) -> Self {
        Self {
            min: values.first().cloned(),
            max: values.last().cloned(),
        }
    }

    pub fn empty() -> Self {
        Self { min: None, max: None }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_styles() {
        let styles = Style::defaults();
        assert_eq!(styles.len(), SCALAR_IMAGE_TYPES.len());
        assert_eq!(styles[0].name(), "filledcontours_jet");
        assert!(styles.iter().all(|s| s.colormap == DEFAULT_COLORMAP));
    }

    #[test]
    fn test_virtual_layer_components() {
        let vl = VirtualLayer::new(1, "u,v");
        assert_eq!(vl.components(), vec!["u", "v"]);
        assert_eq!(vl.access_name(), "u");
    }

    #[test]
    fn test_bounds_from_ordered() {
        let b = Bounds::from_ordered(&[3.0, 5.0, 9.0]);
        assert_eq!(b.min, Some(3.0));
        assert_eq!(b.max, Some(9.0));
        assert!(Bounds::<f64>::from_ordered(&[]).is_empty());
    }
}
