//! Concrete renderer techniques on top of [`renderer::GpuBackend`].
//!
//! Each technique owns its WGSL kernels and registers its parameters in the
//! store handed to its constructor:
//! - `gradient`: capped tester with a sweeping band.
//! - `complex`: escape-time fractals.
//! - `conway`: game of life on a GPU cell grid.
//! - `path_tracer`: accumulating path tracer lit by an image asset.
//!
//! `catalog` maps technique ids to constructors and tracks which ones failed
//! to build; `assets` decodes images.

mod assets;
mod catalog;
mod complex;
mod conway;
mod gradient;
mod path_tracer;
mod shared;

pub use assets::{
    AssetError, AssetLoader, DEFAULT_MAX_ASSET_WIDTH, ImageAsset, ImageAssetLoader,
    srgb_to_linear,
};
pub use catalog::{Catalog, TechniqueEntry, TechniqueStatus, catalog, find};
pub use complex::{COMPLEX_ID, ComplexTechnique};
pub use conway::{CONWAY_ID, ConwayTechnique};
pub use gradient::{GRADIENT_ID, GradientTechnique};
pub use path_tracer::{BACKGROUND_ASSET, PATH_TRACER_ID, PathTracerTechnique};

#[cfg(test)]
mod wgsl_tests;
