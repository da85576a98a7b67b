use std::collections::BTreeMap;

use parameters::ParameterStore;
use render_protocol::Extent;
use renderer::{ConstructionError, GpuBackend, Technique};

use crate::assets::AssetLoader;
use crate::complex::{COMPLEX_ID, ComplexTechnique};
use crate::conway::{CONWAY_ID, ConwayTechnique};
use crate::gradient::{GRADIENT_ID, GradientTechnique};
use crate::path_tracer::{PATH_TRACER_ID, PathTracerTechnique};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TechniqueEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub summary: &'static str,
}

const CATALOG: [TechniqueEntry; 4] = [
    TechniqueEntry {
        id: GRADIENT_ID.as_str(),
        name: "Gradient Tester",
        summary: "UV gradient with a sweeping band; exercises tiling and animation",
    },
    TechniqueEntry {
        id: COMPLEX_ID.as_str(),
        name: "Complex Image Generator",
        summary: "Escape-time Julia and Mandelbrot sets",
    },
    TechniqueEntry {
        id: CONWAY_ID.as_str(),
        name: "Conway's Game of Life",
        summary: "Cellular automaton stepped on the GPU",
    },
    TechniqueEntry {
        id: PATH_TRACER_ID.as_str(),
        name: "Path Tracing",
        summary: "Progressive sphere scene lit by the background asset",
    },
];

pub fn catalog() -> &'static [TechniqueEntry] {
    &CATALOG
}

pub fn find(id: &str) -> Option<&'static TechniqueEntry> {
    CATALOG.iter().find(|entry| entry.id == id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechniqueStatus {
    Usable,
    Unusable { reason: String },
}

/// The listed techniques plus the construction failures seen so far.
#[derive(Debug, Default)]
pub struct Catalog {
    unusable: BTreeMap<&'static str, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` for ids the catalog does not list.
    pub fn status(&self, id: &str) -> Option<TechniqueStatus> {
        let entry = find(id)?;
        Some(match self.unusable.get(entry.id) {
            Some(reason) => TechniqueStatus::Unusable {
                reason: reason.clone(),
            },
            None => TechniqueStatus::Usable,
        })
    }

    pub fn is_usable(&self, id: &str) -> bool {
        self.status(id) == Some(TechniqueStatus::Usable)
    }

    /// Returns false when `id` is not listed.
    pub fn mark_unusable(&mut self, id: &str, reason: impl Into<String>) -> bool {
        let Some(entry) = find(id) else {
            return false;
        };
        self.unusable.insert(entry.id, reason.into());
        true
    }

    /// Builds the technique registered under `id` and sizes it to
    /// `display_size`, registering its parameters in `parameters`. A failed build
    /// marks the entry unusable; a later successful one clears the mark.
    pub fn create_technique(
        &mut self,
        id: &str,
        display_size: Extent,
        backend: &GpuBackend,
        parameters: &mut ParameterStore,
        assets: &dyn AssetLoader,
    ) -> Result<Box<dyn Technique<GpuBackend>>, ConstructionError> {
        let Some(entry) = find(id) else {
            return Err(ConstructionError::UnknownTechnique(id.to_owned()));
        };
        let technique = build(entry, backend, parameters, assets).and_then(|mut technique| {
            technique.resize(backend, display_size)?;
            Ok(technique)
        });

        match &technique {
            Ok(_) => {
                self.unusable.remove(entry.id);
                tracing::info!(
                    technique = entry.id,
                    width = display_size.width,
                    height = display_size.height,
                    parameters = parameters.len(),
                    "technique constructed"
                );
            }
            Err(error) => {
                self.unusable.insert(entry.id, error.to_string());
                tracing::warn!(technique = entry.id, %error, "technique unusable");
            }
        }
        technique
    }
}

fn build(
    entry: &TechniqueEntry,
    backend: &GpuBackend,
    parameters: &mut ParameterStore,
    assets: &dyn AssetLoader,
) -> Result<Box<dyn Technique<GpuBackend>>, ConstructionError> {
    match entry.id {
        id if id == GRADIENT_ID.as_str() => {
            GradientTechnique::new(backend, parameters).map(|technique| Box::new(technique) as _)
        }
        id if id == COMPLEX_ID.as_str() => {
            ComplexTechnique::new(backend, parameters).map(|technique| Box::new(technique) as _)
        }
        id if id == CONWAY_ID.as_str() => {
            ConwayTechnique::new(backend, parameters).map(|technique| Box::new(technique) as _)
        }
        id if id == PATH_TRACER_ID.as_str() => {
            PathTracerTechnique::new(backend, parameters, assets)
                .map(|technique| Box::new(technique) as _)
        }
        id => Err(ConstructionError::UnknownTechnique(id.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, ImageAsset};

    #[test]
    fn catalog_lists_every_technique_once() {
        let ids: Vec<_> = catalog().iter().map(|entry| entry.id).collect();
        assert_eq!(ids, ["gradient", "complex", "conway", "path_tracer"]);
        assert_eq!(
            find("path_tracer").map(|entry| entry.name),
            Some("Path Tracing")
        );
    }

    #[test]
    fn unknown_ids_are_not_listed() {
        assert!(find("raymarcher").is_none());
        assert!(find("").is_none());
    }

    #[test]
    fn listed_techniques_start_usable() {
        let catalog = Catalog::new();
        for entry in super::catalog() {
            assert!(catalog.is_usable(entry.id), "{}", entry.id);
        }
        assert_eq!(catalog.status("raymarcher"), None);
        assert!(!catalog.is_usable("raymarcher"));
    }

    #[test]
    fn construction_failures_are_queryable_per_technique() {
        let mut catalog = Catalog::new();
        assert!(catalog.mark_unusable("path_tracer", "pipeline failed"));
        assert!(!catalog.mark_unusable("raymarcher", "not listed"));

        assert!(!catalog.is_usable("path_tracer"));
        assert_eq!(
            catalog.status("path_tracer"),
            Some(TechniqueStatus::Unusable {
                reason: "pipeline failed".to_owned()
            })
        );
        assert!(catalog.is_usable("conway"));
    }

    struct FlatSky;

    impl AssetLoader for FlatSky {
        fn load_image_asset(&self, _name: &str) -> Result<ImageAsset, AssetError> {
            Ok(ImageAsset {
                width: 2,
                height: 1,
                pixels: vec![[0.5, 0.6, 0.9, 1.0]; 2],
            })
        }
    }

    fn gpu_backend() -> GpuBackend {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .expect("request adapter");
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("techniques.tests.device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .expect("request device");
        GpuBackend::new(device, queue, wgpu::TextureFormat::Rgba8UnormSrgb)
            .expect("build gpu backend")
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn every_listed_technique_builds_with_a_valid_descriptor() {
        let backend = gpu_backend();
        let mut catalog = Catalog::new();
        for entry in super::catalog() {
            let mut parameters = ParameterStore::new();
            let technique = catalog
                .create_technique(entry.id, Extent::new(64, 48), &backend, &mut parameters, &FlatSky)
                .unwrap_or_else(|error| panic!("{} failed to build: {error}", entry.id));
            let descriptor = technique.descriptor();
            assert_eq!(descriptor.id.as_str(), entry.id);
            assert_eq!(descriptor.name, entry.name);
            assert!(descriptor.validate().is_ok(), "{}", entry.id);
            assert!(!parameters.is_empty(), "{}", entry.id);
            assert!(catalog.is_usable(entry.id));
        }
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn unknown_technique_is_a_construction_error() {
        let backend = gpu_backend();
        let mut parameters = ParameterStore::new();
        let mut catalog = Catalog::new();
        let error = catalog
            .create_technique("raymarcher", Extent::new(8, 8), &backend, &mut parameters, &FlatSky)
            .err()
            .expect("unknown id must fail");
        assert!(matches!(error, ConstructionError::UnknownTechnique(ref id) if id == "raymarcher"));
        assert!(parameters.is_empty());
        assert_eq!(catalog.status("raymarcher"), None);
    }
}
