//! topoviz Assets - Icon to placeholder mesh conversion
//!
//! Drives external tools as subprocesses:
//! - LibreOffice turns Visio stencils (VSS/VSD) into SVG
//! - SVGs are sanitized and validated before conversion
//! - Blender extrudes SVG icons into GLB meshes
//!
//! Conversions run on a bounded worker pool and are deduplicated through a
//! content-addressed mesh cache.

pub mod cache;
pub mod converter;
pub mod pipeline;
pub mod svg;

pub use cache::{sha256_hex, CacheError, CacheIndex, CachedMesh, MeshCache};
pub use converter::{
    run_tool, BlenderConverter, ConversionError, LibreOfficeConverter, MeshConverter,
    DEFAULT_TIMEOUT,
};
pub use pipeline::{resolve_meshes, AssetJob, AssetOutcome, AssetPipeline, MESH_EXTENSION};
pub use svg::{sanitize_svg, validate_svg, SanitizeError, Sanitized};
