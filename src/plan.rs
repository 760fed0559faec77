//! Derivative planning.
//!
//! The plan is the single contract between the producer, which writes every
//! descriptor to disk, and the composer, which references every descriptor
//! in markup. Neither side recomputes names or paths.
//!
//! Descriptors follow the declared option order: sizes outer, formats inner.
//!
//! ```text
//! sizes = [1800, 600], formats = [webp, png]
//!
//! 1800 webp → ./_site/images/ba7816bf8f01-1800.webp   /images/ba7816bf8f01-1800.webp
//! 1800 png  → ./_site/images/ba7816bf8f01-1800.png    /images/ba7816bf8f01-1800.png
//!  600 webp → ./_site/images/ba7816bf8f01-600.webp    /images/ba7816bf8f01-600.webp
//!  600 png  → ./_site/images/ba7816bf8f01-600.png     /images/ba7816bf8f01-600.png
//! ```

use crate::imaging::OutputFormat;
use crate::naming::{content_hash, derivative_filename, public_path};
use crate::options::ResolvedOptions;
use serde::Serialize;
use std::path::PathBuf;

/// One output file: a single size in a single format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivativeDescriptor {
    /// Target width in pixels.
    pub size: u32,
    pub format: OutputFormat,
    pub content_hash: String,
    pub filename: String,
    /// Where the producer writes the file.
    pub output_file_path: PathBuf,
    /// What the markup references.
    pub public_src_path: String,
}

/// Ordered descriptors for one source reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DerivativePlan {
    descriptors: Vec<DerivativeDescriptor>,
}

impl DerivativePlan {
    pub fn descriptors(&self) -> &[DerivativeDescriptor] {
        &self.descriptors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DerivativeDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Distinct sizes in plan order.
    pub fn sizes(&self) -> Vec<u32> {
        let mut sizes: Vec<u32> = Vec::new();
        for d in &self.descriptors {
            if !sizes.contains(&d.size) {
                sizes.push(d.size);
            }
        }
        sizes
    }

    /// Descriptors for one size, in format order.
    pub fn for_size(&self, size: u32) -> Vec<&DerivativeDescriptor> {
        self.descriptors.iter().filter(|d| d.size == size).collect()
    }
}

impl<'a> IntoIterator for &'a DerivativePlan {
    type Item = &'a DerivativeDescriptor;
    type IntoIter = std::slice::Iter<'a, DerivativeDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Compute the descriptor list for `source_ref`.
///
/// Pure and deterministic: identical inputs give identical plans.
pub fn plan(source_ref: &str, options: &ResolvedOptions) -> DerivativePlan {
    let hash = content_hash(source_ref);
    let output_dir = options
        .output_directory
        .join(options.image_folder.trim_start_matches('/'));

    let descriptors = options
        .sizes
        .iter()
        .flat_map(|&size| {
            options.formats.iter().map(move |&format| (size, format))
        })
        .map(|(size, format)| {
            let filename = derivative_filename(&hash, size, format);
            DerivativeDescriptor {
                size,
                format,
                content_hash: hash.clone(),
                output_file_path: output_dir.join(&filename),
                public_src_path: public_path(&options.image_folder, &filename),
                filename,
            }
        })
        .collect();

    DerivativePlan { descriptors }
}
