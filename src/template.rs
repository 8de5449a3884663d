use std::{
    fs,
    path::{Path, PathBuf},
};

use float_ord::FloatOrd;
use ndarray::{ArrayView2, Zip};
use tracing::instrument;

use crate::{
    classifier::confusable_group,
    error::Result,
    normalize::threshold,
    result::GrayArray,
    util::{foreground_count, luminance, resize_gray, to_intensity},
};

/// Second opinion for characters the statistical model is unsure about.
pub trait TemplateMatcher: Send + Sync {
    /// Returns the corrected label for `image`. Must be deterministic for identical inputs.
    fn match_template(&self, label: char, image: ArrayView2<f32>, template_dir: &Path)
        -> Result<char>;
}

/// Compares the character against reference images stored as `<template_dir>/<label>/*`.
///
/// Only labels from the predicted label's confusable group are considered. Templates are
/// binarized with foreground as the minority class so that their polarity matches the character
/// crops. The lowest mean squared difference wins; ties keep the earlier label of the group.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryTemplateMatcher;

impl TemplateMatcher for DirectoryTemplateMatcher {
    #[instrument(level = "debug", skip(self, image))]
    fn match_template(
        &self,
        label: char,
        image: ArrayView2<f32>,
        template_dir: &Path,
    ) -> Result<char> {
        let own = [label];
        let group = confusable_group(label).unwrap_or(&own[..]);
        let best = group
            .iter()
            .flat_map(|candidate| {
                load_templates(&template_dir.join(candidate.to_string()), image.dim())
                    .into_iter()
                    .map(move |template| {
                        (*candidate, mean_squared_difference(image, template.view()))
                    })
            })
            .min_by_key(|(_, score)| FloatOrd(*score));

        match best {
            Some((matched, score)) => {
                log::trace!("Best template for {label:?} is {matched:?} ({score})");
                Ok(matched)
            }
            None => {
                log::warn!(
                    "No templates for {label:?} under {}, keeping prediction",
                    template_dir.display()
                );
                Ok(label)
            }
        }
    }
}

fn template_paths(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        log::trace!("Template directory {} not readable", dir.display());
        return Vec::new();
    };
    let mut paths = entries
        .filter_map(|entry| entry.ok().map(|it| it.path()))
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    paths.sort();
    paths
}

fn load_templates(dir: &Path, shape: (usize, usize)) -> Vec<GrayArray> {
    template_paths(dir)
        .into_iter()
        .filter_map(|path| match image::open(&path) {
            Ok(image) => Some(normalize_template(&luminance(&image), shape)),
            Err(err) => {
                log::warn!("Skipping template {}: {err}", path.display());
                None
            }
        })
        .collect()
}

fn normalize_template(gray: &GrayArray, shape: (usize, usize)) -> GrayArray {
    let resized = resize_gray(gray.view(), shape);
    let mut binary = threshold(resized.view());
    if foreground_count(&binary) * 2 > binary.len() {
        binary.mapv_inplace(|it| !it);
    }
    to_intensity(binary.view())
}

fn mean_squared_difference(a: ArrayView2<f32>, b: ArrayView2<f32>) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let mut total = 0.0f32;
    Zip::from(a).and(b).for_each(|x, y| total += (x - y).powi(2));
    total / a.len() as f32
}
