//! Kernel source management and specialization.

use std::borrow::Cow;
use std::hash::{Hash, Hasher};

use seahash::SeaHasher;

const ESCAPE_TIME_SOURCE: &str = include_str!("shaders/escape_time.wgsl");
const WORKGROUP_SIZE_PLACEHOLDER: &str = "{{WORKGROUP_SIZE}}";

/// Default invocations per workgroup when the device does not suggest one.
pub const DEFAULT_WORKGROUP_SIZE: u32 = 256;

/// Describes a per-pixel kernel to compile.
///
/// The template may contain `{{WORKGROUP_SIZE}}` placeholders, which are
/// replaced with the configured size before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSpec {
    label: String,
    template: Cow<'static, str>,
    entry_point: String,
    workgroup_size: u32,
}

impl KernelSpec {
    /// The escape-time kernel shipped with this crate.
    #[must_use]
    pub fn escape_time() -> Self {
        Self::from_source("escape_time", ESCAPE_TIME_SOURCE, "main")
    }

    /// Creates a spec from an arbitrary WGSL template.
    pub fn from_source(
        label: impl Into<String>,
        template: impl Into<Cow<'static, str>>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            template: template.into(),
            entry_point: entry_point.into(),
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
        }
    }

    /// Returns a copy specialized for `size` invocations per workgroup.
    /// A size of zero is raised to one.
    #[must_use]
    pub fn with_workgroup_size(mut self, size: u32) -> Self {
        self.workgroup_size = size.max(1);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub const fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    /// The WGSL source with all placeholders substituted.
    #[must_use]
    pub fn source(&self) -> String {
        self.template
            .replace(WORKGROUP_SIZE_PLACEHOLDER, &self.workgroup_size.to_string())
    }

    /// Stable hash of the specialized source and entry point.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = SeaHasher::new();
        self.source().hash(&mut hasher);
        self.entry_point.hash(&mut hasher);
        hasher.finish()
    }
}
