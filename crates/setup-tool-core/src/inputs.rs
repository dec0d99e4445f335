//! Cascading input resolution.
//!
//! Any configurable value can be overridden per platform and architecture.
//! For a logical input `url` on `linux`/`x64` the keys consulted are, most
//! specific first:
//!
//! ```text
//! url-linux-x64
//! url-x64
//! url-linux
//! url
//! ```
//!
//! The first key holding a non-empty value wins. Empty values are skipped,
//! never treated as an override.

use std::collections::BTreeMap;

use crate::platform::{HostPlatform, PlatformContext};
use crate::{Error, Result};

/// A raw key-value store of named inputs.
pub trait InputSource: Send + Sync {
    /// Look up a single key. `None` and `Some("")` are both treated as absent.
    fn get_input(&self, name: &str) -> Option<String>;
}

/// In-memory inputs, used for `--input KEY=VALUE` overrides and in tests.
#[derive(Debug, Clone, Default)]
pub struct MapInputs {
    values: BTreeMap<String, String>,
}

impl MapInputs {
    /// Create an empty input map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input, returning the updated map.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Insert an input in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapInputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl InputSource for MapInputs {
    fn get_input(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Several sources consulted in order; the first non-empty value wins.
#[derive(Default)]
pub struct LayeredInputs {
    layers: Vec<Box<dyn InputSource>>,
}

impl LayeredInputs {
    /// Create an empty stack of sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lower-precedence source.
    #[must_use]
    pub fn with_layer(mut self, source: impl InputSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl InputSource for LayeredInputs {
    fn get_input(&self, name: &str) -> Option<String> {
        self.layers
            .iter()
            .filter_map(|layer| layer.get_input(name))
            .find(|value| !value.is_empty())
    }
}

/// How an absent input is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    /// Absence is a [`Error::MissingRequiredInput`].
    Required,
    /// Absence yields `None`.
    Optional,
    /// Absence yields the given default.
    OptionalWithDefault(String),
}

/// Build the cascade of keys for a logical input, most specific first.
#[must_use]
pub fn candidate_keys(name: &str, ctx: &PlatformContext) -> Vec<String> {
    vec![
        format!("{name}-{}-{}", ctx.platform, ctx.arch),
        format!("{name}-{}", ctx.arch),
        format!("{name}-{}", ctx.platform),
        name.to_string(),
    ]
}

/// Query `keys` in order and apply `mode` when none of them has a value.
pub fn resolve_keys(
    keys: &[String],
    source: &dyn InputSource,
    mode: InputMode,
) -> Result<Option<String>> {
    let found = keys
        .iter()
        .filter_map(|key| source.get_input(key))
        .find(|value| !value.is_empty());

    match (found, mode) {
        (Some(value), _) => Ok(Some(value)),
        (None, InputMode::Required) => Err(Error::missing_required_input(keys)),
        (None, InputMode::Optional) => Ok(None),
        (None, InputMode::OptionalWithDefault(default)) => Ok(Some(default)),
    }
}

/// Resolve a logical input through the platform/architecture cascade.
pub fn resolve(
    name: &str,
    ctx: &PlatformContext,
    source: &dyn InputSource,
    mode: InputMode,
) -> Result<Option<String>> {
    resolve_keys(&candidate_keys(name, ctx), source, mode)
}

/// Resolves logical inputs for one platform context.
pub struct InputResolver<'a> {
    ctx: &'a PlatformContext,
    source: &'a dyn InputSource,
}

impl<'a> InputResolver<'a> {
    /// Create a resolver over `source` for the given platform.
    #[must_use]
    pub fn new(ctx: &'a PlatformContext, source: &'a dyn InputSource) -> Self {
        Self { ctx, source }
    }

    /// A cascaded input that must be present.
    pub fn required(&self, name: &str) -> Result<String> {
        let value = resolve(name, self.ctx, self.source, InputMode::Required)?;
        value.ok_or_else(|| Error::missing_required_input(&candidate_keys(name, self.ctx)))
    }

    /// A cascaded input that may be absent.
    pub fn optional(&self, name: &str) -> Result<Option<String>> {
        resolve(name, self.ctx, self.source, InputMode::Optional)
    }

    /// A cascaded input with a fallback value.
    pub fn optional_or(&self, name: &str, default: impl Into<String>) -> Result<String> {
        let default = default.into();
        let value = resolve(
            name,
            self.ctx,
            self.source,
            InputMode::OptionalWithDefault(default.clone()),
        )?;
        Ok(value.unwrap_or(default))
    }

    /// A non-cascaded input that must be present.
    pub fn bare_required(&self, name: &str) -> Result<String> {
        let keys = [name.to_string()];
        resolve_keys(&keys, self.source, InputMode::Required)?
            .ok_or_else(|| Error::missing_required_input(&keys))
    }

    /// A non-cascaded input that may be absent.
    pub fn bare_optional(&self, name: &str) -> Result<Option<String>> {
        resolve_keys(&[name.to_string()], self.source, InputMode::Optional)
    }

    /// A non-cascaded boolean flag. Only the literal `"true"` is truthy.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.source.get_input(name).as_deref() == Some("true")
    }
}

/// Extension used when no `ext` input is given.
#[must_use]
pub const fn infer_extension(platform: HostPlatform) -> &'static str {
    match platform {
        HostPlatform::Win32 => "zip",
        _ => "tar.gz",
    }
}

/// The credential for latest-version lookups.
///
/// `github-token` takes precedence over `github-token-for-latest`.
pub fn github_token_for_latest(source: &dyn InputSource) -> Result<String> {
    let keys = ["github-token".to_string(), "github-token-for-latest".to_string()];
    resolve_keys(&keys, source, InputMode::Required)?
        .ok_or_else(|| Error::missing_required_input(&keys))
}

/// Every input the setup run reads, fully resolved for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs {
    /// Tool name; first component of the cache key.
    pub name: String,
    /// Requested version; empty when not given.
    pub version: String,
    /// Download URL template.
    pub url: String,
    /// Sub-path template inside the extracted archive.
    pub subdir: Option<String>,
    /// Value of the `{os}` template variable.
    pub os: String,
    /// Value of the `{arch}` template variable; also the cache key arch.
    pub arch: String,
    /// Archive extension token.
    pub ext: String,
    /// Install the download as a bare executable instead of extracting it.
    pub no_extract: bool,
    /// Credential for private release assets.
    pub github_token: Option<String>,
}

impl Inputs {
    /// Resolve all inputs from `source`.
    pub fn from_source(ctx: &PlatformContext, source: &dyn InputSource) -> Result<Self> {
        let resolver = InputResolver::new(ctx, source);

        Ok(Self {
            name: resolver.bare_required("name")?,
            version: resolver.bare_optional("version")?.unwrap_or_default(),
            url: resolver.required("url")?,
            subdir: resolver.optional("subdir")?,
            os: resolver.optional_or("os", ctx.platform.as_str())?,
            arch: resolver.optional_or("arch", ctx.arch.as_str())?,
            ext: resolver.optional_or("ext", infer_extension(ctx.platform))?,
            no_extract: resolver.flag("no-extract"),
            github_token: resolver.bare_optional("github-token")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HostArch;

    fn ctx(platform: HostPlatform, arch: HostArch) -> PlatformContext {
        PlatformContext::new(platform, arch)
    }

    fn defaults() -> MapInputs {
        MapInputs::new()
            .with("name", "tool")
            .with("version", "0.0.0")
            .with("url", "https://example.com")
    }

    #[test]
    fn test_candidate_keys_order() {
        let keys = candidate_keys("url", &ctx(HostPlatform::Linux, HostArch::X64));
        assert_eq!(keys, vec!["url-linux-x64", "url-x64", "url-linux", "url"]);
    }

    #[test]
    fn test_with_only_url_specified() {
        let inputs =
            Inputs::from_source(&ctx(HostPlatform::Darwin, HostArch::Arm), &defaults()).unwrap();

        assert_eq!(inputs.name, "tool");
        assert_eq!(inputs.version, "0.0.0");
        assert_eq!(inputs.url, "https://example.com");
        assert_eq!(inputs.subdir, None);
        assert_eq!(inputs.os, "darwin");
        assert_eq!(inputs.arch, "arm");
        assert_eq!(inputs.ext, "tar.gz");
        assert!(!inputs.no_extract);
        assert_eq!(inputs.github_token, None);
    }

    #[test]
    fn test_overriding_url_by_platform() {
        let source = defaults().with("url-linux", "https://example-linux.com");

        let darwin =
            Inputs::from_source(&ctx(HostPlatform::Darwin, HostArch::Arm), &source).unwrap();
        let linux = Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source).unwrap();

        assert_eq!(darwin.url, "https://example.com");
        assert_eq!(linux.url, "https://example-linux.com");
    }

    #[test]
    fn test_remapping_arch() {
        let source = defaults()
            .with("arch", "x86_64")
            .with("arch-darwin-x64", "arm");

        let darwin =
            Inputs::from_source(&ctx(HostPlatform::Darwin, HostArch::X64), &source).unwrap();
        let linux = Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source).unwrap();

        assert_eq!(darwin.arch, "arm");
        assert_eq!(linux.arch, "x86_64");
    }

    #[test]
    fn test_remapping_arch_by_platform() {
        let source = defaults()
            .with("arch-linux-x64", "amd64")
            .with("arch-win32-x64", "x86_64");

        let darwin =
            Inputs::from_source(&ctx(HostPlatform::Darwin, HostArch::Arm), &source).unwrap();
        let linux = Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source).unwrap();
        let win32 = Inputs::from_source(&ctx(HostPlatform::Win32, HostArch::X64), &source).unwrap();

        assert_eq!(darwin.arch, "arm");
        assert_eq!(linux.arch, "amd64");
        assert_eq!(win32.arch, "x86_64");
    }

    #[test]
    fn test_remapping_ext_by_platform() {
        let source = defaults().with("ext-win32", "7z");

        let linux = Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source).unwrap();
        let win32 = Inputs::from_source(&ctx(HostPlatform::Win32, HostArch::X64), &source).unwrap();

        assert_eq!(linux.ext, "tar.gz");
        assert_eq!(win32.ext, "7z");
    }

    #[test]
    fn test_infer_extension() {
        assert_eq!(infer_extension(HostPlatform::Win32), "zip");
        assert_eq!(infer_extension(HostPlatform::Linux), "tar.gz");
        assert_eq!(infer_extension(HostPlatform::Darwin), "tar.gz");
    }

    #[test]
    fn test_win32_defaults_to_zip_unless_overridden() {
        let win = ctx(HostPlatform::Win32, HostArch::X64);
        assert_eq!(Inputs::from_source(&win, &defaults()).unwrap().ext, "zip");

        let source = defaults().with("ext", "tar.gz");
        assert_eq!(Inputs::from_source(&win, &source).unwrap().ext, "tar.gz");
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let source = defaults().with("url-linux-x64", "").with("url-x64", "");
        let linux = Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source).unwrap();
        assert_eq!(linux.url, "https://example.com");
    }

    #[test]
    fn test_missing_url_names_every_candidate() {
        let source = MapInputs::new().with("name", "tool");
        let err = Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "You must supply one of url-linux-x64, url-x64, url-linux, url as an input"
        );
    }

    #[test]
    fn test_missing_name() {
        let source = MapInputs::new().with("url", "https://example.com");
        let err = Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source)
            .unwrap_err();
        assert_eq!(err.to_string(), "You must supply the name input");
    }

    #[test]
    fn test_name_is_not_cascaded() {
        let source = MapInputs::new()
            .with("name-linux", "tool")
            .with("url", "https://example.com");
        assert!(Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source).is_err());
    }

    #[test]
    fn test_version_defaults_to_empty() {
        let source = MapInputs::new()
            .with("name", "tool")
            .with("url", "https://example.com");
        let inputs =
            Inputs::from_source(&ctx(HostPlatform::Linux, HostArch::X64), &source).unwrap();
        assert_eq!(inputs.version, "");
    }

    #[test]
    fn test_no_extract_requires_literal_true() {
        let linux = ctx(HostPlatform::Linux, HostArch::X64);

        let on = defaults().with("no-extract", "true");
        assert!(Inputs::from_source(&linux, &on).unwrap().no_extract);

        for value in ["True", "yes", "1", ""] {
            let source = defaults().with("no-extract", value);
            assert!(
                !Inputs::from_source(&linux, &source).unwrap().no_extract,
                "{value:?} should be falsy"
            );
        }
    }

    #[test]
    fn test_resolve_modes() {
        let linux = ctx(HostPlatform::Linux, HostArch::X64);
        let empty = MapInputs::new();

        assert!(resolve("subdir", &linux, &empty, InputMode::Required).is_err());
        assert_eq!(
            resolve("subdir", &linux, &empty, InputMode::Optional).unwrap(),
            None
        );
        assert_eq!(
            resolve(
                "subdir",
                &linux,
                &empty,
                InputMode::OptionalWithDefault("bin".into())
            )
            .unwrap(),
            Some("bin".to_string())
        );
    }

    #[test]
    fn test_token_for_latest_prefers_github_token() {
        let both = MapInputs::new()
            .with("github-token", "primary")
            .with("github-token-for-latest", "fallback");
        assert_eq!(github_token_for_latest(&both).unwrap(), "primary");

        let fallback = MapInputs::new().with("github-token-for-latest", "fallback");
        assert_eq!(github_token_for_latest(&fallback).unwrap(), "fallback");
    }

    #[test]
    fn test_token_for_latest_missing() {
        let err = github_token_for_latest(&MapInputs::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You must supply one of github-token, github-token-for-latest as an input"
        );
    }

    #[test]
    fn test_layered_inputs_first_non_empty_wins() {
        let source = LayeredInputs::new()
            .with_layer(MapInputs::new().with("url", "").with("name", "override"))
            .with_layer(
                MapInputs::new()
                    .with("url", "https://example.com")
                    .with("name", "tool"),
            );

        assert_eq!(source.get_input("name").as_deref(), Some("override"));
        assert_eq!(
            source.get_input("url").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(source.get_input("subdir"), None);
    }

    #[test]
    fn test_map_inputs_from_iter() {
        let source: MapInputs = [("name", "jq"), ("url", "https://example.com")]
            .into_iter()
            .collect();
        assert_eq!(source.get_input("name").as_deref(), Some("jq"));
    }
}
