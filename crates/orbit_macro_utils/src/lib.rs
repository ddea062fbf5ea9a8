//! Path resolution for code generated by Orbit derives.
//!
//! A derive expanding inside a downstream crate cannot name `orbit_model`
//! directly: the crate may be renamed in `Cargo.toml`, reachable only
//! through the `orbit` umbrella, or be the crate being compiled.

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;

/// Package name of the umbrella crate.
const UMBRELLA: &str = "orbit";

/// An Orbit crate that generated code refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitCrate {
    /// `orbit_model`, re-exported as `orbit::orbit_model`.
    Model,
}

impl OrbitCrate {
    /// Package name, which is also the module name under the umbrella.
    pub const fn package(self) -> &'static str {
        match self {
            Self::Model => "orbit_model",
        }
    }
}

/// Returns the path generated code should use for `krate`.
///
/// A direct (possibly renamed) dependency wins over the umbrella. When
/// neither is found the bare package name is returned, so the compile error
/// names the missing dependency.
pub fn resolve_crate_path(krate: OrbitCrate) -> TokenStream {
    let package = krate.package();

    if let Some(local) = local_name(package) {
        let local = ident(&local);
        return quote!(#local);
    }
    if let Ok(FoundCrate::Name(umbrella)) = crate_name(UMBRELLA) {
        let umbrella = ident(&umbrella);
        let module = ident(package);
        return quote!(#umbrella::#module);
    }

    let fallback = ident(package);
    quote!(#fallback)
}

/// Name under which `package` is visible to the crate being compiled.
fn local_name(package: &str) -> Option<String> {
    match crate_name(package).ok()? {
        // `orbit_model` declares `extern crate self as orbit_model`.
        FoundCrate::Itself => Some(package.to_owned()),
        FoundCrate::Name(name) => Some(name),
    }
}

fn ident(name: &str) -> Ident {
    Ident::new(name, Span::call_site())
}
