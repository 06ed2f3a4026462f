// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Radio sources and the simulated physical layer.

use std::collections::HashMap;
use std::path::PathBuf;

use mbr_app::normalize_name;
use mbr_core::radio::RadioSource;
use mbr_core::DynResult;

mod dummy;
mod file;
mod recorder;
pub mod sim;
#[cfg(feature = "soapysdr")]
mod soapy;

pub use dummy::DummyRadio;
pub use file::FileSource;
pub use recorder::SampleRecorder;
#[cfg(feature = "soapysdr")]
pub use soapy::SoapyRadio;

/// How to reach the radio front-end.
#[derive(Debug, Clone)]
pub enum RadioAccess {
    /// Live device, identified by a SoapySDR argument string.
    Device { args: String },
    /// Recorded capture of interleaved little-endian `f32` I/Q.
    File { path: PathBuf },
    /// No hardware.
    None,
}

pub type RadioFactory = fn(RadioAccess) -> DynResult<Box<dyn RadioSource>>;

/// Context for registering and instantiating radio sources.
#[derive(Clone, Default)]
pub struct RegistrationContext {
    factories: HashMap<String, RadioFactory>,
}

impl RegistrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a radio factory under a stable name (e.g. "soapysdr").
    pub fn register_radio(&mut self, name: &str, factory: RadioFactory) {
        self.factories.insert(normalize_name(name), factory);
    }

    pub fn is_radio_registered(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize_name(name))
    }

    /// Registered radio names, sorted.
    pub fn registered_radios(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn build_radio(&self, name: &str, access: RadioAccess) -> DynResult<Box<dyn RadioSource>> {
        let factory = self
            .factories
            .get(&normalize_name(name))
            .ok_or_else(|| format!("Unknown radio: {}", name))?;
        factory(access)
    }
}

/// Register all built-in radios enabled by features on a context.
pub fn register_builtin_radios_on(context: &mut RegistrationContext) {
    context.register_radio("dummy", dummy_factory);
    context.register_radio("file", file_factory);
    #[cfg(feature = "soapysdr")]
    context.register_radio("soapysdr", soapysdr_factory);
}

fn dummy_factory(_access: RadioAccess) -> DynResult<Box<dyn RadioSource>> {
    Ok(Box::new(DummyRadio::paced()))
}

fn file_factory(access: RadioAccess) -> DynResult<Box<dyn RadioSource>> {
    match access {
        RadioAccess::File { path } => Ok(Box::new(FileSource::open(&path)?)),
        _ => Err("file radio needs a sample file path".into()),
    }
}

#[cfg(feature = "soapysdr")]
fn soapysdr_factory(access: RadioAccess) -> DynResult<Box<dyn RadioSource>> {
    match access {
        RadioAccess::Device { args } => Ok(Box::new(SoapyRadio::open(&args)?)),
        _ => Err("soapysdr radio needs device arguments".into()),
    }
}

/// Describe the radio devices that can be opened.
#[cfg(feature = "soapysdr")]
pub fn list_devices() -> DynResult<Vec<String>> {
    soapy::enumerate_devices()
}

#[cfg(not(feature = "soapysdr"))]
pub fn list_devices() -> DynResult<Vec<String>> {
    Err("built without SoapySDR support".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_radios_registered() {
        let mut ctx = RegistrationContext::new();
        register_builtin_radios_on(&mut ctx);
        assert!(ctx.is_radio_registered("Dummy"));
        assert!(ctx.is_radio_registered("file"));
        assert!(ctx.registered_radios().contains(&"dummy".to_string()));
    }

    #[test]
    fn unknown_radio_is_error() {
        let ctx = RegistrationContext::new();
        let err = ctx.build_radio("hackrf", RadioAccess::None).err().unwrap();
        assert!(err.to_string().contains("Unknown radio"));
    }

    #[test]
    fn file_radio_requires_path() {
        let mut ctx = RegistrationContext::new();
        register_builtin_radios_on(&mut ctx);
        assert!(ctx.build_radio("file", RadioAccess::None).is_err());
    }

    #[test]
    fn dummy_radio_builds() {
        let mut ctx = RegistrationContext::new();
        register_builtin_radios_on(&mut ctx);
        let radio = ctx.build_radio("dummy", RadioAccess::None).unwrap();
        assert_eq!(radio.name(), "dummy");
    }
}
