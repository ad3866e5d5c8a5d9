// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Built-in task domains shipped with the OpenCLI daemon.
//!
//! - [`calculator`]: arithmetic, unit conversion, timezone, date math.
//! - [`weather`]: current conditions and forecast via wttr.in.
//! - [`files`]: compress/convert/organize operations on the local disk.
//! - [`appscript`]: macOS app automation via AppleScript (`osascript`).
//! - [`media`]: local AI image/video generation and the FFmpeg post chain.
//! - [`tts`]: text-to-speech synthesis.
//!
//! Each domain's `task_types` is disjoint from every other's; this is
//! asserted by [`register_builtin_domains`] at startup via the registry's
//! own duplicate-claim check, so a packaging mistake here fails loudly
//! instead of silently shadowing a task type.

pub mod appscript;
pub mod calculator;
pub mod files;
pub mod media;
pub mod subprocess;
pub mod tts;
pub mod weather;

use std::sync::Arc;

use opencli_core::{CoreError, DomainRegistry};

/// Registers every built-in domain with `registry`.
///
/// # Errors
///
/// Returns `CoreError::Configuration` if any domain's `task_types` collide,
/// surfacing a packaging bug immediately rather than at first dispatch.
pub fn register_builtin_domains(registry: &mut DomainRegistry) -> Result<(), CoreError> {
    registry.register(Arc::new(calculator::CalculatorDomain))?;
    registry.register(Arc::new(weather::WeatherDomain::new()))?;
    registry.register(Arc::new(files::FilesDomain))?;
    registry.register(Arc::new(appscript::AppScriptDomain))?;
    registry.register(Arc::new(media::MediaDomain))?;
    registry.register(Arc::new(tts::TtsDomain))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_domains_have_disjoint_task_types() {
        let mut registry = DomainRegistry::new();
        register_builtin_domains(&mut registry).expect("builtin domains must not collide");
        assert!(registry.handles_task_type("calculator_eval"));
        assert!(registry.handles_task_type("weather_current"));
        assert!(registry.handles_task_type("files_organize"));
        assert!(registry.handles_task_type("notes_create"));
        assert!(registry.handles_task_type("media_local_generate_image"));
        assert!(registry.handles_task_type("media_tts_synthesize"));
    }
}
