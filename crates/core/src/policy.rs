//! Routing policy: which engine serves a request.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. an explicit `reference` preference,
//! 2. an explicit `native` preference,
//! 3. any declared plugin (only the reference engine runs plugins),
//! 4. `native` when it is available,
//! 5. `reference` otherwise.
//!
//! Rules 1-3 never look at engine availability, so callers can decide them
//! without resolving anything.

use crate::engine::EngineId;
use crate::options::{CompileOptions, EnginePreference};
use serde::Serialize;
use std::fmt;

/// Why a route was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// The caller forced the engine.
    Requested,
    /// Plugins were declared.
    PluginsRequireReference,
    /// Auto routing with the native engine available.
    NativePreferred,
    /// Auto routing with the native engine absent.
    ReferenceFallback,
}

/// A routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Selected engine.
    pub engine: EngineId,
    /// Rule that selected it.
    pub reason: RouteReason,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let why = match self.reason {
            RouteReason::Requested => "explicitly requested",
            RouteReason::PluginsRequireReference => "plugins declared",
            RouteReason::NativePreferred => "native available",
            RouteReason::ReferenceFallback => "native unavailable",
        };
        write!(f, "{} ({})", self.engine, why)
    }
}

/// Rules 1-3. `None` means the decision depends on native availability.
pub fn explicit_route(options: &CompileOptions) -> Option<Route> {
    match options.engine {
        EnginePreference::Reference => Some(Route {
            engine: EngineId::Reference,
            reason: RouteReason::Requested,
        }),
        EnginePreference::Native => Some(Route {
            engine: EngineId::Native,
            reason: RouteReason::Requested,
        }),
        EnginePreference::Auto if options.has_plugins() => Some(Route {
            engine: EngineId::Reference,
            reason: RouteReason::PluginsRequireReference,
        }),
        EnginePreference::Auto => None,
    }
}

/// Rules 4-5.
pub fn auto_route(native_available: bool) -> Route {
    if native_available {
        Route {
            engine: EngineId::Native,
            reason: RouteReason::NativePreferred,
        }
    } else {
        Route {
            engine: EngineId::Reference,
            reason: RouteReason::ReferenceFallback,
        }
    }
}

/// Full decision. `native_available` is only consulted when rules 1-3 do
/// not match.
pub fn decide(options: &CompileOptions, native_available: impl FnOnce() -> bool) -> Route {
    explicit_route(options).unwrap_or_else(|| auto_route(native_available()))
}
