// Typed endpoint wrappers
//
// Each submodule adds inherent methods to `Gateway` for one backend resource.
// Paths are relative to the API root and go through the interceptor stages.

mod analytics;
mod auth;
mod simulation;
mod sites;
